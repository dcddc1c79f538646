use std::{
    fmt::{self, Display},
    str::FromStr,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Instagram,
    Tiktok,
    Deezer,
    Unsupported,
}

impl Platform {
    /// Every platform a recognizer can exist for.
    pub const RECOGNIZABLE: [Self; 4] = [Self::Tiktok, Self::Instagram, Self::Reddit, Self::Deezer];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reddit => "reddit",
            Self::Instagram => "instagram",
            Self::Tiktok => "tiktok",
            Self::Deezer => "deezer",
            Self::Unsupported => "unsupported",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform: {0:?}")]
pub struct UnknownPlatform(String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();

        Self::RECOGNIZABLE
            .into_iter()
            .find(|x| x.name() == s)
            .ok_or(UnknownPlatform(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformMatch {
    pub platform: Platform,
    pub normalized_url: Option<Url>,
    /// A post/track level pattern matched, not just the host.
    pub confidence: bool,
}

impl PlatformMatch {
    const fn unsupported(normalized_url: Option<Url>) -> Self {
        Self {
            platform: Platform::Unsupported,
            normalized_url,
            confidence: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    strict: bool,
}

impl Pattern {
    /// A pattern that identifies a single post or track.
    pub fn strict(pattern: &str) -> Result<Self, regex::Error> {
        Self::new(pattern, true)
    }

    /// A pattern that only identifies the host.
    pub fn loose(pattern: &str) -> Result<Self, regex::Error> {
        Self::new(pattern, false)
    }

    fn new(pattern: &str, strict: bool) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&format!("(?i){}", pattern))?,
            strict,
        })
    }
}

/// Patterns for one platform, tried in order.
#[derive(Debug, Clone)]
pub struct Recognizer {
    platform: Platform,
    patterns: Vec<Pattern>,
}

impl Recognizer {
    #[must_use]
    pub const fn new(platform: Platform, patterns: Vec<Pattern>) -> Self {
        Self { platform, patterns }
    }

    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    fn recognize(&self, url: &str) -> Option<bool> {
        self.patterns
            .iter()
            .find(|x| x.regex.is_match(url))
            .map(|x| x.strict)
    }
}

static LINK_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhttps?://\S*").expect("Invalid regex"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\''];

static DEFAULT_RECOGNIZERS: Lazy<Vec<Recognizer>> = Lazy::new(|| {
    Platform::RECOGNIZABLE
        .into_iter()
        .map(|platform| {
            let patterns = default_patterns(platform)
                .iter()
                .map(|(pattern, strict)| {
                    Pattern::new(pattern, *strict).expect("Invalid platform pattern")
                })
                .collect();

            Recognizer::new(platform, patterns)
        })
        .collect()
});

const fn default_patterns(platform: Platform) -> &'static [(&'static str, bool)] {
    match platform {
        Platform::Tiktok => &[
            (r"^https?://(vm|vt)\.tiktok\.com/[\w-]+", true),
            (r"^https?://(www\.|m\.)?tiktok\.com/t/[\w-]+", true),
            (r"^https?://(www\.|m\.)?tiktok\.com/@[\w.-]+/video/\d+", true),
            (r"^https?://([\w-]+\.)*tiktok\.com/", false),
        ],
        Platform::Instagram => &[
            (r"^https?://(www\.)?instagr\.am/p/[\w-]+", true),
            (r"^https?://(www\.)?instagram\.com/(p|reel|reels|tv)/[\w-]+", true),
            (r"^https?://([\w-]+\.)*instagram\.com/", false),
        ],
        Platform::Reddit => &[
            (r"^https?://(www\.)?redd\.it/\w+", true),
            (r"^https?://(www\.|old\.|new\.|m\.)?reddit\.com/r/\w+/s/\w+", true),
            (r"^https?://(www\.|old\.|new\.|m\.)?reddit\.com/r/\w+/comments/\w+", true),
            (r"^https?://([\w-]+\.)*reddit\.com/", false),
        ],
        Platform::Deezer => &[
            (r"^https?://deezer\.page\.link/\w+", true),
            (r"^https?://(www\.)?deezer\.com/([a-z]{2}(-[a-z]{2})?/)?(track|album|playlist)/\d+", true),
        ],
        Platform::Unsupported => &[],
    }
}

/// The first `http(s)://` token in `text`, with trailing punctuation removed.
#[must_use]
pub fn link_candidate(text: &str) -> Option<&str> {
    LINK_CANDIDATE
        .find(text)
        .map(|x| x.as_str().trim_end_matches(TRAILING_PUNCTUATION))
}

/// Maps free-form text to the platform it links to.
#[derive(Debug, Clone)]
pub struct PlatformDetector {
    recognizers: Vec<Recognizer>,
}

impl Default for PlatformDetector {
    fn default() -> Self {
        Self {
            recognizers: DEFAULT_RECOGNIZERS.clone(),
        }
    }
}

impl PlatformDetector {
    #[must_use]
    pub const fn new(recognizers: Vec<Recognizer>) -> Self {
        Self { recognizers }
    }

    /// The built-in recognizers, tried in the given platform order.
    ///
    /// Platforms missing from `order` are not recognized at all.
    #[must_use]
    pub fn with_order(order: &[Platform]) -> Self {
        let recognizers = order
            .iter()
            .filter_map(|p| DEFAULT_RECOGNIZERS.iter().find(|r| r.platform == *p))
            .cloned()
            .collect();

        Self { recognizers }
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.recognizers.iter().map(Recognizer::platform)
    }

    #[must_use]
    pub fn classify(&self, text: &str) -> PlatformMatch {
        let Some(candidate) = link_candidate(text) else {
            trace!("No link in text");
            return PlatformMatch::unsupported(None);
        };

        let Ok(mut url) = Url::parse(candidate) else {
            trace!(?candidate, "Link candidate is not a valid url");
            return PlatformMatch::unsupported(None);
        };
        url.set_fragment(None);

        for recognizer in &self.recognizers {
            if let Some(strict) = recognizer.recognize(url.as_str()) {
                trace!(platform = ?recognizer.platform, ?strict, %url, "Recognized link");
                return PlatformMatch {
                    platform: recognizer.platform,
                    normalized_url: Some(url),
                    confidence: strict,
                };
            }
        }

        trace!(%url, "Link is not from a supported platform");
        PlatformMatch::unsupported(Some(url))
    }
}
