use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Every way a request can fail, as seen by whoever sent it.
///
/// The [`ErrorKind::code`] strings are a stable external contract, transports
/// render them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidUrl,
    AuthFailed,
    DownloadFailed,
    FileTooLarge,
    UnsupportedPlatform,
    SearchFailed,
    NoResults,
    RateLimited,
    Timeout,
    Cancelled,
    InternalError,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidUrl => "INVALID_URL",
            Self::AuthFailed => "AUTH_FAILED",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::UnsupportedPlatform => "UNSUPPORTED_PLATFORM",
            Self::SearchFailed => "SEARCH_FAILED",
            Self::NoResults => "NO_RESULTS",
            Self::RateLimited => "RATE_LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Short codes the chat bot has always shown to users.
    #[must_use]
    pub const fn numeric_code(self) -> &'static str {
        match self {
            Self::InvalidUrl => "E101",
            Self::AuthFailed => "E102",
            Self::DownloadFailed => "E103",
            Self::FileTooLarge => "E104",
            Self::UnsupportedPlatform => "E105",
            Self::SearchFailed => "E201",
            Self::NoResults => "E202",
            Self::RateLimited => "E301",
            Self::Timeout => "E302",
            Self::Cancelled => "E401",
            Self::InternalError => "E500",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidUrl => "That doesn't look like a valid link",
            Self::AuthFailed => "The content is private or requires a login",
            Self::DownloadFailed => "The download failed",
            Self::FileTooLarge => "The file exceeds the size limit",
            Self::UnsupportedPlatform => "That platform is not supported",
            Self::SearchFailed => "The search failed",
            Self::NoResults => "Nothing was found",
            Self::RateLimited => "Too many requests, try again later",
            Self::Timeout => "The download took too long",
            Self::Cancelled => "The request was cancelled",
            Self::InternalError => "Something went wrong on our side",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    kind: ErrorKind,
    detail: Option<String>,
}

impl GatewayError {
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail<T>(kind: ErrorKind, detail: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    /// Wrap an unexpected failure. The detail is kept for logs only.
    pub fn internal<T>(detail: T) -> Self
    where
        T: Display,
    {
        Self::with_detail(ErrorKind::InternalError, detail.to_string())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Text safe to show to the requester.
    ///
    /// Internal errors never leak their detail.
    #[must_use]
    pub fn user_message(&self) -> String {
        let kind = self.kind;

        match (&self.detail, kind) {
            (Some(detail), k) if k != ErrorKind::InternalError => {
                format!("{}: {} ({})", kind.code(), kind.description(), detail)
            }
            _ => format!("{}: {}", kind.code(), kind.description()),
        }
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind, detail),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<ErrorKind> for GatewayError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
