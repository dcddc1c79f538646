pub mod gallery_dl;
pub mod music;
pub mod subprocess;
pub mod yt_dlp;

use std::{
    fmt::{self, Debug, Display},
    path::Path,
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use url::Url;

pub use self::{gallery_dl::GalleryDl, music::Music, yt_dlp::YtDlp};
use crate::{artifact::MediaArtifact, error::GatewayError, platform::Platform};

pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like \
                              Gecko) Chrome/120.0.0.0 Safari/537.36";

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(Url),
    Query(String),
}

impl Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Query(query) => write!(f, "{:?}", query),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConstraints {
    /// Passed on to the backend where it supports it. Checked again afterwards regardless.
    pub max_size_bytes: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub source: Source,
    /// The only place an adapter may write to.
    pub work_dir: &'a Path,
    pub constraints: &'a FetchConstraints,
    pub cancel: CancellationToken,
}

/// One extraction backend behind a uniform contract.
#[async_trait::async_trait]
pub trait Adapter: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Platforms this adapter can be bound to.
    fn platforms(&self) -> &[Platform];

    /// Whether the adapter can take free-form search queries.
    fn handles_search(&self) -> bool {
        false
    }

    /// Whether everything the adapter depends on is available.
    fn can_run(&self) -> bool {
        true
    }

    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<MediaArtifact, GatewayError>;
}
