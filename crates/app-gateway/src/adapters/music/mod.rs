pub mod deezer;
pub mod select;

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use app_config::gateway::Credential;
use app_helpers::{
    file_name::{sanitize_file_name, MAX_FILENAME_LENGTH},
    temp_file::TempFile,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub use self::deezer::DeezerCatalog;
use super::{Adapter, FetchRequest, Source};
use crate::{
    artifact::{MediaArtifact, MimeKind},
    error::{ErrorKind, GatewayError},
    platform::Platform,
};

const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub preview_url: Option<Url>,
    pub link: Option<Url>,
    pub duration_secs: Option<u32>,
}

impl Track {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// `"{artist} - {title}.mp3"` with anything but alphanumerics, spaces and `-_.` removed.
    #[must_use]
    pub fn file_name(&self) -> String {
        let raw = self
            .display_name()
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
            .collect::<String>();

        sanitize_file_name(&raw, MAX_FILENAME_LENGTH)
            .filter(|x| x.chars().any(char::is_alphanumeric))
            .map_or_else(
                || format!("track-{}.mp3", self.id),
                |name| format!("{}.mp3", name),
            )
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request to the catalog failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog returned an error: {0}")]
    Api(String),
    #[error("unexpected catalog response: {0}")]
    Decode(String),
}

/// A searchable music catalog.
#[async_trait::async_trait]
pub trait MusicCatalog: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, CatalogError>;

    async fn track(&self, id: u64) -> Result<Option<Track>, CatalogError>;

    /// The short preview clip of `track`.
    async fn preview(&self, track: &Track) -> Result<Vec<u8>, CatalogError>;

    /// Download the whole track into `req.work_dir`.
    async fn full_track(
        &self,
        _track: &Track,
        _credential: &Credential,
        _req: &FetchRequest<'_>,
    ) -> Result<PathBuf, GatewayError> {
        Err(GatewayError::with_detail(
            ErrorKind::AuthFailed,
            "full tracks are not available from this catalog",
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicMode {
    Full,
    Preview,
}

/// Music search and track links, backed by a [`MusicCatalog`].
///
/// Without a credential only previews are fetched. With one, a failed full
/// download quietly falls back to the preview.
#[derive(Debug, Clone)]
pub struct Music {
    catalog: Arc<dyn MusicCatalog>,
    credential: Option<Credential>,
}

impl Music {
    #[must_use]
    pub fn new(catalog: Arc<dyn MusicCatalog>, credential: Option<Credential>) -> Self {
        Self {
            catalog,
            credential,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> MusicMode {
        if self.credential.is_some() {
            MusicMode::Full
        } else {
            MusicMode::Preview
        }
    }

    async fn search_track(&self, query: &str) -> Result<Track, GatewayError> {
        let mut tracks = self
            .catalog
            .search(query, SEARCH_LIMIT)
            .await
            .map_err(|e| {
                warn!(?e, catalog = self.catalog.name(), "Search failed");
                GatewayError::with_detail(ErrorKind::SearchFailed, e.to_string())
            })?;

        let idx = select::best_match(query, &tracks).ok_or_else(|| {
            GatewayError::with_detail(ErrorKind::NoResults, format!("nothing found for {:?}", query))
        })?;

        Ok(tracks.swap_remove(idx))
    }

    async fn lookup_track(&self, url: &Url) -> Result<Track, GatewayError> {
        let id = track_id_from_url(url).ok_or_else(|| {
            GatewayError::with_detail(
                ErrorKind::UnsupportedPlatform,
                "only single tracks are supported",
            )
        })?;

        self.catalog
            .track(id)
            .await
            .map_err(|e| GatewayError::with_detail(ErrorKind::SearchFailed, e.to_string()))?
            .ok_or_else(|| GatewayError::with_detail(ErrorKind::NoResults, "track not found"))
    }

    async fn fetch_preview(&self, track: &Track, work_dir: &Path) -> Result<PathBuf, GatewayError> {
        if track.preview_url.is_none() {
            return Err(GatewayError::with_detail(
                ErrorKind::DownloadFailed,
                "no preview available",
            ));
        }

        let bytes = self
            .catalog
            .preview(track)
            .await
            .map_err(|e| GatewayError::with_detail(ErrorKind::DownloadFailed, e.to_string()))?;

        let path = work_dir.join(track.file_name());
        tokio::fs::write(&path, bytes)
            .await
            .map_err(GatewayError::internal)?;

        Ok(path)
    }
}

#[async_trait::async_trait]
impl Adapter for Music {
    fn name(&self) -> &'static str {
        "music"
    }

    fn platforms(&self) -> &[Platform] {
        &[Platform::Deezer]
    }

    fn handles_search(&self) -> bool {
        true
    }

    #[tracing::instrument(skip_all, fields(adapter = self.name(), source = %req.source, mode = ?self.mode()))]
    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<MediaArtifact, GatewayError> {
        let track = match &req.source {
            Source::Query(query) => self.search_track(query).await?,
            Source::Url(url) => self.lookup_track(url).await?,
        };
        debug!(?track, "Selected track");

        if req.cancel.is_cancelled() {
            return Err(GatewayError::new(ErrorKind::Cancelled));
        }

        if let Some(credential) = &self.credential {
            match self.catalog.full_track(&track, credential, req).await {
                Ok(path) => {
                    info!(track = %track.display_name(), "Fetched full track");
                    return artifact(path, &track, false).await;
                }
                Err(e) if matches!(e.kind(), ErrorKind::Timeout | ErrorKind::Cancelled) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(?e, "Full track unavailable, falling back to preview");
                }
            }
        }

        let path = self.fetch_preview(&track, req.work_dir).await?;

        artifact(path, &track, true).await
    }
}

async fn artifact(
    path: PathBuf,
    track: &Track,
    preview: bool,
) -> Result<MediaArtifact, GatewayError> {
    let file = TempFile::adopt(path);
    let size_bytes = tokio::fs::metadata(file.path())
        .await
        .map_err(GatewayError::internal)?
        .len();

    Ok(MediaArtifact::new(file, MimeKind::Audio, size_bytes)
        .with_title(Some(track.display_name()))
        .with_preview(preview))
}

/// The numeric id in a `/track/<id>` link, optionally behind a language segment.
fn track_id_from_url(url: &Url) -> Option<u64> {
    let mut segments = url.path_segments()?.filter(|x| !x.is_empty());

    let first = segments.next()?;
    let kind = if first == "track" {
        first
    } else {
        segments.next()?
    };

    if kind != "track" {
        return None;
    }

    segments.next()?.parse().ok()
}
