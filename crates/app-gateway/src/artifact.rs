use std::path::{Path, PathBuf};

use app_helpers::{
    file_type::{infer_file_type, mime_from_extension},
    temp_file::TempFile,
};
use mime::Mime;
use serde::{Deserialize, Serialize};
use tracing::trace;
use walkdir::WalkDir;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeKind {
    Video,
    Image,
    Audio,
    Gif,
}

impl MimeKind {
    #[must_use]
    pub fn from_mime(mime: &Mime) -> Option<Self> {
        match (mime.type_(), mime.subtype()) {
            (mime::IMAGE, mime::GIF) => Some(Self::Gif),
            (mime::IMAGE, _) => Some(Self::Image),
            (mime::VIDEO, _) => Some(Self::Video),
            (mime::AUDIO, _) => Some(Self::Audio),
            _ => None,
        }
    }

    /// Sniff the kind from the file contents, falling back to the extension.
    pub async fn detect(path: &Path) -> Option<Self> {
        let owned = path.to_path_buf();
        let sniffed = tokio::task::spawn_blocking(move || infer_file_type(&owned))
            .await
            .ok()
            .and_then(Result::ok);
        trace!(?sniffed, ?path, "Sniffed file type");

        sniffed
            .as_ref()
            .and_then(Self::from_mime)
            .or_else(|| Self::from_extension(path))
    }

    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        mime_from_extension(path).as_ref().and_then(Self::from_mime)
    }
}

/// A downloaded file and what is known about it.
///
/// The file is deleted when this is dropped unless it was persisted.
#[derive(Debug)]
pub struct MediaArtifact {
    file: TempFile,
    mime_kind: MimeKind,
    size_bytes: u64,
    title: Option<String>,
    preview: bool,
}

impl MediaArtifact {
    #[must_use]
    pub fn new(file: TempFile, mime_kind: MimeKind, size_bytes: u64) -> Self {
        Self {
            file,
            mime_kind,
            size_bytes,
            title: None,
            preview: false,
        }
    }

    /// Take ownership of a finished download and work out what it is.
    pub async fn from_download<T>(path: T) -> Result<Self, GatewayError>
    where
        T: Into<PathBuf>,
    {
        let path = path.into();
        let file = TempFile::adopt(&path);

        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(GatewayError::internal)?
            .len();

        let mime_kind = MimeKind::detect(&path).await.ok_or_else(|| {
            GatewayError::with_detail(
                crate::error::ErrorKind::DownloadFailed,
                "downloaded file is not a supported media type",
            )
        })?;

        Ok(Self::new(file, mime_kind, size_bytes))
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|x| !x.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub const fn mime_kind(&self) -> MimeKind {
        self.mime_kind
    }

    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Only a short preview was fetched instead of the full media.
    #[must_use]
    pub const fn preview(&self) -> bool {
        self.preview
    }

    pub(crate) fn set_size_bytes(&mut self, size_bytes: u64) {
        self.size_bytes = size_bytes;
    }

    pub(crate) fn replace_file(self, file: TempFile) -> Self {
        Self { file, ..self }
    }

    /// Copy the file out, keeping the artifact (and its cleanup) intact.
    pub async fn copy_to(&self, dest: &Path) -> Result<u64, std::io::Error> {
        self.file.copy_to(dest).await
    }

    /// Move the file to `dest`. It is no longer cleaned up afterwards.
    pub async fn persist(self, dest: &Path) -> Result<PathBuf, std::io::Error> {
        self.file.persist(dest).await
    }
}

/// The first file under `dir` that looks like media, by extension.
///
/// Sidecar files (metadata, partial downloads) are ignored.
#[must_use]
pub fn find_media_file(dir: &Path) -> Option<PathBuf> {
    let mut found = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|x| x.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|x| MimeKind::from_extension(x).is_some())
        .collect::<Vec<_>>();

    found.sort();
    found.into_iter().next()
}
