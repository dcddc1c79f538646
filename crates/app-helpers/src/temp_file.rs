use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::{trace, warn};

/// A file that is deleted when dropped, unless it is persisted somewhere else first.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    delete_on_drop: bool,
}
impl TempFile {
    /// Take ownership of an already existing file.
    #[must_use]
    pub fn adopt<T>(path: T) -> Self
    where
        T: Into<PathBuf>,
    {
        Self {
            path: path.into(),
            delete_on_drop: true,
        }
    }

    /// Move `from` to `to` and take ownership of the result.
    pub async fn move_into(from: &Path, to: PathBuf) -> Result<Self, io::Error> {
        if let Err(e) = tokio::fs::rename(from, &to).await {
            trace!(?e, ?from, ?to, "Rename failed, falling back to copy");
            tokio::fs::copy(from, &to).await?;
            tokio::fs::remove_file(from).await?;
        }

        Ok(Self::adopt(to))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the file to `dest` and keep the copy. The original is still removed on drop.
    pub async fn copy_to(&self, dest: &Path) -> Result<u64, io::Error> {
        tokio::fs::copy(&self.path, dest).await
    }

    /// Move the file to `dest` and give up ownership of it.
    pub async fn persist(mut self, dest: &Path) -> Result<PathBuf, io::Error> {
        if tokio::fs::rename(&self.path, dest).await.is_err() {
            tokio::fs::copy(&self.path, dest).await?;
            // The copy is what the caller asked for, the original is still ours to clean up.
            return Ok(dest.to_path_buf());
        }

        self.delete_on_drop = false;
        Ok(dest.to_path_buf())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.delete_on_drop {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => trace!(path = ?self.path, "Removed temp file on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, ?e, "Failed to remove temp file on drop"),
        }
    }
}
