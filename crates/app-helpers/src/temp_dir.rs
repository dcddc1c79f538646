use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

use tracing::{trace, warn};

/// A directory that is exclusively owned by whoever holds this value.
///
/// Created with `create_dir` so an existing directory is an error instead of
/// being silently shared. Removed recursively either by [`TempDir::release`]
/// or, failing that, when the value is dropped.
#[derive(Debug)]
pub struct TempDir {
    path: PathBuf,
    delete_on_drop: bool,
}
impl TempDir {
    /// Create `parent/name`. `parent` is created if missing, `name` must not exist yet.
    pub fn exclusive_in<P, N>(parent: P, name: N) -> Result<Self, io::Error>
    where
        P: AsRef<Path>,
        N: AsRef<OsStr>,
    {
        let parent = parent.as_ref();
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        if !parent.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Path exists and is not a directory",
            ));
        }

        let path = parent.join(name.as_ref());
        std::fs::create_dir(&path)?;
        trace!(?path, "Created temp dir");

        Ok(Self {
            path,
            delete_on_drop: true,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    ///
    /// The directory is considered released even if removal fails, so drop
    /// will not try a second time.
    pub async fn release(mut self) -> Result<(), io::Error> {
        self.delete_on_drop = false;

        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                trace!(path = ?self.path, "Removed temp dir");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if !self.delete_on_drop {
            return;
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => trace!(path = ?self.path, "Removed temp dir on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, ?e, "Failed to remove temp dir on drop"),
        }
    }
}
