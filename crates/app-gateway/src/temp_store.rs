use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use app_helpers::{temp_dir::TempDir, temp_file::TempFile};
use tracing::{debug, trace, warn};

use crate::request::JobId;

const JOBS_DIR: &str = "jobs";
const OUTBOX_DIR: &str = "outbox";

/// Scratch space for jobs.
///
/// Every job gets its own directory under `<root>/jobs`. Finished artifacts
/// are moved to `<root>/outbox` so the job directory can be removed while the
/// caller still holds the file.
#[derive(Debug, Clone)]
pub struct TempStore {
    root: PathBuf,
}

/// A job's exclusive scratch directory. Removed on [`WorkDir::release`] or drop.
#[derive(Debug)]
pub struct WorkDir {
    job_id: JobId,
    dir: TempDir,
}

impl WorkDir {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub const fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub async fn release(self) -> Result<(), io::Error> {
        trace!(job = %self.job_id, "Releasing work dir");
        self.dir.release().await
    }
}

impl TempStore {
    pub fn new<T>(root: T) -> Self
    where
        T: Into<PathBuf>,
    {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    #[must_use]
    pub fn outbox_dir(&self) -> PathBuf {
        self.root.join(OUTBOX_DIR)
    }

    /// Create the work dir for `job_id`. Fails if it already exists.
    pub fn acquire(&self, job_id: &JobId) -> Result<WorkDir, io::Error> {
        let dir = TempDir::exclusive_in(self.jobs_dir(), job_id.as_str())?;
        debug!(job = %job_id, path = ?dir.path(), "Acquired work dir");

        Ok(WorkDir {
            job_id: job_id.clone(),
            dir,
        })
    }

    /// Move `artifact` out of `work_dir` into the outbox.
    pub async fn hand_off(&self, work_dir: &WorkDir, artifact: &Path) -> Result<TempFile, io::Error> {
        let outbox = self.outbox_dir();
        tokio::fs::create_dir_all(&outbox).await?;

        let name = match artifact.extension().and_then(|x| x.to_str()) {
            Some(ext) => format!("{}.{}", work_dir.job_id, ext),
            None => work_dir.job_id.to_string(),
        };
        let dest = outbox.join(name);

        let file = TempFile::move_into(artifact, dest).await?;
        trace!(job = %work_dir.job_id, path = ?file.path(), "Handed off artifact");

        Ok(file)
    }

    /// Remove job dirs and outbox files last modified more than `older_than` ago.
    ///
    /// Returns how many entries were removed.
    pub async fn sweep(&self, older_than: Duration) -> Result<usize, io::Error> {
        let now = SystemTime::now();
        let mut removed = 0;

        for dir in [self.jobs_dir(), self.outbox_dir()] {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(x) => x,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = match entry.metadata().await {
                    Ok(x) => x,
                    Err(e) => {
                        trace!(?e, ?path, "Entry vanished during sweep");
                        continue;
                    }
                };

                let age = meta
                    .modified()
                    .ok()
                    .and_then(|x| now.duration_since(x).ok())
                    .unwrap_or_default();
                if age < older_than {
                    continue;
                }

                let res = if meta.is_dir() {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };

                match res {
                    Ok(()) => {
                        debug!(?path, ?age, "Swept stale scratch entry");
                        removed += 1;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(?e, ?path, "Failed to sweep stale scratch entry"),
                }
            }
        }

        Ok(removed)
    }
}
