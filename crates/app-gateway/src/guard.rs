use std::path::Path;

use tracing::{debug, warn};

use crate::error::{ErrorKind, GatewayError};

/// Checks a finished download against the size ceiling.
///
/// Size always comes from disk, never from what the backend reported.
#[derive(Debug, Clone, Copy)]
pub struct SizeGuard;

impl SizeGuard {
    /// The actual size of `path` if it is within `max_bytes`.
    pub async fn check(path: &Path, max_bytes: u64) -> Result<u64, GatewayError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(GatewayError::internal)?
            .len();

        if size > max_bytes {
            warn!(size, max_bytes, "Artifact is too large");
            return Err(GatewayError::with_detail(
                ErrorKind::FileTooLarge,
                format!("{} bytes, limit is {} bytes", size, max_bytes),
            ));
        }

        debug!(size, max_bytes, "Artifact size accepted");
        Ok(size)
    }
}
