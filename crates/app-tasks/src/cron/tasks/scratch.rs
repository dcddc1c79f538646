use std::time::Duration;

use app_gateway::temp_store::TempStore;
use tracing::{debug, info};

/// Remove scratch entries older than `max_age`, eg. from a crashed run.
#[tracing::instrument(skip(store), fields(root = ?store.root()))]
pub async fn sweep_scratch(store: &TempStore, max_age: Duration) -> anyhow::Result<usize> {
    debug!(?max_age, "Sweeping scratch space");

    let removed = store.sweep(max_age).await?;

    if removed > 0 {
        info!(removed, "Removed stale scratch entries");
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removes_leftovers_from_previous_runs() {
        let root = tempfile::tempdir().expect("temp root");
        let store = TempStore::new(root.path());
        std::fs::create_dir_all(store.jobs_dir().join("01STALE")).expect("job dir");
        std::fs::create_dir_all(store.outbox_dir()).expect("outbox");
        std::fs::write(store.outbox_dir().join("01STALE.mp4"), b"x").expect("outbox file");

        let removed = sweep_scratch(&store, Duration::ZERO).await.expect("sweeps");

        assert_eq!(removed, 2);
        assert_eq!(
            std::fs::read_dir(store.jobs_dir()).map(Iterator::count).ok(),
            Some(0)
        );
    }

    #[tokio::test]
    async fn keeps_fresh_entries() {
        let root = tempfile::tempdir().expect("temp root");
        let store = TempStore::new(root.path());
        std::fs::create_dir_all(store.jobs_dir().join("01FRESH")).expect("job dir");

        let removed = sweep_scratch(&store, Duration::from_secs(3600))
            .await
            .expect("sweeps");

        assert_eq!(removed, 0);
        assert!(store.jobs_dir().join("01FRESH").exists());
    }

    #[tokio::test]
    async fn missing_root_is_not_an_error() {
        let root = tempfile::tempdir().expect("temp root");
        let store = TempStore::new(root.path().join("never-created"));

        assert_eq!(sweep_scratch(&store, Duration::ZERO).await.ok(), Some(0));
    }
}
