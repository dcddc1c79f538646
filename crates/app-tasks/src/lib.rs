use app_gateway::temp_store::TempStore;
use app_logger::error;
use tokio_util::sync::CancellationToken;

pub(crate) mod cron;

pub use cron::tasks::{scratch::sweep_scratch, tools::update_tool, tools::Tool};

/// Spawn the periodic background tasks. They stop when `cancel` is cancelled.
pub async fn start(store: TempStore, cancel: CancellationToken) {
    if let Err(e) = tokio::task::spawn_blocking(move || cron::spawn(store, cancel)).await {
        error!("Failed to spawn cron tasks: {e:?}");
    }
}
