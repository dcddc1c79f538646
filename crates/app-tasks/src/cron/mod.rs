use std::{future::Future, time::Duration};

use app_config::Config;
use app_gateway::temp_store::TempStore;
use app_logger::{debug, error, info};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument, Span};

pub mod tasks;

use tasks::tools::Tool;

#[tracing::instrument(name = "cron", skip_all)]
pub fn spawn(store: TempStore, cancel: CancellationToken) {
    info!("Spawning cron tasks");
    let config = Config::global();
    let task_config = &config.task;

    let span = info_span!("tasks");
    let _span = span.enter();

    if let Some(interval) = task_config.tool_update_interval {
        debug!(?interval, "Spawning tool update task");
        let paths = config.dependency_paths.clone();

        every(interval.into(), cancel.clone(), move || {
            let paths = paths.clone();
            async move {
                for tool in Tool::ALL {
                    let Some(program) = tool.program(&paths) else {
                        continue;
                    };

                    if let Err(e) = tasks::tools::update_tool(tool, program).await {
                        error!(%tool, "Failed to update tool: {e:?}");
                    }
                }
            }
        });
    }

    if let Some(interval) = task_config.scratch_sweep_interval {
        let max_age = task_config
            .scratch_max_age
            .map(Duration::from)
            .unwrap_or_default();
        debug!(?interval, ?max_age, "Spawning scratch sweep task");

        every(interval.into(), cancel, move || {
            let store = store.clone();
            async move {
                if let Err(e) = tasks::scratch::sweep_scratch(&store, max_age).await {
                    error!("Failed to sweep scratch space: {e:?}");
                }
            }
        });
    }
}

/// Run `task` every `interval` until `cancel` fires. The first run is after one interval.
fn every<F, Fut>(interval: Duration, cancel: CancellationToken, mut task: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::task::spawn(
        async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }

                task().await;
            }

            debug!("Task stopped");
        }
        .instrument(Span::current()),
    );
}
