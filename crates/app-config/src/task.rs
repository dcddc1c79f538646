use clap::Args;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::timeframe::Timeframe;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = Some("Background tasks"))]
pub struct TaskConfig {
    /// How often to run `--update` on the extraction tools.
    ///
    /// Accepts values like `12h`, `1d` or `30min`. Disabled if not set.
    #[arg(long, default_value = None, env = "MEDIA_GATEWAY_TOOL_UPDATE_INTERVAL", value_parser = Timeframe::parse_str)]
    pub tool_update_interval: Option<Timeframe>,

    /// How often to sweep leftover scratch directories.
    ///
    /// Disabled if not set. A sweep always runs once at startup.
    #[arg(long, default_value = "1h", env = "MEDIA_GATEWAY_SCRATCH_SWEEP_INTERVAL", value_parser = Timeframe::parse_str)]
    pub scratch_sweep_interval: Option<Timeframe>,

    /// Minimum age of scratch entries removed by a sweep.
    #[arg(long, default_value = "1h", env = "MEDIA_GATEWAY_SCRATCH_MAX_AGE", value_parser = Timeframe::parse_str)]
    pub scratch_max_age: Option<Timeframe>,
}
