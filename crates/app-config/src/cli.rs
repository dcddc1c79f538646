use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};

use crate::{common, conditional, gateway, task};

/// A gateway that fetches media from chat-shared links and search queries,
/// and hands back a single size-bounded file.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[clap(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help
    #[clap(action = ArgAction::Help, long)]
    help: Option<bool>,

    #[command(flatten)]
    pub dependency_path: common::ProgramPathConfig,

    #[command(flatten)]
    pub endpoint: common::EndpointConfig,

    #[command(flatten)]
    pub gateway: gateway::GatewayConfig,

    #[command(flatten)]
    pub task: task::TaskConfig,

    #[command(flatten)]
    pub run: common::RunConfig,

    #[command(flatten)]
    pub conditional: conditional::ConditionalConfig,
}
