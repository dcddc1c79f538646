use std::path::PathBuf;

use clap::{Args, ValueHint};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validators::directory::{validate_output_directory, value_parser_output_directory};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = "Cli options")]
pub struct CliConfig {
    /// Text to process, as it would arrive in a chat message.
    ///
    /// Either a link (Reddit, Instagram, TikTok, Deezer) or a song search query.
    /// Multiple words are joined with spaces.
    #[clap(id = "TEXT", required = true)]
    #[serde(skip)]
    pub text: Vec<String>,

    /// Treat the text as a music search even if it is a single word.
    ///
    /// Links in the text are still downloaded.
    #[clap(short = 's', long)]
    pub search: bool,

    /// Identity used for rate limiting
    #[clap(long, default_value = "cli", env = "MEDIA_GATEWAY_REQUESTER")]
    pub requester: String,

    /// Directory to copy the resulting file to
    ///
    /// Will error if it is not a valid directory.
    #[clap(short = 'd', long, default_value = ".", value_hint = ValueHint::DirPath, value_parser = value_parser_output_directory())]
    #[validate(custom(function = "validate_output_directory"))]
    pub output_directory: PathBuf,
}
