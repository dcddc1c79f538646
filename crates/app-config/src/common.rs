use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, ValueEnum, ValueHint};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    cli::CliArgs,
    validators::{
        program::{validate_executable, value_parser_executable},
        url::{validate_http_base_url, value_parser_http_base_url},
    },
};

pub const DEFAULT_DEEZER_API_BASE_URL: &str = "https://api.deezer.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[allow(clippy::struct_field_names)]
#[clap(next_help_heading = Some("Program paths"))]
pub struct ProgramPathConfig {
    /// Path to the yt-dlp executable.
    ///
    /// Used for Reddit and TikTok links.
    /// If not provided, yt-dlp will be searched for in $PATH
    #[arg(long, default_value = None, env = "MEDIA_GATEWAY_YT_DLP", value_hint = ValueHint::FilePath, value_parser = value_parser_executable())]
    #[validate(custom(function = "validate_executable"))]
    yt_dlp_path: Option<PathBuf>,

    /// Path to the gallery-dl executable.
    ///
    /// Used for Instagram links.
    /// If not provided, gallery-dl will be searched for in $PATH
    #[arg(long, default_value = None, env = "MEDIA_GATEWAY_GALLERY_DL", value_hint = ValueHint::FilePath, value_parser = value_parser_executable())]
    #[validate(custom(function = "validate_executable"))]
    gallery_dl_path: Option<PathBuf>,

    /// Path to the deemix executable.
    ///
    /// Only used for full-length tracks when a music credential is configured.
    /// If not provided, deemix will be searched for in $PATH
    #[arg(long, default_value = None, env = "MEDIA_GATEWAY_DEEMIX", value_hint = ValueHint::FilePath, value_parser = value_parser_executable())]
    #[validate(custom(function = "validate_executable"))]
    deemix_path: Option<PathBuf>,
}
impl ProgramPathConfig {
    #[must_use]
    pub fn yt_dlp_path(&self) -> Option<&Path> {
        self.yt_dlp_path.as_deref()
    }

    #[must_use]
    pub fn gallery_dl_path(&self) -> Option<&Path> {
        self.gallery_dl_path.as_deref()
    }

    #[must_use]
    pub fn deemix_path(&self) -> Option<&Path> {
        self.deemix_path.as_deref()
    }

    pub fn with_resolved_paths(&mut self) -> &Self {
        self.yt_dlp_path = self
            .yt_dlp_path
            .clone()
            .or_else(|| which::which("yt-dlp").ok());
        self.gallery_dl_path = self
            .gallery_dl_path
            .clone()
            .or_else(|| which::which("gallery-dl").ok());
        self.deemix_path = self
            .deemix_path
            .clone()
            .or_else(|| which::which("deemix").ok());

        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = Some("External endpoints/APIs"))]
pub struct EndpointConfig {
    /// The base URL of the Deezer public API.
    ///
    /// Used for track search and preview downloads.
    #[arg(long, default_value = DEFAULT_DEEZER_API_BASE_URL, env = "MEDIA_GATEWAY_ENDPOINT_DEEZER_API", value_hint = ValueHint::Url, value_parser = value_parser_http_base_url())]
    #[validate(custom(function = "validate_http_base_url"))]
    pub deezer_api_base_url: String,
}
impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            deezer_api_base_url: DEFAULT_DEEZER_API_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ValueEnum)]
pub enum DumpConfigType {
    Json,
    Toml,
}
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args, Validate)]
#[allow(clippy::option_option)]
#[clap(next_help_heading = Some("Run options"))]
pub struct RunConfig {
    /// Dump the config to stdout
    #[arg(long, value_enum, default_value = None)]
    pub dump_config: Option<Option<DumpConfigType>>,

    /// Dump shell completions to stdout
    #[arg(long, default_value = None, value_name = "SHELL", value_parser = hacky_dump_completions())]
    #[serde(skip)]
    pub dump_completions: Option<Shell>,
}

#[must_use]
pub fn hacky_dump_completions() -> impl clap::builder::TypedValueParser {
    move |s: &str| {
        let parsed = Shell::from_str(s, true);

        if let Ok(shell) = &parsed {
            clap_complete::generate(
                *shell,
                &mut CliArgs::command(),
                "gateway-cli",
                &mut std::io::stdout(),
            );
            std::process::exit(0);
        }

        parsed
            .map(|_| ())
            .map_err(|_| ValidationError::new("Invalid shell"))
    }
}
