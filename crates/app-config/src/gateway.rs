use std::{convert::Infallible, fmt, path::PathBuf, str::FromStr};

use clap::{Args, ValueHint};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::validators::directory::validate_scratch_root;

pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_PER_JOB_TIMEOUT_SECONDS: u64 = 120;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 10;

/// Platform names accepted by `--recognizer-order`.
pub const KNOWN_PLATFORMS: &[&str] = &["tiktok", "instagram", "reddit", "deezer"];

#[derive(Debug, Clone, Serialize, Deserialize, Args, Validate)]
#[clap(next_help_heading = Some("Gateway limits"))]
pub struct GatewayConfig {
    /// Largest artifact, in bytes, that will be handed back to a requester.
    ///
    /// Passed to the extraction tools as a hint and enforced on disk after every download.
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_BYTES, env = "MEDIA_GATEWAY_MAX_FILE_SIZE_BYTES")]
    #[validate(range(min = 1))]
    pub max_file_size_bytes: u64,

    /// Base directory for per-job scratch directories.
    ///
    /// Created if it does not exist. Defaults to `<cache dir>/gateway`.
    #[arg(long, default_value = None, env = "MEDIA_GATEWAY_TEMP_ROOT", value_hint = ValueHint::DirPath)]
    #[validate(custom(function = "validate_scratch_root"))]
    pub temp_root: Option<PathBuf>,

    /// Seconds a single extraction may run before it is killed.
    #[arg(long = "per-job-timeout", default_value_t = DEFAULT_PER_JOB_TIMEOUT_SECONDS, env = "MEDIA_GATEWAY_PER_JOB_TIMEOUT")]
    #[validate(range(min = 1))]
    pub per_job_timeout_seconds: u64,

    /// Maximum number of jobs allowed to run at the same time.
    ///
    /// Requests arriving while all slots are taken are rejected as rate limited.
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENT_JOBS, env = "MEDIA_GATEWAY_MAX_CONCURRENT_JOBS")]
    #[validate(range(min = 1))]
    pub max_concurrent_jobs: usize,

    /// Length of the per-requester rate limit window, in seconds.
    #[arg(long = "rate-limit-window", default_value_t = DEFAULT_RATE_LIMIT_WINDOW_SECONDS, env = "MEDIA_GATEWAY_RATE_LIMIT_WINDOW")]
    #[validate(range(min = 1))]
    pub rate_limit_window_seconds: u64,

    /// Requests a single requester may make inside one window.
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_MAX_REQUESTS, env = "MEDIA_GATEWAY_RATE_LIMIT_MAX_REQUESTS")]
    #[validate(range(min = 1))]
    pub rate_limit_max_requests: u32,

    /// Credential for full-length music downloads (a Deezer ARL cookie).
    ///
    /// Without it music requests still succeed, but only return a preview clip.
    #[arg(long, default_value = None, env = "MEDIA_GATEWAY_MUSIC_CREDENTIAL", hide_env_values = true)]
    #[serde(skip_serializing, default)]
    pub music_credential: Option<Credential>,

    /// Order in which URL recognizers are tried. First match wins.
    #[arg(long, value_delimiter = ',', default_value = "tiktok,instagram,reddit,deezer", env = "MEDIA_GATEWAY_RECOGNIZER_ORDER")]
    #[validate(custom(function = "validate_recognizer_order"))]
    pub recognizer_order: Vec<String>,
}
impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            temp_root: None,
            per_job_timeout_seconds: DEFAULT_PER_JOB_TIMEOUT_SECONDS,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            rate_limit_window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            music_credential: None,
            recognizer_order: KNOWN_PLATFORMS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A secret value that never shows up in logs or config dumps.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);
impl Credential {
    #[must_use]
    pub fn new<T: Into<String>>(value: T) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
impl FromStr for Credential {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.trim()))
    }
}

pub fn validate_recognizer_order(order: &Vec<String>) -> Result<(), ValidationError> {
    for name in order {
        if !KNOWN_PLATFORMS.contains(&name.as_str()) {
            return Err(ValidationError::new("Unknown platform in recognizer order"));
        }
    }

    for (i, name) in order.iter().enumerate() {
        if order[..i].contains(name) {
            return Err(ValidationError::new("Duplicate platform in recognizer order"));
        }
    }

    if order.len() != KNOWN_PLATFORMS.len() {
        return Err(ValidationError::new(
            "Recognizer order must list every platform exactly once",
        ));
    }

    Ok(())
}
