use std::{path::PathBuf, time::Duration};

use app_config::{gateway::Credential, Config};

use crate::{
    adapters::FetchConstraints,
    platform::{Platform, UnknownPlatform},
};

const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Everything the gateway core needs to know, detached from how it was configured.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub max_file_size_bytes: u64,
    pub temp_root: PathBuf,
    pub per_job_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize,
    pub music_credential: Option<Credential>,
    pub recognizer_order: Vec<Platform>,
    /// How long a timed out or cancelled job gets to stop its tools before it is dropped.
    pub kill_grace: Duration,
    pub yt_dlp_path: Option<PathBuf>,
    pub gallery_dl_path: Option<PathBuf>,
    pub deemix_path: Option<PathBuf>,
    pub deezer_api_base_url: String,
}

impl GatewaySettings {
    /// Defaults matching the configuration defaults, rooted at `temp_root`.
    pub fn new<T>(temp_root: T) -> Self
    where
        T: Into<PathBuf>,
    {
        Self {
            max_file_size_bytes: app_config::gateway::DEFAULT_MAX_FILE_SIZE_BYTES,
            temp_root: temp_root.into(),
            per_job_timeout: Duration::from_secs(
                app_config::gateway::DEFAULT_PER_JOB_TIMEOUT_SECONDS,
            ),
            max_concurrent_jobs: app_config::gateway::DEFAULT_MAX_CONCURRENT_JOBS,
            rate_limit_window: Duration::from_secs(
                app_config::gateway::DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
            ),
            rate_limit_max_requests: app_config::gateway::DEFAULT_RATE_LIMIT_MAX_REQUESTS as usize,
            music_credential: None,
            recognizer_order: Platform::RECOGNIZABLE.to_vec(),
            kill_grace: DEFAULT_KILL_GRACE,
            yt_dlp_path: None,
            gallery_dl_path: None,
            deemix_path: None,
            deezer_api_base_url: app_config::common::DEFAULT_DEEZER_API_BASE_URL.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, UnknownPlatform> {
        let gateway = &config.gateway;
        let paths = &config.dependency_paths;

        let recognizer_order = gateway
            .recognizer_order
            .iter()
            .map(|x| x.parse::<Platform>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            max_file_size_bytes: gateway.max_file_size_bytes,
            temp_root: config.temp_root(),
            per_job_timeout: Duration::from_secs(gateway.per_job_timeout_seconds),
            max_concurrent_jobs: gateway.max_concurrent_jobs,
            rate_limit_window: Duration::from_secs(gateway.rate_limit_window_seconds),
            rate_limit_max_requests: gateway.rate_limit_max_requests as usize,
            music_credential: gateway.music_credential.clone(),
            recognizer_order,
            kill_grace: DEFAULT_KILL_GRACE,
            yt_dlp_path: paths.yt_dlp_path().map(PathBuf::from),
            gallery_dl_path: paths.gallery_dl_path().map(PathBuf::from),
            deemix_path: paths.deemix_path().map(PathBuf::from),
            deezer_api_base_url: config.endpoint.deezer_api_base_url.clone(),
        })
    }

    #[must_use]
    pub const fn constraints(&self) -> FetchConstraints {
        FetchConstraints {
            max_size_bytes: self.max_file_size_bytes,
            timeout: self.per_job_timeout,
        }
    }
}
