use std::env;

use tracing::Level;
pub use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "MEDIA_GATEWAY_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "MEDIA_GATEWAY_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per line, for log collectors.
    Json,
}
impl LogFormat {
    #[must_use]
    pub fn from_env_value(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

pub const COMPONENT_LEVELS: &[(&str, Level)] = &[
    ("gateway_cli", Level::INFO),
    ("app_config", Level::INFO),
    ("app_gateway", Level::INFO),
    ("app_helpers", Level::INFO),
    ("app_logger", Level::INFO),
    ("app_tasks", Level::INFO),
];

/// Initialize the logger
///
/// Extra directives can be passed through the `MEDIA_GATEWAY_LOG_LEVEL`
/// environment variable, eg. `app_gateway=trace,reqwest=debug`.
/// Set `MEDIA_GATEWAY_LOG_FORMAT=json` for structured output.
///
/// # Panics
/// Panics if the logger fails to initialize
pub fn init() {
    init_with(COMPONENT_LEVELS.to_vec());
}

pub fn init_with<T>(levels: T)
where
    T: IntoIterator<Item = (&'static str, Level)>,
{
    let mut base_level = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .parse_lossy(default_directives(levels));

    for d in env_directives(&env::var(LOG_LEVEL_ENV).unwrap_or_default()) {
        base_level = base_level.add_directive(d);
    }

    let format = LogFormat::from_env_value(&env::var(LOG_FORMAT_ENV).unwrap_or_default());
    let registry = tracing_subscriber::registry().with(base_level);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    }
    .expect("setting default subscriber failed");
}

fn default_directives<T>(levels: T) -> String
where
    T: IntoIterator<Item = (&'static str, Level)>,
{
    levels
        .into_iter()
        .map(|(k, v)| {
            if k.is_empty() {
                v.to_string()
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn env_directives(raw: &str) -> Vec<Directive> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(d) => Some(d),
            Err(e) => {
                eprintln!("Failed to parse log level directive {s:?}: {e:?}");
                None
            }
        })
        .collect()
}
