pub mod cli;
pub mod common;
pub mod conditional;
pub mod gateway;
pub mod task;
pub mod timeframe;
pub mod validators;

use std::{env, fmt::Write, path::PathBuf};

use clap::Parser;
use cli::CliArgs;
use common::DumpConfigType;
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

static CONFIG: Lazy<Config> = Lazy::new(Config::new);

pub static APPLICATION_NAME: &str = "media-gateway";
pub static ORGANIZATION_NAME: &str = "allypost";
pub static ORGANIZATION_QUALIFIER: &str = "net";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(skip)]
    #[validate(nested)]
    pub run: common::RunConfig,

    /// Path to the extraction tools invoked at runtime
    #[validate(nested)]
    pub dependency_paths: common::ProgramPathConfig,

    /// External endpoints the music backend talks to
    #[validate(nested)]
    pub endpoint: common::EndpointConfig,

    /// Limits and policies enforced by the gateway core
    #[validate(nested)]
    pub gateway: gateway::GatewayConfig,

    /// Background maintenance tasks
    #[validate(nested)]
    pub task: task::TaskConfig,

    #[validate(nested)]
    pub conditional: conditional::ConditionalConfig,
}
impl Config {
    /// The process-wide config, parsed from args and env on first use.
    ///
    /// Exits the process on invalid configuration or after `--dump-config`.
    #[must_use]
    #[inline]
    pub fn global() -> &'static Self {
        &CONFIG
    }

    #[must_use]
    pub fn cache_dir() -> PathBuf {
        ProjectDirs::from(ORGANIZATION_QUALIFIER, ORGANIZATION_NAME, APPLICATION_NAME)
            .map_or_else(
                || env::temp_dir().join(APPLICATION_NAME),
                |x| x.cache_dir().into(),
            )
    }

    /// Base directory for per-job scratch space.
    ///
    /// Falls back to `<cache dir>/gateway` when not configured.
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        self.gateway
            .temp_root
            .clone()
            .unwrap_or_else(|| Self::cache_dir().join("gateway"))
    }

    #[cfg(feature = "cli")]
    #[must_use]
    #[inline]
    pub const fn cli(&self) -> &conditional::cli::CliConfig {
        &self.conditional.cli
    }

    /// Build a config from parsed arguments, resolving tool paths from `$PATH`.
    #[must_use]
    pub fn from_args(args: CliArgs) -> Self {
        let mut dependency_paths = args.dependency_path;
        dependency_paths.with_resolved_paths();

        Self {
            run: args.run,
            dependency_paths,
            endpoint: args.endpoint,
            gateway: args.gateway,
            task: args.task,
            conditional: args.conditional,
        }
    }

    /// A readable report of everything that failed validation.
    pub fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| {
            let mut report = String::new();
            write_validation_errors(&mut report, &e, 1);
            report.trim_end().to_string()
        })
    }

    pub fn render(&self, dump_type: &DumpConfigType) -> Result<String, String> {
        match dump_type {
            DumpConfigType::Json => serde_json::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config to JSON: {e}")),

            DumpConfigType::Toml => toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config to TOML: {e}")),
        }
    }

    fn new() -> Self {
        let config = Self::from_args(CliArgs::parse());

        if let Err(report) = config.check() {
            eprintln!("Errors validating configuration:\n{report}");
            std::process::exit(1);
        }

        if let Some(dump_type) = &config.run.dump_config {
            let dump_type = dump_type.clone().unwrap_or(DumpConfigType::Json);

            match config.render(&dump_type) {
                Ok(out) => {
                    println!("{}", out.trim());
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn write_validation_errors(out: &mut String, errors: &ValidationErrors, depth: usize) {
    let indent = "  ".repeat(depth);

    for (name, kind) in errors.errors() {
        let _ = writeln!(out, "{indent}{name}:");

        match kind {
            ValidationErrorsKind::Field(errors) => {
                for e in errors {
                    let _ = writeln!(out, "{indent}  - {}", e.code);
                }
            }

            ValidationErrorsKind::Struct(errors) => {
                write_validation_errors(out, errors, depth + 1);
            }

            ValidationErrorsKind::List(errors) => {
                for errors in errors.values() {
                    write_validation_errors(out, errors, depth + 1);
                }
            }
        }
    }
}
