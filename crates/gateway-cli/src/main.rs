use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use app_config::Config;
use app_gateway::{GatewaySettings, MediaArtifact, Request, RequestKind, RequestOrchestrator};
use app_helpers::file_name::{sanitize_file_name, MAX_FILENAME_LENGTH};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let loaded_dotenv = dotenvy::dotenv();

    app_logger::init();

    match loaded_dotenv {
        Ok(loaded_dotenv) => {
            app_logger::debug!(path = ?loaded_dotenv, "Loaded dotenv file");
        }
        Err(e) if e.not_found() => {
            app_logger::debug!("No dotenv file found");
        }
        Err(e) => {
            app_logger::warn!("Failed to load dotenv file: {e:?}");
        }
    }

    let config = Config::global();

    app_logger::debug!(config = ?*config, "Running with config");

    if let Err(e) = run(config).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let settings = GatewaySettings::from_config(config).context("Invalid recognizer order")?;
    let orchestrator =
        RequestOrchestrator::from_settings(settings).context("Failed to set up the gateway")?;

    let max_age = config
        .task
        .scratch_max_age
        .map(Duration::from)
        .unwrap_or_default();
    if let Err(e) = app_tasks::sweep_scratch(orchestrator.store(), max_age).await {
        app_logger::warn!("Failed to sweep scratch space: {e:?}");
    }

    let cancel = CancellationToken::new();
    app_tasks::start(orchestrator.store().clone(), cancel.child_token()).await;

    let cli_config = config.cli();
    let request = request_from_cli(&cli_config.text, cli_config.search, &cli_config.requester);

    let interrupt = cancel.clone();
    tokio::task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            app_logger::info!("Interrupted, cancelling request");
            interrupt.cancel();
        }
    });

    let outcome = orchestrator.run(&request, cancel.clone()).await;
    cancel.cancel();

    app_logger::debug!(job = ?outcome.job_id, state = ?outcome.state, "Request finished");

    let artifact = match outcome.result {
        Ok(x) => x,
        Err(e) => anyhow::bail!("{}", e.user_message()),
    };

    if artifact.preview() {
        eprintln!("Only a preview clip was available");
    }

    let saved = save(artifact, &cli_config.output_directory).await?;
    println!("{}", saved.display());

    Ok(())
}

fn request_from_cli(text: &[String], search: bool, requester: &str) -> Request {
    let kind = if search || text.len() > 1 {
        RequestKind::Search
    } else {
        RequestKind::Download
    };

    Request::new(text.join(" "), kind, requester)
}

/// Persist `artifact` into `output_directory` without overwriting anything.
async fn save(artifact: MediaArtifact, output_directory: &Path) -> anyhow::Result<PathBuf> {
    let dest = free_path(output_directory, &output_name(&artifact));

    artifact
        .persist(&dest)
        .await
        .with_context(|| format!("Failed to save file to {}", dest.display()))
}

fn output_name(artifact: &MediaArtifact) -> String {
    let path = artifact.path();
    let stem = artifact
        .title()
        .and_then(|x| sanitize_file_name(x, MAX_FILENAME_LENGTH))
        .or_else(|| {
            path.file_stem()
                .and_then(|x| x.to_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| "download".to_string());

    match path.extension().and_then(|x| x.to_str()) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// `dir/name`, or `dir/name (n)` for the first `n` that is not taken.
fn free_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|x| !x.exists())
        .unwrap_or(candidate)
}
