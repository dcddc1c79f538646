use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use super::{subprocess, Adapter, FetchRequest, Source};
use crate::{
    artifact::{find_media_file, MediaArtifact},
    error::{ErrorKind, GatewayError},
    platform::Platform,
};

/// Instagram posts through `gallery-dl`. Only the first item of a post is fetched.
#[derive(Debug, Clone)]
pub struct GalleryDl {
    program: Option<PathBuf>,
}

impl GalleryDl {
    #[must_use]
    pub const fn new(program: Option<PathBuf>) -> Self {
        Self { program }
    }

    fn command(program: &Path, url: &str, req: &FetchRequest<'_>) -> Command {
        let mut cmd = Command::new(program);
        cmd.arg("--directory")
            .arg(req.work_dir)
            .args(["--filename", "{category}_{id}.{extension}"])
            .arg("--no-part")
            .args(["--range", "1"])
            .args(["--filesize-max", &req.constraints.max_size_bytes.to_string()])
            .arg("--write-metadata")
            .arg(url)
            .current_dir(req.work_dir);

        cmd
    }
}

#[async_trait::async_trait]
impl Adapter for GalleryDl {
    fn name(&self) -> &'static str {
        "gallery-dl"
    }

    fn platforms(&self) -> &[Platform] {
        &[Platform::Instagram]
    }

    fn can_run(&self) -> bool {
        self.program.is_some()
    }

    #[tracing::instrument(skip_all, fields(adapter = self.name(), source = %req.source))]
    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<MediaArtifact, GatewayError> {
        let Source::Url(url) = &req.source else {
            return Err(GatewayError::internal("gallery-dl was given a search query"));
        };
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| GatewayError::internal("gallery-dl is not installed"))?;

        let output = subprocess::run(
            self.name(),
            Self::command(program, url.as_str(), req),
            req.constraints.timeout,
            &req.cancel,
        )
        .await
        .map_err(|e| e.into_gateway_error(req.work_dir))?;

        // Oversized files are skipped with a zero exit code.
        let file = find_media_file(req.work_dir).ok_or_else(|| {
            if subprocess::mentions_size_limit(&output.stderr) {
                GatewayError::new(ErrorKind::FileTooLarge)
            } else {
                GatewayError::with_detail(ErrorKind::DownloadFailed, "no artifact produced")
            }
        })?;
        debug!(?file, "gallery-dl downloaded file");

        let caption = read_caption(&file).await;

        Ok(MediaArtifact::from_download(file).await?.with_title(caption))
    }
}

/// Caption from the `<file>.json` metadata written by `--write-metadata`.
async fn read_caption(file: &Path) -> Option<String> {
    let mut meta_path = file.as_os_str().to_owned();
    meta_path.push(".json");

    let raw = tokio::fs::read(&meta_path).await.ok()?;
    let meta = serde_json::from_slice::<serde_json::Value>(&raw).ok()?;

    ["description", "caption"]
        .into_iter()
        .find_map(|key| meta.get(key).and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}
