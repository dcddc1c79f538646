use std::path::{Path, PathBuf};

use app_helpers::id::ulid_id;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{subprocess, Adapter, FetchRequest, Source, USER_AGENT};
use crate::{
    artifact::{find_media_file, MediaArtifact},
    error::{ErrorKind, GatewayError},
    platform::Platform,
};

const SOCKET_TIMEOUT_SECS: u64 = 30;

/// Videos from Reddit and TikTok through `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: Option<PathBuf>,
}

impl YtDlp {
    #[must_use]
    pub const fn new(program: Option<PathBuf>) -> Self {
        Self { program }
    }

    fn command(program: &Path, url: &str, req: &FetchRequest<'_>) -> Result<Command, GatewayError> {
        let output_template = output_template(req.work_dir);
        let output_template = output_template
            .to_str()
            .ok_or_else(|| GatewayError::internal("Work dir path is not valid UTF-8"))?;

        let mut cmd = Command::new(program);
        cmd.arg("--ignore-config")
            .arg("--no-playlist")
            .args(["--max-filesize", &req.constraints.max_size_bytes.to_string()])
            .arg("--no-part")
            .arg("--no-mtime")
            .arg("--no-progress")
            .args(["--socket-timeout", &SOCKET_TIMEOUT_SECS.to_string()])
            .args(["--user-agent", USER_AGENT])
            .arg("--write-info-json")
            .arg("--no-write-playlist-metafiles")
            .args(["--output", output_template])
            .args(["--no-simulate", "--print", "after_move:filepath"])
            .arg(url)
            .current_dir(req.work_dir);

        Ok(cmd)
    }
}

#[async_trait::async_trait]
impl Adapter for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn platforms(&self) -> &[Platform] {
        &[Platform::Reddit, Platform::Tiktok]
    }

    fn can_run(&self) -> bool {
        self.program.is_some()
    }

    #[tracing::instrument(skip_all, fields(adapter = self.name(), source = %req.source))]
    async fn fetch(&self, req: &FetchRequest<'_>) -> Result<MediaArtifact, GatewayError> {
        let Source::Url(url) = &req.source else {
            return Err(GatewayError::internal("yt-dlp was given a search query"));
        };
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| GatewayError::internal("yt-dlp is not installed"))?;

        let cmd = Self::command(program, url.as_str(), req)?;
        let output = subprocess::run(
            self.name(),
            cmd,
            req.constraints.timeout,
            &req.cancel,
        )
        .await
        .map_err(|e| e.into_gateway_error(req.work_dir))?;

        let file = printed_file(&output.stdout, req.work_dir)
            .or_else(|| find_media_file(req.work_dir))
            .ok_or_else(|| {
                if subprocess::mentions_size_limit(&output.stderr) {
                    GatewayError::new(ErrorKind::FileTooLarge)
                } else {
                    GatewayError::with_detail(ErrorKind::DownloadFailed, "no artifact produced")
                }
            })?;
        debug!(?file, "yt-dlp downloaded file");

        let title = read_title(&file).await;

        Ok(MediaArtifact::from_download(file).await?.with_title(title))
    }
}

fn output_template(work_dir: &Path) -> PathBuf {
    work_dir.join(format!("{}.%(id).64s.%(ext)s", ulid_id()))
}

/// The last path `--print after_move:filepath` wrote that exists inside `work_dir`.
fn printed_file(stdout: &str, work_dir: &Path) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(PathBuf::from)
        .filter(|x| x.starts_with(work_dir) && x.is_file())
        .last()
}

/// Title from the `.info.json` written next to the download.
async fn read_title(file: &Path) -> Option<String> {
    let info_path = file.with_extension("info.json");
    let raw = tokio::fs::read(&info_path).await.ok()?;
    let info = serde_json::from_slice::<serde_json::Value>(&raw).ok()?;
    trace!(?info_path, "Read yt-dlp info file");

    info.get("title")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
