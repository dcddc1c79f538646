use std::{fmt, path::Path};

use app_config::common::ProgramPathConfig;
use tracing::{debug, trace};

/// An extraction tool that can update itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    YtDlp,
    GalleryDl,
}

impl Tool {
    pub const ALL: [Self; 2] = [Self::YtDlp, Self::GalleryDl];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::YtDlp => "yt-dlp",
            Self::GalleryDl => "gallery-dl",
        }
    }

    #[must_use]
    pub fn program(self, paths: &ProgramPathConfig) -> Option<&Path> {
        match self {
            Self::YtDlp => paths.yt_dlp_path(),
            Self::GalleryDl => paths.gallery_dl_path(),
        }
    }

    const fn update_args(self) -> &'static [&'static str] {
        match self {
            Self::YtDlp => &["--ignore-config", "--update"],
            Self::GalleryDl => &["--update"],
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[tracing::instrument(skip_all, fields(%tool))]
pub async fn update_tool(tool: Tool, program: &Path) -> anyhow::Result<()> {
    debug!("Checking for tool updates");
    let mut cmd = {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(tool.update_args());
        cmd.kill_on_drop(true);

        cmd
    };

    trace!(?cmd, "Updating tool");

    let res = cmd.output().await?;

    trace!(?res, "Tool update result");

    if !res.status.success() {
        anyhow::bail!(
            "{tool} update failed: {output}",
            output = String::from_utf8_lossy(&res.stderr).trim()
        );
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use std::{os::unix::fs::PermissionsExt, path::PathBuf};

    use super::*;

    fn fake_tool(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("tool");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).expect("writes tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[tokio::test]
    async fn passes_update_flags() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args_file = dir.path().join("args");
        let tool = fake_tool(dir.path(), &format!("echo \"$@\" > '{}'", args_file.display()));

        update_tool(Tool::YtDlp, &tool).await.expect("update runs");

        let args = std::fs::read_to_string(args_file).expect("args written");
        assert_eq!(args.trim(), "--ignore-config --update");
    }

    #[tokio::test]
    async fn failed_update_reports_stderr() {
        let dir = tempfile::tempdir().expect("temp dir");
        let tool = fake_tool(dir.path(), "echo 'no network' >&2\nexit 2");

        let err = update_tool(Tool::GalleryDl, &tool)
            .await
            .expect_err("update fails");

        assert_eq!(err.to_string(), "gallery-dl update failed: no network");
    }

    #[test]
    fn program_comes_from_config() {
        let paths = ProgramPathConfig::default();

        assert!(Tool::ALL.iter().all(|x| x.program(&paths).is_none()));
    }
}
