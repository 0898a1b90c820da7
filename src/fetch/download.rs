use anyhow::{bail, Context, Result};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::process::Command;
use tracing::debug;

use super::DatasetId;

/// Places `<slug>.zip` for `dataset` inside `dest_dir`.
#[allow(async_fn_in_trait)]
pub trait Downloader {
    async fn download(&self, dataset: &DatasetId, dest_dir: &Path) -> Result<()>;
}

/// Waits between download attempts.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Shells out to `kaggle datasets download -d <id> -p <dir>`.
/// The child is killed if the attempt is dropped on timeout.
#[derive(Debug, Clone)]
pub struct KaggleCli {
    program: PathBuf,
}

impl Default for KaggleCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("kaggle"),
        }
    }
}

impl KaggleCli {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Downloader for KaggleCli {
    async fn download(&self, dataset: &DatasetId, dest_dir: &Path) -> Result<()> {
        debug!(program = %self.program.display(), %dataset, "spawning download");
        let status = Command::new(&self.program)
            .args(["datasets", "download", "-d", dataset.as_str(), "-p"])
            .arg(dest_dir)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("spawning {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with {}", self.program.display(), status);
        }
        Ok(())
    }
}
