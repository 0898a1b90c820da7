// src/fetch/mod.rs
//! Retrieve a named dataset archive and unpack its first table.

use anyhow::anyhow;
use arrow::record_batch::RecordBatch;
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{fs, time::timeout};
use tracing::{error, info, instrument, warn};

use crate::error::FetchError;

pub mod archive;
pub mod download;

pub use archive::{read_csv, unpack_first_table, ExtractError};
pub use download::{Downloader, KaggleCli, Sleeper, TokioSleeper};

/// `<owner>/<slug>` as understood by the dataset provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetId {
    full: String,
    split: usize,
}

impl DatasetId {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let mut parts = raw.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(slug), None) if !owner.is_empty() && !slug.is_empty() => Ok(Self {
                full: raw.to_string(),
                split: owner.len(),
            }),
            _ => Err(FetchError::InvalidDatasetId(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn owner(&self) -> &str {
        &self.full[..self.split]
    }

    pub fn slug(&self) -> &str {
        &self.full[self.split + 1..]
    }

    /// File name the provider writes: `<slug>.zip`.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.slug())
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

/// Fixed-delay retry bound. `max_retries` counts retries, not attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(300),
        }
    }
}

pub struct Fetcher<D, S = TokioSleeper> {
    downloader: D,
    sleeper: S,
    policy: RetryPolicy,
    archive_dir: PathBuf,
    data_dir: PathBuf,
}

impl<D: Downloader> Fetcher<D, TokioSleeper> {
    pub fn new(downloader: D, policy: RetryPolicy, archive_dir: &Path, data_dir: &Path) -> Self {
        Self::with_sleeper(downloader, TokioSleeper, policy, archive_dir, data_dir)
    }
}

impl<D: Downloader, S: Sleeper> Fetcher<D, S> {
    pub fn with_sleeper(
        downloader: D,
        sleeper: S,
        policy: RetryPolicy,
        archive_dir: &Path,
        data_dir: &Path,
    ) -> Self {
        Self {
            downloader,
            sleeper,
            policy,
            archive_dir: archive_dir.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Download `dataset` (with retries), then unpack it.
    ///
    /// `Ok(None)` means the archive arrived but could not be read; the error
    /// has already been reported and the caller decides what an absent table
    /// means. Retry exhaustion and a missing archive are hard errors.
    #[instrument(level = "info", skip_all, fields(dataset = %dataset))]
    pub async fn fetch(&self, dataset: &DatasetId) -> Result<Option<RecordBatch>, FetchError> {
        fs::create_dir_all(&self.archive_dir).await?;
        fs::create_dir_all(&self.data_dir).await?;

        self.download_with_retry(dataset).await?;

        let zip_path = self.archive_dir.join(dataset.archive_name());
        if !fs::try_exists(&zip_path).await.unwrap_or(false) {
            error!(path = %zip_path.display(), "no archive after download");
            return Err(FetchError::ArchiveMissing(zip_path));
        }

        // offload decompression + CSV parsing to the blocking pool
        let data_dir = self.data_dir.clone();
        let unpacked =
            tokio::task::spawn_blocking(move || unpack_first_table(&zip_path, &data_dir))
                .await
                .unwrap_or_else(|join_err| Err(ExtractError::Unknown(anyhow!(join_err))));

        match unpacked {
            Ok(table) => {
                info!(
                    rows = table.num_rows(),
                    columns = table.num_columns(),
                    "dataset loaded"
                );
                Ok(Some(table))
            }
            Err(e) => {
                warn!(error = %e, "extraction failed, no table produced");
                Ok(None)
            }
        }
    }

    async fn download_with_retry(&self, dataset: &DatasetId) -> Result<(), FetchError> {
        let mut retries = 0u32;
        loop {
            let attempt = retries + 1;
            info!(attempt, "downloading");
            let outcome = match timeout(
                self.policy.attempt_timeout,
                self.downloader.download(dataset, &self.archive_dir),
            )
            .await
            {
                Ok(res) => res,
                Err(_) => Err(anyhow!(
                    "timed out after {:?}",
                    self.policy.attempt_timeout
                )),
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) => {
                    retries += 1;
                    if retries > self.policy.max_retries {
                        error!(attempts = attempt, error = %e, "Exhausted retries");
                        return Err(FetchError::RetryExhausted {
                            dataset: dataset.to_string(),
                            attempts: attempt,
                        });
                    }
                    warn!(
                        attempt,
                        delay_secs = self.policy.retry_delay.as_secs_f64(),
                        error = %e,
                        "Retrying"
                    );
                    self.sleeper.sleep(self.policy.retry_delay).await;
                }
            }
        }
    }
}
