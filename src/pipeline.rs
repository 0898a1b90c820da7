// src/pipeline.rs
//! One full run: credentials, both downloads, both transforms, merge, load.

use arrow::record_batch::RecordBatch;
use tracing::{info, instrument};

use crate::{
    config::Config,
    credentials,
    error::{PipelineError, Result},
    fetch::{DatasetId, Downloader, Fetcher, RetryPolicy},
    load::{self, Sink, TABLE_NAME},
    transform::{self, ImputeStrategy},
};

/// Run every stage in order and publish the final table to `sink`.
/// Returns the table that was written.
#[instrument(level = "info", skip_all)]
pub async fn run<D, K>(config: &Config, downloader: D, sink: &mut K) -> Result<RecordBatch>
where
    D: Downloader,
    K: Sink + ?Sized,
{
    credentials::install(&config.credentials_source, &config.credentials_dir()?)?;

    let wages_id = DatasetId::parse(&config.wages_dataset)?;
    let employment_id = DatasetId::parse(&config.employment_dataset)?;

    let policy = RetryPolicy {
        max_retries: config.max_retries,
        retry_delay: config.retry_delay(),
        attempt_timeout: config.download_timeout(),
    };
    let fetcher = Fetcher::new(downloader, policy, config.archive_dir(), &config.data_dir);

    info!(dataset = %wages_id, "stage: fetch");
    let raw_wages = fetcher.fetch(&wages_id).await?;
    info!(dataset = %employment_id, "stage: fetch");
    let raw_employment = fetcher.fetch(&employment_id).await?;

    let strategy = ImputeStrategy::from_setting(&config.impute_strategy);

    info!("stage: transform");
    let wages = transform::transform_wages(raw_wages.as_ref(), strategy)?;
    let employment = transform::transform_employment(raw_employment.as_ref(), strategy)?;

    info!("stage: merge");
    let merged = transform::merge(&wages, &employment)?;
    let table = transform::finalize(&merged)?;

    info!(table = TABLE_NAME, rows = table.num_rows(), "stage: load");
    // the snapshot is fully written before the table is replaced
    let staged = config
        .parquet_snapshot
        .as_deref()
        .map(|path| load::stage_snapshot(path, &table))
        .transpose()
        .map_err(PipelineError::Sink)?;
    sink.replace_table(TABLE_NAME, &table)
        .map_err(PipelineError::Sink)?;
    if let Some(staged) = staged {
        staged.commit().map_err(PipelineError::Sink)?;
    }

    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "pipeline finished"
    );
    Ok(table)
}
