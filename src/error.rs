use arrow::error::ArrowError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions raised while retrieving a dataset archive.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid dataset id `{0}`: expected `<owner>/<slug>`")]
    InvalidDatasetId(String),

    #[error("exhausted retries downloading {dataset} after {attempts} attempts")]
    RetryExhausted { dataset: String, attempts: u32 },

    #[error("download failed, no archive found at {}", .0.display())]
    ArchiveMissing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that terminates a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("credentials file {} does not exist", .0.display())]
    MissingCredentials(PathBuf),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{stage}: input table is empty")]
    EmptyInput { stage: &'static str },

    #[error("{stage}: required column `{column}` is missing")]
    MissingColumn {
        stage: &'static str,
        column: &'static str,
    },

    #[error("merge: {side} table has no `year` column")]
    MissingJoinKey { side: &'static str },

    #[error("merge produced no rows")]
    EmptyMerge,

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("sink error: {0:#}")]
    Sink(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
