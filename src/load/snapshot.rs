// src/load/snapshot.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use parquet::{
    arrow::ArrowWriter,
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// A snapshot fully written to `<path>.tmp`, not yet visible at `path`.
/// Dropping it without [`StagedSnapshot::commit`] removes the temp file.
#[derive(Debug)]
pub struct StagedSnapshot {
    temp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedSnapshot {
    /// Rename the temp file into place.
    pub fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp_path, &self.path)
            .with_context(|| format!("renaming {} into place", self.temp_path.display()))?;
        self.committed = true;
        info!(path = %self.path.display(), "snapshot published");
        Ok(())
    }
}

impl Drop for StagedSnapshot {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                warn!(path = %self.temp_path.display(), "failed to discard snapshot: {}", e);
            }
        }
    }
}

/// Write `batch` as Parquet to `<path>.tmp`. Nothing appears at `path`
/// until the returned handle is committed.
#[instrument(level = "info", skip(batch), fields(path = %path.display()))]
pub fn stage_snapshot(path: &Path, batch: &RecordBatch) -> Result<StagedSnapshot> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .build();

    let temp_path = path.with_extension("tmp");
    let file = fs::File::create(&temp_path)
        .with_context(|| format!("creating {}", temp_path.display()))?;
    let staged = StagedSnapshot {
        temp_path,
        path: path.to_path_buf(),
        committed: false,
    };
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    info!(rows = batch.num_rows(), "snapshot staged");
    Ok(staged)
}

/// Stage and publish in one step.
pub fn write_snapshot(path: &Path, batch: &RecordBatch) -> Result<()> {
    stage_snapshot(path, batch)?.commit()
}
