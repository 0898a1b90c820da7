use anyhow::{anyhow, Context};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    fs::{self, File},
    io::Seek,
    path::Path,
    sync::Arc,
};
use thiserror::Error;
use tracing::{debug, error, info};
use zip::{result::ZipError, ZipArchive};

use crate::table::utils::clean_str;

/// Extraction failures. Neither is fatal; the fetcher reports them and
/// yields no table.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("file is not a valid ZIP archive: {0}")]
    ArchiveCorrupt(ZipError),

    #[error("unknown extraction error: {0:#}")]
    Unknown(anyhow::Error),
}

impl From<ZipError> for ExtractError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
                ExtractError::ArchiveCorrupt(e)
            }
            other => ExtractError::Unknown(other.into()),
        }
    }
}

/// Open `zip_path`, extract every entry into `dest_dir`, parse the first
/// listed entry as CSV, then delete the archive.
pub fn unpack_first_table(zip_path: &Path, dest_dir: &Path) -> Result<RecordBatch, ExtractError> {
    let file = File::open(zip_path)
        .with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))
        .map_err(ExtractError::Unknown)?;
    let mut archive = ZipArchive::new(file)?;
    if archive.len() == 0 {
        return Err(ExtractError::Unknown(anyhow!(
            "archive {:?} has no entries",
            zip_path
        )));
    }

    archive.extract(dest_dir)?;

    let first = {
        let entry = archive.by_index(0)?;
        entry
            .enclosed_name()
            .ok_or_else(|| anyhow!("unsafe entry name {:?}", entry.name()))
            .map_err(ExtractError::Unknown)?
    };
    drop(archive);
    info!(entry = %first.display(), "dataset extracted");

    let table = read_csv(&dest_dir.join(&first)).map_err(ExtractError::Unknown)?;

    match fs::remove_file(zip_path) {
        Ok(()) => debug!(path = %zip_path.display(), "removed archive"),
        Err(e) => error!(path = %zip_path.display(), "failed to delete archive: {}", e),
    }
    Ok(table)
}

/// Parse a headed CSV file into one batch, inferring column types from the
/// whole file. Empty cells become nulls.
pub fn read_csv(path: &Path) -> anyhow::Result<RecordBatch> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let format = Format::default().with_header(true);
    let (inferred, records) = format
        .infer_schema(&mut file, None)
        .with_context(|| format!("inferring schema of {:?}", path))?;
    file.rewind()?;

    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| {
            let field = Field::clone(f).with_name(clean_str(f.name()));
            // a column with no values at all infers as Null
            if field.data_type() == &DataType::Null {
                field.with_data_type(DataType::Float64).with_nullable(true)
            } else {
                field
            }
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));
    debug!(records, columns = schema.fields().len(), "inferred CSV schema");

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .build(file)
        .context("creating CSV reader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("CSV parse error in {:?}", path))?;
    Ok(concat_batches(&schema, &batches)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arrow::{
        array::{Array, Float64Array, Int64Array},
        datatypes::DataType,
    };
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    /// Build a ZIP at `path` holding `(name, contents)` entries in order.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn parses_first_entry_and_removes_archive() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("wages.zip");
        write_zip(
            &zip_path,
            &[
                ("wages.csv", "year,white_high_school\n1980,17.5\n1981,\n"),
                ("readme.csv", "note\nignored\n"),
            ],
        );

        let table = unpack_first_table(&zip_path, dir.path()).unwrap();
        assert!(!zip_path.exists());
        assert!(dir.path().join("readme.csv").exists());
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.schema().field(0).data_type(), &DataType::Int64);

        let years = table.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(years.value(1), 1981);
        let wages = table.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(wages.value(0), 17.5);
        assert!(wages.is_null(1));
    }

    #[test]
    fn valueless_column_reads_as_float() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("employment.csv");
        fs::write(&path, "year,total_population,black,white\n1980,1,,2.0\n1981,2,,3.0\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.schema().field(2).data_type(), &DataType::Float64);
        assert_eq!(table.column(2).null_count(), 2);
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("bad.zip");
        fs::write(&zip_path, b"definitely not a zip file").unwrap();
        let err = unpack_first_table(&zip_path, dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::ArchiveCorrupt(_)));
        assert!(zip_path.exists());
    }

    #[test]
    fn empty_archive_is_unknown_error() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("empty.zip");
        write_zip(&zip_path, &[]);
        let err = unpack_first_table(&zip_path, dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Unknown(_)));
    }
}
