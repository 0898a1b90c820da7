// src/load/sqlite.rs

use anyhow::{ensure, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};
use rusqlite::{params_from_iter, types::Value, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use super::Sink;

/// SQLite database file (or in-memory database) as a table sink.
pub struct SqliteSink {
    path: Option<PathBuf>,
    conn: Option<Connection>,
}

impl SqliteSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Some(connect(path)?),
        })
    }

    /// Touches nothing on disk until the first table is written.
    pub fn deferred<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: None,
        }
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            path: None,
            conn: Some(Connection::open_in_memory()?),
        })
    }

    /// `None` for a deferred sink that has not written anything yet.
    pub fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    fn connection_mut(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            let path = self
                .path
                .as_deref()
                .context("sink has neither a connection nor a path")?;
            self.conn = Some(connect(path)?);
        }
        self.conn.as_mut().context("database connection unavailable")
    }
}

fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("opening database {}", path.display()))?;
    debug!(path = %path.display(), "database opened");
    Ok(conn)
}

impl Sink for SqliteSink {
    #[instrument(level = "info", skip(self, batch), fields(rows = batch.num_rows()))]
    fn replace_table(&mut self, name: &str, batch: &RecordBatch) -> Result<()> {
        ensure!(batch.num_columns() > 0, "table `{name}` has no columns");

        let schema = batch.schema();
        let table = quote_ident(name);
        let column_defs: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name()), sql_type(f.data_type())))
            .collect();
        let placeholders = vec!["?"; schema.fields().len()].join(", ");

        let columns: Vec<Vec<Value>> = batch
            .columns()
            .iter()
            .map(column_values)
            .collect::<Result<_>>()?;

        let tx = self.connection_mut()?.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {table}"), [])?;
        tx.execute(
            &format!("CREATE TABLE {table} ({})", column_defs.join(", ")),
            [],
        )?;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {table} VALUES ({placeholders})"))?;
            for row in 0..batch.num_rows() {
                stmt.execute(params_from_iter(columns.iter().map(|c| &c[row])))?;
            }
        }
        tx.commit()?;

        info!(table = name, rows = batch.num_rows(), "table replaced");
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(dt: &DataType) -> &'static str {
    if dt.is_integer() {
        "INTEGER"
    } else if dt.is_floating() {
        "REAL"
    } else {
        "TEXT"
    }
}

fn column_values(col: &ArrayRef) -> Result<Vec<Value>> {
    let dt = col.data_type();
    if dt.is_integer() {
        let ints = cast(col, &DataType::Int64)?;
        let ints = ints
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("integer column did not cast to Int64")?;
        Ok(ints
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Integer))
            .collect())
    } else if dt.is_floating() {
        let floats = cast(col, &DataType::Float64)?;
        let floats = floats
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("float column did not cast to Float64")?;
        Ok(floats
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Real))
            .collect())
    } else {
        (0..col.len())
            .map(|i| -> Result<Value> {
                if col.is_null(i) {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Text(array_value_to_string(col, i)?))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int16Array, StringArray};
    use std::sync::Arc;

    /// Every other wage is missing.
    fn sample(years: Vec<i16>) -> RecordBatch {
        let n = years.len();
        let wages: Vec<Option<f64>> = (0..n)
            .map(|i| (i % 2 == 0).then_some(17.25))
            .collect();
        RecordBatch::try_from_iter(vec![
            ("year", Arc::new(Int16Array::from(years)) as ArrayRef),
            ("wage", Arc::new(Float64Array::from(wages)) as ArrayRef),
            (
                "note",
                Arc::new(StringArray::from(vec![Some("a\"b"); n])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn count(sink: &SqliteSink, table: &str) -> i64 {
        sink.connection().unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn writes_typed_columns() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        sink.replace_table("t", &sample(vec![2005, 1995])).unwrap();
        assert_eq!(count(&sink, "t"), 2);

        let types: Vec<String> = sink
            .connection()
            .unwrap()
            .prepare("SELECT type FROM pragma_table_info('t') ORDER BY cid")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(types, vec!["INTEGER", "REAL", "TEXT"]);

        let (year, wage, note): (i64, Option<f64>, String) = sink
            .connection()
            .unwrap()
            .query_row("SELECT year, wage, note FROM t WHERE year = 2005", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!((year, wage, note.as_str()), (2005, Some(17.25), "a\"b"));

        let missing: Option<f64> = sink
            .connection()
            .unwrap()
            .query_row("SELECT wage FROM t WHERE year = 1995", [], |r| r.get(0))
            .unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn replaces_previous_contents() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        sink.replace_table("t", &sample(vec![1, 2, 3])).unwrap();
        sink.replace_table("t", &sample(vec![4])).unwrap();
        assert_eq!(count(&sink, "t"), 1);
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.db");
        SqliteSink::open(&path)
            .unwrap()
            .replace_table("t", &sample(vec![1980]))
            .unwrap();
        let reopened = SqliteSink::open(&path).unwrap();
        assert_eq!(count(&reopened, "t"), 1);
    }

    #[test]
    fn deferred_sink_creates_file_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        let mut sink = SqliteSink::deferred(&path);
        assert!(!path.exists());
        assert!(sink.connection().is_none());

        sink.replace_table("t", &sample(vec![1980])).unwrap();
        assert!(path.exists());
        assert_eq!(count(&sink, "t"), 1);
    }

    #[test]
    fn columnless_table_is_rejected() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        let empty = RecordBatch::new_empty(Arc::new(arrow::datatypes::Schema::empty()));
        assert!(sink.replace_table("t", &empty).is_err());
    }
}
