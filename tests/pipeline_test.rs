use anyhow::Result;
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use wagepipe::{
    fetch::{DatasetId, Downloader},
    load::{SqliteSink, TABLE_NAME},
    pipeline, Config, PipelineError,
};
use zip::write::SimpleFileOptions;

const WAGES_CSV: &str = "\
year,white_less_than_hs,white_high_school,white_some_college,white_bachelors_degree,white_advanced_degree,black_high_school,hispanic_high_school
1980,10.0,20.0,30.0,40.0,50.0,15.5,9.0
1981,12.0,22.0,32.0,42.0,52.0,16.5,9.5
";

const EMPLOYMENT_CSV: &str = "\
year,total_population,men,black,white_65+
1981,229500,70.1,52.8,12.0
1980,227200,71.0,53.6,12.5
";

/// Serves fixed CSV files as `<slug>.zip`, keyed by dataset slug.
struct FakeKaggle {
    files: HashMap<&'static str, &'static str>,
}

impl FakeKaggle {
    fn new(wages: &'static str, employment: &'static str) -> Self {
        Self {
            files: HashMap::from([("wages", wages), ("employment", employment)]),
        }
    }
}

impl Downloader for FakeKaggle {
    async fn download(&self, dataset: &DatasetId, dest_dir: &Path) -> Result<()> {
        let csv = self
            .files
            .get(dataset.slug())
            .ok_or_else(|| anyhow::anyhow!("404: {dataset}"))?;
        let file = fs::File::create(dest_dir.join(dataset.archive_name()))?;
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(format!("{}.csv", dataset.slug()), SimpleFileOptions::default())?;
        zip.write_all(csv.as_bytes())?;
        zip.finish()?;
        Ok(())
    }
}

fn setup() -> (TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let creds = dir.path().join("kaggle.json");
    fs::write(&creds, r#"{"username":"u","key":"k"}"#).unwrap();
    let config = Config {
        data_dir: dir.path().join("data"),
        credentials_source: creds,
        credentials_dir: Some(dir.path().join("home").join(".kaggle")),
        wages_dataset: "tester/wages".into(),
        employment_dataset: "tester/employment".into(),
        max_retries: 0,
        retry_delay_secs: 0,
        download_timeout_secs: 5,
        ..Config::default()
    };
    (dir, config)
}

fn table_exists(sink: &SqliteSink) -> bool {
    let Some(conn) = sink.connection() else {
        return false;
    };
    conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE_NAME],
            |r| r.get::<_, i64>(0),
        )
        .unwrap()
        == 1
}

#[tokio::test]
async fn two_years_end_to_end() {
    let (dir, mut config) = setup();
    let snapshot: PathBuf = dir.path().join("out").join("final.parquet");
    config.parquet_snapshot = Some(snapshot.clone());
    let mut sink = SqliteSink::open_in_memory().unwrap();

    let table = pipeline::run(&config, FakeKaggle::new(WAGES_CSV, EMPLOYMENT_CSV), &mut sink)
        .await
        .unwrap();
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.schema().field(0).name(), "year");
    assert_eq!(table.schema().field(1).name(), "total_population");

    let rows: Vec<(i64, i64, f64, f64, f64)> = sink
        .connection()
        .unwrap()
        .prepare(&format!(
            "SELECT year, total_population, White_People_Average_Hourly_Wage, \
             Black_People_Average_Hourly_Wage, Black_Employment_Ratio_All_Ages \
             FROM {TABLE_NAME} ORDER BY rowid"
        ))
        .unwrap()
        .query_map([], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
        })
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (1981, 229500, 32.0, 16.5, 52.8),
            (1980, 227200, 30.0, 15.5, 53.6),
        ]
    );

    let columns: Vec<String> = sink
        .connection()
        .unwrap()
        .prepare(&format!("SELECT name FROM pragma_table_info('{TABLE_NAME}')"))
        .unwrap()
        .query_map([], |r| r.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert!(!columns.iter().any(|c| c.contains("hispanic") || c == "men"));
    assert!(columns.contains(&"White_Employment_Ratio_Age_65_Plus".to_string()));

    // archives are consumed, their contents stay behind
    assert!(!config.data_dir.join("wages.zip").exists());
    assert!(config.data_dir.join("wages.csv").exists());
    assert!(config
        .credentials_dir()
        .unwrap()
        .join("kaggle.json")
        .exists());
    assert!(snapshot.exists());
}

#[tokio::test]
async fn missing_credentials_stop_the_run() {
    let (dir, mut config) = setup();
    config.credentials_source = dir.path().join("absent.json");
    let mut sink = SqliteSink::open_in_memory().unwrap();

    let err = pipeline::run(&config, FakeKaggle::new(WAGES_CSV, EMPLOYMENT_CSV), &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingCredentials(_)));
    assert!(!table_exists(&sink));
}

#[tokio::test]
async fn missing_credentials_leave_no_database() {
    let (dir, mut config) = setup();
    config.credentials_source = dir.path().join("absent.json");
    let mut sink = SqliteSink::deferred(config.database_path());

    assert!(pipeline::run(&config, FakeKaggle::new(WAGES_CSV, EMPLOYMENT_CSV), &mut sink)
        .await
        .is_err());
    assert!(!config.database_path().exists());
}

#[tokio::test]
async fn snapshot_failure_publishes_nothing() {
    let (dir, mut config) = setup();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    config.parquet_snapshot = Some(blocker.join("final.parquet"));
    let mut sink = SqliteSink::open_in_memory().unwrap();

    let err = pipeline::run(&config, FakeKaggle::new(WAGES_CSV, EMPLOYMENT_CSV), &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Sink(_)));
    assert!(!table_exists(&sink));
}

#[tokio::test]
async fn disjoint_years_publish_nothing() {
    let (_dir, config) = setup();
    let employment = "year,total_population,black\n1999,1,2.0\n";
    let mut sink = SqliteSink::open_in_memory().unwrap();

    let err = pipeline::run(&config, FakeKaggle::new(WAGES_CSV, employment), &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyMerge));
    assert!(!table_exists(&sink));
}

#[tokio::test]
async fn failed_download_is_fatal() {
    let (_dir, mut config) = setup();
    config.employment_dataset = "tester/nothing-here".into();
    let mut sink = SqliteSink::open_in_memory().unwrap();

    let err = pipeline::run(&config, FakeKaggle::new(WAGES_CSV, EMPLOYMENT_CSV), &mut sink)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Fetch(wagepipe::FetchError::RetryExhausted { attempts: 1, .. })
    ));
}
