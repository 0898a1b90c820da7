use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "WAGEPIPE_CONFIG";
pub const DATA_DIR_ENV: &str = "WAGEPIPE_DATA_DIR";
const DEFAULT_CONFIG_FILE: &str = "wagepipe.yaml";

/// Run-wide settings, built once in `main` and handed to every stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Where `<slug>.zip` lands; defaults to `data_dir`.
    pub archive_dir: Option<PathBuf>,
    pub credentials_source: PathBuf,
    pub credentials_dir: Option<PathBuf>,
    pub wages_dataset: String,
    pub employment_dataset: String,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub download_timeout_secs: u64,
    pub impute_strategy: String,
    pub database_file: PathBuf,
    pub parquet_snapshot: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            archive_dir: None,
            credentials_source: PathBuf::from("kaggle.json"),
            credentials_dir: None,
            wages_dataset: "asaniczka/wages-by-education-in-the-usa-1973-2022".into(),
            employment_dataset: "asaniczka/employment-to-population-ratio-for-usa-1979-2023"
                .into(),
            max_retries: 3,
            retry_delay_secs: 3,
            download_timeout_secs: 300,
            impute_strategy: "mean".into(),
            database_file: PathBuf::from("wages_and_employment_data.db"),
            parquet_snapshot: None,
        }
    }
}

impl Config {
    /// Load from `$WAGEPIPE_CONFIG`, else `./wagepipe.yaml`, else defaults.
    /// `$WAGEPIPE_DATA_DIR` wins over whatever the file says.
    pub fn load() -> Result<Self> {
        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut cfg = if path.exists() {
            info!(path = %path.display(), "loading config");
            Self::from_file(&path)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        if let Some(dir) = env::var_os(DATA_DIR_ENV) {
            cfg.data_dir = PathBuf::from(dir);
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn archive_dir(&self) -> &Path {
        self.archive_dir.as_deref().unwrap_or(&self.data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// `credentials_dir` if set, otherwise `~/.kaggle`.
    pub fn credentials_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.credentials_dir {
            return Ok(dir.clone());
        }
        env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".kaggle"))
            .ok_or_else(|| PipelineError::Config("cannot locate home directory".into()))
    }
}
