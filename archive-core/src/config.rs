use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    model::{DateRange, Location, Units},
    provider::open_meteo::DEFAULT_ARCHIVE_URL,
    retry::RetryConfig,
    store::ReplaceMode,
};

/// One `[[ranges]]` entry, kept as written so invalid days can be reported or clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub start: String,
    pub end: String,
}

impl RangeConfig {
    fn new(start: &str, end: &str) -> Self {
        Self { start: start.to_string(), end: end.to_string() }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub archive_url: String,

    pub database_path: PathBuf,

    /// Response cache directory. Falls back to the platform cache dir.
    pub cache_dir: Option<PathBuf>,

    pub replace_mode: ReplaceMode,

    pub location: Location,

    pub units: Units,

    pub retry: RetryConfig,

    /// Example TOML:
    /// [[ranges]]
    /// start = "2023-01-01"
    /// end = "2023-01-31"
    pub ranges: Vec<RangeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            location: Location::default(),
            units: Units::default(),
            ranges: vec![
                RangeConfig::new("2023-01-01", "2023-01-31"),
                RangeConfig::new("2023-02-01", "2023-02-30"),
                RangeConfig::new("2023-03-01", "2023-03-31"),
                RangeConfig::new("2023-10-01", "2023-10-31"),
            ],
            database_path: PathBuf::from("project_data.db"),
            cache_dir: None,
            retry: RetryConfig::default(),
            replace_mode: ReplaceMode::default(),
        }
    }
}

impl Config {
    /// Validated date ranges, in configured order.
    pub fn date_ranges(&self) -> Result<Vec<DateRange>> {
        self.ranges
            .iter()
            .map(|r| {
                DateRange::parse(&r.start, &r.end)
                    .with_context(|| format!("Invalid range {}..{} in config", r.start, r.end))
            })
            .collect()
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.cache_dir().join("http-cache")),
        }
    }

    /// Load config from the default location, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-archive", "weather-archive")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
