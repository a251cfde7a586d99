use anyhow::{Context, Result};

use crate::{
    Config,
    fetcher::Fetcher,
    model::WeatherTable,
    provider::ArchiveProvider,
    store::{LoadSummary, load_into},
};

/// What a full fetch-and-load pass did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub table: WeatherTable,
    /// `None` when nothing was fetched and the store was left untouched.
    pub load: Option<LoadSummary>,
}

/// Fetch every configured range through `provider`. Nothing is written.
pub async fn fetch(config: &Config, provider: &dyn ArchiveProvider) -> Result<WeatherTable> {
    let ranges = config.date_ranges()?;

    let fetcher = Fetcher::new(provider, config.location.clone(), config.units);
    let table = fetcher.fetch(&ranges).await.context("Failed to fetch weather data")?;

    if table.is_empty() {
        tracing::warn!("No weather data available");
    }
    Ok(table)
}

/// Replace the stored table with `table` using the configured mode.
pub fn load(config: &Config, table: &WeatherTable) -> Result<LoadSummary> {
    load_into(&config.database_path, table, config.replace_mode).with_context(|| {
        format!("Failed to load weather data into {}", config.database_path.display())
    })
}

/// [`fetch`] then [`load`]. An empty fetch is reported, not loaded.
pub async fn run(config: &Config, provider: &dyn ArchiveProvider) -> Result<RunReport> {
    let table = fetch(config, provider).await?;

    if table.is_empty() {
        return Ok(RunReport { table, load: None });
    }

    let summary = load(config, &table)?;
    Ok(RunReport { table, load: Some(summary) })
}
