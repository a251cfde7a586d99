use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    Config,
    cache::ResponseCache,
    error::FetchError,
    model::{DailyRequest, DailySeries},
    provider::open_meteo::OpenMeteoArchive,
};

pub mod open_meteo;

/// Source of historical daily series for one location and range.
///
/// Implementations are expected to be idempotent for identical requests.
#[async_trait]
pub trait ArchiveProvider: Send + Sync + Debug {
    /// Series for the first location in the archive's answer.
    async fn daily(&self, request: &DailyRequest) -> Result<DailySeries, FetchError>;
}

/// Build the archive client described by `config`, with caching and retry.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn ArchiveProvider>> {
    let cache = ResponseCache::new(config.cache_dir()?);
    let provider = OpenMeteoArchive::new(&config.archive_url, config.retry.clone())?.with_cache(cache);
    Ok(Box::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_default_config() {
        let mut cfg = Config::default();
        cfg.cache_dir = Some(std::env::temp_dir().join("archive-core-provider-test"));
        assert!(provider_from_config(&cfg).is_ok());
    }

    #[test]
    fn provider_from_config_rejects_bad_url() {
        let mut cfg = Config::default();
        cfg.cache_dir = Some(std::env::temp_dir().join("archive-core-provider-test"));
        cfg.archive_url = "not a url".to_string();

        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Invalid archive URL"));
    }
}
