//! Core library for the `weather-archive` CLI.
//!
//! This crate defines:
//! - Configuration (location, units, date ranges, store and cache paths)
//! - The archive provider abstraction and its Open-Meteo client
//! - Fetching and aligning daily series into rows
//! - Full-replace persistence into SQLite
//!
//! It is used by `archive-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod store;

pub use config::{Config, RangeConfig};
pub use error::{FetchError, StoreError};
pub use fetcher::Fetcher;
pub use model::{DailyWeatherRecord, DateRange, Location, Units, WeatherTable};
pub use provider::{ArchiveProvider, provider_from_config};
pub use store::{ColumnInfo, LoadSummary, ReplaceMode, WeatherStore};
