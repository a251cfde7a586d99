use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    cache::ResponseCache,
    error::FetchError,
    model::{DAILY_VARIABLES, DailyRequest, DailySeries},
    retry::{RetryConfig, with_retry},
};

use super::ArchiveProvider;

pub const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

const SECONDS_PER_DAY: i64 = 86_400;

/// Client for the Open-Meteo historical weather archive.
#[derive(Debug, Clone)]
pub struct OpenMeteoArchive {
    base_url: Url,
    http: Client,
    retry: RetryConfig,
    cache: Option<ResponseCache>,
}

impl OpenMeteoArchive {
    pub fn new(base_url: &str, retry: RetryConfig) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid archive URL '{base_url}'"))?;
        Ok(Self { base_url, http: Client::new(), retry, cache: None })
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Full request URL, query included. Also the cache key.
    pub fn request_url(&self, request: &DailyRequest) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &request.location.latitude.to_string())
            .append_pair("longitude", &request.location.longitude.to_string())
            .append_pair("start_date", &request.range.start().format("%Y-%m-%d").to_string())
            .append_pair("end_date", &request.range.end().format("%Y-%m-%d").to_string())
            .append_pair("daily", &DAILY_VARIABLES.join(","))
            .append_pair("temperature_unit", request.units.temperature.as_str())
            .append_pair("precipitation_unit", request.units.precipitation.as_str())
            .append_pair("timezone", &request.location.timezone)
            .append_pair("timeformat", "unixtime");
        url
    }

    async fn fetch_body(&self, url: &Url) -> Result<String, FetchError> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url.as_str()).await? {
                return Ok(body);
            }
        }

        tracing::info!("Requesting {}", url);

        let res = with_retry(&self.retry, || self.http.get(url.clone()).send())
            .await
            .map_err(FetchError::Network)?;

        let status = res.status();
        let body = res.text().await.map_err(FetchError::Network)?;

        if !status.is_success() {
            return Err(FetchError::Status { status, body: truncate_body(&body) });
        }

        if let Some(cache) = &self.cache {
            cache.put(url.as_str(), &body).await?;
        }

        Ok(body)
    }
}

#[async_trait]
impl ArchiveProvider for OpenMeteoArchive {
    async fn daily(&self, request: &DailyRequest) -> Result<DailySeries, FetchError> {
        let url = self.request_url(request);
        let body = self.fetch_body(&url).await?;
        parse_daily(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OmPayload {
    Many(Vec<OmResponse>),
    One(OmResponse),
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    #[serde(default)]
    utc_offset_seconds: i32,
    daily: Option<OmDaily>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<i64>,
    #[serde(flatten)]
    series: HashMap<String, Vec<Option<f64>>>,
}

/// Parse an archive body into the series of its first location.
///
/// Multi-location answers are accepted, but only index 0 is used.
pub fn parse_daily(body: &str) -> Result<DailySeries, FetchError> {
    let payload: OmPayload = serde_json::from_str(body).map_err(FetchError::Parse)?;

    let first = match payload {
        OmPayload::One(r) => r,
        OmPayload::Many(list) => {
            if list.len() > 1 {
                tracing::warn!("Archive returned {} locations, using the first", list.len());
            }
            list.into_iter().next().ok_or(FetchError::EmptyResponse)?
        }
    };

    let Some(mut daily) = first.daily else {
        return Err(FetchError::MissingVariable { index: 0, name: DAILY_VARIABLES[0] });
    };

    let mut variables = Vec::with_capacity(DAILY_VARIABLES.len());
    for (index, name) in DAILY_VARIABLES.into_iter().enumerate() {
        let values = daily
            .series
            .remove(name)
            .ok_or(FetchError::MissingVariable { index, name })?;
        variables.push(values);
    }

    if daily.time.is_empty() {
        let values = variables.iter().map(Vec::len).max().unwrap_or(0);
        if values > 0 {
            return Err(FetchError::MissingTime { values });
        }
    }

    let time = daily.time.first().copied().unwrap_or_default();
    let time_end = daily.time.last().map(|t| t + SECONDS_PER_DAY).unwrap_or(time);

    Ok(DailySeries { time, time_end, utc_offset_seconds: first.utc_offset_seconds, variables })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateRange, Location, Units};

    const JAN_3_DAYS: &str = r#"{
        "latitude": 40.71,
        "longitude": -74.0,
        "utc_offset_seconds": -18000,
        "timezone": "America/New_York",
        "daily_units": {"time": "unixtime"},
        "daily": {
            "time": [1672549200, 1672635600, 1672722000],
            "temperature_2m_max": [50.1, 55.0, 48.2],
            "temperature_2m_min": [40.0, 44.3, 39.9],
            "precipitation_sum": [0.0, 0.12, null],
            "snowfall_sum": [0.0, 0.0, 0.0]
        }
    }"#;

    fn request() -> DailyRequest {
        DailyRequest {
            location: Location::default(),
            range: DateRange::parse("2023-01-01", "2023-01-03").unwrap(),
            units: Units::default(),
        }
    }

    #[test]
    fn parse_single_location() {
        let series = parse_daily(JAN_3_DAYS).unwrap();

        assert_eq!(series.time, 1672549200);
        assert_eq!(series.time_end, 1672722000 + SECONDS_PER_DAY);
        assert_eq!(series.utc_offset_seconds, -18000);
        assert_eq!(series.variables.len(), 4);
        assert_eq!(series.variables[0], vec![Some(50.1), Some(55.0), Some(48.2)]);
        assert_eq!(series.variables[2][2], None);
    }

    #[test]
    fn parse_takes_first_of_many() {
        let body = format!("[{JAN_3_DAYS}, {{\"daily\": {{\"time\": []}}}}]");
        let series = parse_daily(&body).unwrap();
        assert_eq!(series.variables[1].len(), 3);
    }

    #[test]
    fn parse_empty_list() {
        assert!(matches!(parse_daily("[]"), Err(FetchError::EmptyResponse)));
    }

    #[test]
    fn parse_reports_missing_variable_index() {
        let body = r#"{"daily": {"time": [1], "temperature_2m_max": [1.0],
            "temperature_2m_min": [1.0], "precipitation_sum": [1.0]}}"#;
        match parse_daily(body) {
            Err(FetchError::MissingVariable { index, name }) => {
                assert_eq!(index, 3);
                assert_eq!(name, "snowfall_sum");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn values_without_timestamps_are_rejected() {
        let body = r#"{"utc_offset_seconds": -18000, "daily": {"time": [],
            "temperature_2m_max": [1.0], "temperature_2m_min": [1.0],
            "precipitation_sum": [0.0], "snowfall_sum": [0.0]}}"#;
        assert!(matches!(parse_daily(body), Err(FetchError::MissingTime { values: 1 })));
    }

    #[test]
    fn empty_period_parses_to_no_rows() {
        let body = r#"{"daily": {"time": [], "temperature_2m_max": [],
            "temperature_2m_min": [], "precipitation_sum": [], "snowfall_sum": []}}"#;
        let series = parse_daily(body).unwrap();
        assert!(crate::fetcher::align(&series).is_empty());
    }

    #[test]
    fn parse_rejects_malformed_json() {
        assert!(matches!(parse_daily("{not json"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn request_url_carries_all_parameters() {
        let archive = OpenMeteoArchive::new(DEFAULT_ARCHIVE_URL, RetryConfig::default()).unwrap();
        let url = archive.request_url(&request());
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["latitude"], "40.7143");
        assert_eq!(pairs["longitude"], "-74.006");
        assert_eq!(pairs["start_date"], "2023-01-01");
        assert_eq!(pairs["end_date"], "2023-01-03");
        assert_eq!(
            pairs["daily"],
            "temperature_2m_max,temperature_2m_min,precipitation_sum,snowfall_sum"
        );
        assert_eq!(pairs["temperature_unit"], "fahrenheit");
        assert_eq!(pairs["precipitation_unit"], "inch");
        assert_eq!(pairs["timezone"], "America/New_York");
        assert_eq!(pairs["timeformat"], "unixtime");
    }

    #[test]
    fn truncate_long_body() {
        let long = "x".repeat(500);
        let t = truncate_body(&long);
        assert_eq!(t.len(), 203);
        assert!(t.ends_with("..."));
        assert_eq!(truncate_body("short"), "short");
    }
}
