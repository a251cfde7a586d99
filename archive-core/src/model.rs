use std::{collections::HashSet, fmt};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One calendar day of observations.
///
/// Measurements are `None` when the archive reported `null` for that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeatherRecord {
    pub date: NaiveDate,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub snowfall_sum: Option<f64>,
}

impl DailyWeatherRecord {
    /// `YYYY-MM-DD`, the form the store keys rows by.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Inclusive `(start, end)` pair of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            bail!("Date range start {start} is after end {end}");
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `YYYY-MM-DD` strings.
    ///
    /// A day past the end of its month (e.g. `2023-02-30`) is clamped to the
    /// month's last day. Anything else that is not a valid date is rejected.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_date_clamped(start)?;
        let end = parse_date_clamped(end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn span_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn parse_date_clamped(value: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    let mut parts = value.splitn(3, '-');
    let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Invalid date '{value}', expected YYYY-MM-DD");
    };

    let year: i32 = y.parse().with_context(|| format!("Invalid year in date '{value}'"))?;
    let month: u32 = m.parse().with_context(|| format!("Invalid month in date '{value}'"))?;
    let day: u32 = d.parse().with_context(|| format!("Invalid day in date '{value}'"))?;

    let last = last_day_of_month(year, month)
        .ok_or_else(|| anyhow!("Invalid month in date '{value}'"))?;

    if day == 0 || day <= last.day() {
        bail!("Invalid date '{value}'");
    }

    tracing::warn!("Date '{value}' does not exist, clamping to {last}");
    Ok(last)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        first.with_month(month + 1)?
    };
    next.pred_opt()
}

/// Geographic point the archive is queried for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl Default for Location {
    fn default() -> Self {
        Self { latitude: 40.7143, longitude: -74.006, timezone: "America/New_York".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "fahrenheit",
            TemperatureUnit::Celsius => "celsius",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationUnit {
    #[default]
    Inch,
    Mm,
}

impl PrecipitationUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrecipitationUnit::Inch => "inch",
            PrecipitationUnit::Mm => "mm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Units {
    #[serde(default)]
    pub temperature: TemperatureUnit,
    #[serde(default)]
    pub precipitation: PrecipitationUnit,
}

/// Daily variables requested from the archive, in request order.
///
/// The position of each variable is the index its series is read back from.
pub const DAILY_VARIABLES: [&str; 4] =
    ["temperature_2m_max", "temperature_2m_min", "precipitation_sum", "snowfall_sum"];

/// Everything needed to ask the archive for one range.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRequest {
    pub location: Location,
    pub range: DateRange,
    pub units: Units,
}

/// Series as returned by the archive for one location, before alignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    /// First day of the covered period, Unix seconds.
    pub time: i64,
    /// Exclusive end of the covered period, Unix seconds.
    pub time_end: i64,
    /// Offset of the requested timezone; timestamps are local midnights shifted by it.
    pub utc_offset_seconds: i32,
    /// One series per entry of [`DAILY_VARIABLES`], same order.
    pub variables: Vec<Vec<Option<f64>>>,
}

/// Ordered rows produced by a fetch. Row order is range order, then day order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherTable {
    rows: Vec<DailyWeatherRecord>,
}

impl WeatherTable {
    pub fn new(rows: Vec<DailyWeatherRecord>) -> Self {
        Self { rows }
    }

    /// Concatenate tables keeping their order and the order within each.
    pub fn concat(tables: impl IntoIterator<Item = WeatherTable>) -> Self {
        let rows = tables.into_iter().flat_map(|t| t.rows).collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[DailyWeatherRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_duplicate_dates(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows.iter().any(|r| !seen.insert(r.date))
    }

    /// Drop every row whose date already appeared earlier. Returns how many were removed.
    pub fn dedup_by_date(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::with_capacity(before);
        self.rows.retain(|r| seen.insert(r.date));
        before - self.rows.len()
    }

    /// Tabular rendering of the first `n` rows.
    pub fn preview(&self, n: usize) -> String {
        let mut out = format!(
            "{:>5}  {:<10}  {:>15}  {:>15}  {:>17}  {:>12}\n",
            "", "date", "temperature_max", "temperature_min", "precipitation_sum", "snowfall_sum"
        );
        for (i, r) in self.rows.iter().take(n).enumerate() {
            out.push_str(&format!(
                "{:>5}  {:<10}  {:>15}  {:>15}  {:>17}  {:>12}\n",
                i,
                r.date_key(),
                fmt_value(r.temperature_max),
                fmt_value(r.temperature_min),
                fmt_value(r.precipitation_sum),
                fmt_value(r.snowfall_sum),
            ));
        }
        out
    }
}

impl IntoIterator for WeatherTable {
    type Item = DailyWeatherRecord;
    type IntoIter = std::vec::IntoIter<DailyWeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.6}")).unwrap_or_else(|| "NaN".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, tmax: f64) -> DailyWeatherRecord {
        DailyWeatherRecord {
            date,
            temperature_max: Some(tmax),
            temperature_min: None,
            precipitation_sum: Some(0.0),
            snowfall_sum: Some(0.0),
        }
    }

    #[test]
    fn parse_valid_range() {
        let r = DateRange::parse("2023-01-01", "2023-01-31").unwrap();
        assert_eq!(r.start(), day(2023, 1, 1));
        assert_eq!(r.end(), day(2023, 1, 31));
        assert_eq!(r.span_days(), 31);
    }

    #[test]
    fn feb_30_is_clamped_to_month_end() {
        let r = DateRange::parse("2023-02-01", "2023-02-30").unwrap();
        assert_eq!(r.end(), day(2023, 2, 28));
        assert_eq!(r.span_days(), 28);

        let leap = DateRange::parse("2024-02-01", "2024-02-31").unwrap();
        assert_eq!(leap.end(), day(2024, 2, 29));
    }

    #[test]
    fn garbage_dates_are_rejected() {
        assert!(DateRange::parse("2023-13-01", "2023-13-02").is_err());
        assert!(DateRange::parse("2023-01-00", "2023-01-02").is_err());
        assert!(DateRange::parse("yesterday", "2023-01-02").is_err());
        assert!(DateRange::parse("2023-01-01", "2023-01").is_err());
    }

    #[test]
    fn single_day_range_spans_one_day() {
        let r = DateRange::new(day(2023, 5, 1), day(2023, 5, 1)).unwrap();
        assert_eq!(r.span_days(), 1);
        assert!(DateRange::new(day(2023, 5, 2), day(2023, 5, 1)).is_err());
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = DateRange::parse("2023-03-31", "2023-03-01").unwrap_err();
        assert!(err.to_string().contains("after end"));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut table = WeatherTable::new(vec![
            record(day(2023, 1, 1), 40.0),
            record(day(2023, 1, 2), 41.0),
            record(day(2023, 1, 1), 99.0),
        ]);
        assert!(table.has_duplicate_dates());

        let removed = table.dedup_by_date();

        assert_eq!(removed, 1);
        assert!(!table.has_duplicate_dates());
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].temperature_max, Some(40.0));
        assert_eq!(table.rows()[1].date, day(2023, 1, 2));
    }

    #[test]
    fn concat_preserves_range_order() {
        let oct = WeatherTable::new(vec![record(day(2023, 10, 1), 60.0)]);
        let jan = WeatherTable::new(vec![record(day(2023, 1, 1), 30.0), record(day(2023, 1, 2), 31.0)]);

        let all = WeatherTable::concat([oct, jan]);
        let dates: Vec<_> = all.rows().iter().map(|r| r.date).collect();

        assert_eq!(dates, vec![day(2023, 10, 1), day(2023, 1, 1), day(2023, 1, 2)]);
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        assert!(WeatherTable::concat(Vec::new()).is_empty());
    }

    #[test]
    fn preview_limits_rows() {
        let table = WeatherTable::new(vec![
            record(day(2023, 1, 1), 40.25),
            record(day(2023, 1, 2), 41.0),
        ]);
        let text = table.preview(1);

        assert!(text.contains("2023-01-01"));
        assert!(text.contains("40.250000"));
        assert!(text.contains("NaN"));
        assert!(!text.contains("2023-01-02"));
    }

    #[test]
    fn units_serialize_lowercase() {
        assert_eq!(TemperatureUnit::Fahrenheit.as_str(), "fahrenheit");
        assert_eq!(PrecipitationUnit::Inch.as_str(), "inch");
        let units: Units = toml::from_str("temperature = \"celsius\"\nprecipitation = \"mm\"").unwrap();
        assert_eq!(units.temperature, TemperatureUnit::Celsius);
        assert_eq!(units.precipitation, PrecipitationUnit::Mm);
    }
}
