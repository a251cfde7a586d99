use chrono::{DateTime, Days, NaiveDate};

use crate::{
    error::FetchError,
    model::{DailyRequest, DailySeries, DailyWeatherRecord, DateRange, Location, Units, WeatherTable},
    provider::ArchiveProvider,
};

/// Pulls every configured range for one location and stitches the results together.
#[derive(Debug)]
pub struct Fetcher<'a> {
    provider: &'a dyn ArchiveProvider,
    location: Location,
    units: Units,
}

impl<'a> Fetcher<'a> {
    pub fn new(provider: &'a dyn ArchiveProvider, location: Location, units: Units) -> Self {
        Self { provider, location, units }
    }

    /// Fetch `ranges` one after another and concatenate them in the given order.
    ///
    /// The first failing range aborts the whole fetch. Rows are not re-sorted, and
    /// overlapping ranges produce duplicate dates that the store later drops.
    pub async fn fetch(&self, ranges: &[DateRange]) -> Result<WeatherTable, FetchError> {
        let mut tables = Vec::with_capacity(ranges.len());

        for range in ranges {
            let request =
                DailyRequest { location: self.location.clone(), range: *range, units: self.units };
            let series = self.provider.daily(&request).await?;
            let table = align(&series);
            tracing::info!("Fetched {} days for {}", table.len(), range);
            tables.push(table);
        }

        Ok(WeatherTable::concat(tables))
    }
}

/// Calendar days from the series start to its end, both included, one per day.
///
/// Days are taken in the requested timezone (timestamps shifted by
/// `utc_offset_seconds`), not from the raw UTC instant. A period with no
/// length yields no days.
pub fn date_sequence(series: &DailySeries) -> Vec<NaiveDate> {
    if series.time_end <= series.time {
        return Vec::new();
    }

    let offset = i64::from(series.utc_offset_seconds);
    let to_date =
        |ts: i64| DateTime::from_timestamp(ts + offset, 0).map(|dt| dt.date_naive());

    let (Some(start), Some(end)) = (to_date(series.time), to_date(series.time_end)) else {
        return Vec::new();
    };

    let mut dates = Vec::new();
    let mut day = start;
    while day <= end {
        dates.push(day);
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    dates
}

/// Turn one range's series into rows, truncating everything to the shortest series.
///
/// Length disagreements are not errors: trailing values past the shortest
/// series are dropped.
pub fn align(series: &DailySeries) -> WeatherTable {
    let dates = date_sequence(series);
    let column = |i: usize| series.variables.get(i).map(Vec::as_slice).unwrap_or_default();
    let (tmax, tmin, precip, snow) = (column(0), column(1), column(2), column(3));

    let min_length =
        [dates.len(), tmax.len(), tmin.len(), precip.len(), snow.len()].into_iter().min().unwrap_or(0);

    let rows = (0..min_length)
        .map(|i| DailyWeatherRecord {
            date: dates[i],
            temperature_max: tmax[i],
            temperature_min: tmin[i],
            precipitation_sum: precip[i],
            snowfall_sum: snow[i],
        })
        .collect();

    WeatherTable::new(rows)
}
