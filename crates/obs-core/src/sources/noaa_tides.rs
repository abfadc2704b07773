use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use obs_parser::{
    is_noaa_data, FormatParser, NoaaTideConfig, NoaaTideParser, ParseOptions, Provider, Table,
};
use tracing::{info, warn};

use super::{build_url, check_date_range, check_station, fetch_text, log_table, require_data};
use crate::config::Endpoints;
use crate::error::{Result, SourceError};
use crate::fetch::Fetcher;

const PROVIDER: Provider = Provider::NoaaTides;
const APPLICATION: &str = "NOS.COOPS.TAC.WL";
/// Longest range the data getter serves hourly data for in one request.
pub const MAX_RANGE_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TideProduct {
    WaterLevel,
    AirPressure,
    AirTemperature,
    WaterTemperature,
    Wind,
}

impl TideProduct {
    pub fn as_str(&self) -> &'static str {
        match self {
            TideProduct::WaterLevel => "water_level",
            TideProduct::AirPressure => "air_pressure",
            TideProduct::AirTemperature => "air_temperature",
            TideProduct::WaterTemperature => "water_temperature",
            TideProduct::Wind => "wind",
        }
    }

    /// Verified water levels are requested through the hourly heights product.
    fn request_name(&self) -> &'static str {
        match self {
            TideProduct::WaterLevel => "hourly_height",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for TideProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TideProduct {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "water_level" | "hourly_height" => Ok(TideProduct::WaterLevel),
            "air_pressure" => Ok(TideProduct::AirPressure),
            "air_temperature" => Ok(TideProduct::AirTemperature),
            "water_temperature" => Ok(TideProduct::WaterTemperature),
            "wind" => Ok(TideProduct::Wind),
            other => Err(format!("unknown tide product '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TideQuery {
    /// CO-OPS station id, e.g. `9413450` for Monterey.
    pub station: String,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub product: TideProduct,
    /// Only sent for water levels.
    pub datum: String,
}

impl TideQuery {
    pub fn new(station: impl Into<String>, begin: NaiveDate, end: NaiveDate) -> Self {
        Self {
            station: station.into(),
            begin,
            end,
            product: TideProduct::WaterLevel,
            datum: "STND".to_string(),
        }
    }

    pub fn with_product(mut self, product: TideProduct) -> Self {
        self.product = product;
        self
    }

    /// January 1 through December 31 of `year`.
    pub fn for_year(station: impl Into<String>, year: i32, product: TideProduct) -> Option<Self> {
        let begin = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self::new(station, begin, end).with_product(product))
    }
}

pub fn request_url(endpoints: &Endpoints, query: &TideQuery) -> Result<String> {
    check_station(PROVIDER, &query.station)?;
    check_date_range(PROVIDER, query.begin, query.end)?;
    let span = (query.end - query.begin).num_days();
    if span > MAX_RANGE_DAYS {
        return Err(SourceError::invalid(
            PROVIDER,
            "end",
            format!("range of {span} days exceeds the {MAX_RANGE_DAYS} day limit"),
        ));
    }

    let mut params = vec![
        ("product", query.product.request_name().to_string()),
        ("application", APPLICATION.to_string()),
        ("begin_date", query.begin.format("%Y%m%d").to_string()),
        ("end_date", query.end.format("%Y%m%d").to_string()),
    ];
    if query.product == TideProduct::WaterLevel {
        if query.datum.trim().is_empty() {
            return Err(SourceError::invalid(PROVIDER, "datum", "must not be empty"));
        }
        params.push(("datum", query.datum.trim().to_string()));
    }
    params.push(("station", query.station.trim().to_string()));
    params.push(("time_zone", "GMT".to_string()));
    params.push(("units", "metric".to_string()));
    if query.product != TideProduct::WaterLevel {
        params.push(("interval", "h".to_string()));
    }
    params.push(("format", "csv".to_string()));
    build_url(PROVIDER, &endpoints.noaa_tides, &params)
}

/// Fetches the raw CSV; anything not starting with the data header is the
/// server's error text.
fn fetch_csv(fetcher: &dyn Fetcher, endpoints: &Endpoints, query: &TideQuery) -> Result<String> {
    let url = request_url(endpoints, query)?;
    let payload = fetch_text(fetcher, PROVIDER, &url)?;
    require_data(PROVIDER, &url, payload, is_noaa_data)
}

pub fn fetch(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &TideQuery,
    options: &ParseOptions,
) -> Result<Table> {
    let payload = fetch_csv(fetcher, endpoints, query)?;
    let table = NoaaTideParser::new(NoaaTideConfig::default()).parse(&payload, options)?;
    log_table(PROVIDER, &table);
    Ok(table)
}

/// Saves the raw CSV to `out_file`. Nothing is written for an invalid payload.
pub fn download_csv(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &TideQuery,
    out_file: &Path,
) -> Result<()> {
    let payload = fetch_csv(fetcher, endpoints, query)?;
    fs::write(out_file, payload).map_err(|source| SourceError::io(out_file, source))?;
    info!(path = %out_file.display(), station = %query.station, "saved tide csv");
    Ok(())
}

/// Saves one `{station}_{product}_{year}.csv` per year into `out_dir`,
/// creating it if needed. Years the server has no data for are logged and
/// skipped; the written paths are returned.
pub fn download_multiyear_csv(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    out_dir: &Path,
    years: &[i32],
    station: &str,
    product: TideProduct,
    datum: &str,
) -> Result<Vec<PathBuf>> {
    check_station(PROVIDER, station)?;
    fs::create_dir_all(out_dir).map_err(|source| SourceError::io(out_dir, source))?;

    let mut written = Vec::with_capacity(years.len());
    for &year in years {
        let mut query = TideQuery::for_year(station, year, product).ok_or_else(|| {
            SourceError::invalid(PROVIDER, "years", format!("{year} is not a valid year"))
        })?;
        query.datum = datum.to_string();

        let out_file = out_dir.join(format!("{}_{}_{year}.csv", station.trim(), product));
        match download_csv(fetcher, endpoints, &query, &out_file) {
            Ok(()) => written.push(out_file),
            Err(SourceError::SourceUnavailable { url, reason, .. }) => {
                warn!(year, url = %url, reason = %reason, "no tide data for year");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(written)
}
