//! One adapter per provider: build the request, fetch, parse.

pub mod elkhorn_gis;
pub mod lobo;
pub mod mlml;
pub mod nerr;
pub mod noaa_tides;
pub mod ocean_color;

use chrono::{DateTime, NaiveDate, Utc};
use obs_parser::Provider;
use reqwest::Url;
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::fetch::Fetcher;

pub(crate) fn fetch_text(fetcher: &dyn Fetcher, provider: Provider, url: &str) -> Result<String> {
    debug!(%provider, url, "requesting payload");
    let bytes = fetcher
        .get(url)
        .map_err(|err| SourceError::SourceUnavailable {
            provider,
            url: url.to_string(),
            reason: err.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Longest excerpt of a server message kept in `SourceUnavailable`.
const REASON_LIMIT: usize = 300;

/// Passes `payload` through when `is_data` recognizes it; anything else is
/// the service's own error text.
pub(crate) fn require_data(
    provider: Provider,
    url: &str,
    payload: String,
    is_data: fn(&str) -> bool,
) -> Result<String> {
    if is_data(&payload) {
        return Ok(payload);
    }
    let message = payload.trim();
    let reason = match message.char_indices().nth(REASON_LIMIT) {
        Some((end, _)) => format!("{}...", &message[..end]),
        None => message.to_string(),
    };
    Err(SourceError::SourceUnavailable {
        provider,
        url: url.to_string(),
        reason,
    })
}

pub(crate) fn build_url(provider: Provider, base: &str, params: &[(&str, String)]) -> Result<String> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|err| SourceError::Config(format!("{provider} base URL '{base}': {err}")))
}

pub(crate) fn check_date_range(provider: Provider, begin: NaiveDate, end: NaiveDate) -> Result<()> {
    if begin > end {
        return Err(SourceError::invalid(
            provider,
            "begin",
            format!("{begin} is after {end}"),
        ));
    }
    Ok(())
}

pub(crate) fn check_station(provider: Provider, station: &str) -> Result<()> {
    if station.trim().is_empty() {
        return Err(SourceError::invalid(provider, "station", "must not be empty"));
    }
    Ok(())
}

/// `[begin 00:00, end + 1 day 00:00)` in UTC.
pub(crate) fn day_bounds(begin: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = begin.and_time(chrono::NaiveTime::MIN).and_utc();
    let stop = end
        .succ_opt()
        .unwrap_or(end)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    (start, stop)
}

pub(crate) fn log_table(provider: Provider, table: &obs_parser::Table) {
    info!(
        %provider,
        rows = table.height(),
        skipped = table.skipped_count(),
        "table ready"
    );
}
