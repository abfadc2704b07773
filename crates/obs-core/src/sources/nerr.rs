use chrono::NaiveDate;
use obs_parser::{is_nerr_data, FormatParser, NerrConfig, NerrParser, ParseOptions, Provider, Table};

use super::{
    build_url, check_date_range, check_station, fetch_text, log_table, require_data,
};
use crate::config::Endpoints;
use crate::error::Result;
use crate::fetch::Fetcher;

const PROVIDER: Provider = Provider::Nerr;

#[derive(Debug, Clone, PartialEq)]
pub struct NerrQuery {
    /// SWMP station code, e.g. `elkapwq`.
    pub station: String,
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

pub fn request_url(endpoints: &Endpoints, query: &NerrQuery) -> Result<String> {
    check_station(PROVIDER, &query.station)?;
    check_date_range(PROVIDER, query.begin, query.end)?;
    build_url(
        PROVIDER,
        &endpoints.nerr,
        &[
            ("station_code", query.station.trim().to_ascii_lowercase()),
            ("begin_date", query.begin.format("%Y-%m-%d").to_string()),
            ("end_date", query.end.format("%Y-%m-%d").to_string()),
            ("format", "csv".to_string()),
        ],
    )
}

pub fn fetch(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &NerrQuery,
    options: &ParseOptions,
) -> Result<Table> {
    let url = request_url(endpoints, query)?;
    let payload = fetch_text(fetcher, PROVIDER, &url)?;
    let payload = require_data(PROVIDER, &url, payload, is_nerr_data)?;
    let table = NerrParser::new(NerrConfig::default()).parse(&payload, options)?;
    log_table(PROVIDER, &table);
    Ok(table)
}
