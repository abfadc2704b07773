use chrono::NaiveDate;
use obs_parser::{is_lobo_data, FormatParser, LoboConfig, LoboParser, ParseOptions, Provider, Table};

use super::{
    build_url, check_date_range, check_station, fetch_text, log_table, require_data,
};
use crate::config::Endpoints;
use crate::error::{Result, SourceError};
use crate::fetch::Fetcher;

const PROVIDER: Provider = Provider::Lobo;

#[derive(Debug, Clone, PartialEq)]
pub struct LoboQuery {
    /// Mooring id, e.g. `L01`.
    pub node: String,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    /// Variable names; empty asks for the node's default set.
    pub variables: Vec<String>,
}

pub fn request_url(endpoints: &Endpoints, query: &LoboQuery) -> Result<String> {
    check_station(PROVIDER, &query.node)?;
    check_date_range(PROVIDER, query.begin, query.end)?;
    if query.variables.iter().any(|v| v.trim().is_empty()) {
        return Err(SourceError::invalid(
            PROVIDER,
            "variables",
            "variable names must not be empty",
        ));
    }

    let mut params = vec![
        ("node", query.node.trim().to_string()),
        ("min_date", query.begin.format("%Y%m%d").to_string()),
        ("max_date", query.end.format("%Y%m%d").to_string()),
    ];
    if !query.variables.is_empty() {
        params.push(("y", query.variables.join(",")));
    }
    params.push(("data_format", "text".to_string()));
    build_url(PROVIDER, &endpoints.lobo, &params)
}

pub fn fetch(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &LoboQuery,
    options: &ParseOptions,
) -> Result<Table> {
    let url = request_url(endpoints, query)?;
    let payload = fetch_text(fetcher, PROVIDER, &url)?;
    let payload = require_data(PROVIDER, &url, payload, is_lobo_data)?;
    let table = LoboParser::new(LoboConfig::default()).parse(&payload, options)?;
    log_table(PROVIDER, &table);
    Ok(table)
}
