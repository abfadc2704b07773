use std::fmt;

use chrono::{Datelike, NaiveDate};
use obs_parser::{FormatParser, MlmlConfig, MlmlParser, ParseOptions, Provider, Table};

use super::{check_date_range, day_bounds, fetch_text, log_table};
use crate::config::Endpoints;
use crate::error::{Result, SourceError};
use crate::fetch::Fetcher;

const PROVIDER: Provider = Provider::Mlml;

/// Public MLML shore station record sets, published as one file per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlmlDataset {
    Seawater,
    Weather,
}

impl MlmlDataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            MlmlDataset::Seawater => "seawater",
            MlmlDataset::Weather => "weather",
        }
    }
}

impl fmt::Display for MlmlDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MlmlQuery {
    pub dataset: MlmlDataset,
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

/// `{base}{dataset}/{year}/MLML_{DATASET}_{year}.csv`
pub fn year_url(endpoints: &Endpoints, dataset: MlmlDataset, year: i32) -> String {
    let base = endpoints.mlml.trim_end_matches('/');
    format!(
        "{base}/{dataset}/{year}/MLML_{upper}_{year}.csv",
        upper = dataset.as_str().to_ascii_uppercase()
    )
}

/// Fetches every yearly file the range touches and keeps rows inside it.
///
/// `skipped` is not trimmed: it lists the rejected lines of every fetched
/// yearly file, because a rejected line has no usable timestamp to test
/// against the range.
pub fn fetch(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &MlmlQuery,
    options: &ParseOptions,
) -> Result<Table> {
    check_date_range(PROVIDER, query.begin, query.end)?;
    let parser = MlmlParser::new(MlmlConfig::default());

    let mut table: Option<Table> = None;
    for year in query.begin.year()..=query.end.year() {
        let url = year_url(endpoints, query.dataset, year);
        let payload = fetch_text(fetcher, PROVIDER, &url)?;
        let yearly = parser.parse(&payload, options)?;
        match table.as_mut() {
            Some(table) => table.append(yearly)?,
            None => table = Some(yearly),
        }
    }

    let mut table = table.ok_or_else(|| {
        SourceError::invalid(PROVIDER, "begin", "date range covers no calendar year")
    })?;
    let (start, stop) = day_bounds(query.begin, query.end);
    table.retain_time_range(start, stop)?;
    log_table(PROVIDER, &table);
    Ok(table)
}
