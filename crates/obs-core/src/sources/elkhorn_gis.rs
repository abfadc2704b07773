use obs_parser::{ElkhornGisConfig, ElkhornGisParser, FormatParser, ParseOptions, Provider, Table};

use super::{fetch_text, log_table};
use crate::config::Endpoints;
use crate::error::{Result, SourceError};
use crate::fetch::Fetcher;

const PROVIDER: Provider = Provider::ElkhornGis;

#[derive(Debug, Clone, PartialEq)]
pub struct ElkhornGisQuery {
    /// Published layer name; fetched as `{layer}.kml`.
    pub layer: String,
}

pub fn request_url(endpoints: &Endpoints, query: &ElkhornGisQuery) -> Result<String> {
    let layer = query.layer.trim().trim_end_matches(".kml");
    if layer.is_empty() || layer.contains(['/', '?', '#']) {
        return Err(SourceError::invalid(
            PROVIDER,
            "layer",
            format!("'{}' is not a layer name", query.layer),
        ));
    }
    let base = endpoints.elkhorn_gis.trim_end_matches('/');
    Ok(format!("{base}/{layer}.kml"))
}

pub fn fetch(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &ElkhornGisQuery,
    options: &ParseOptions,
) -> Result<Table> {
    let url = request_url(endpoints, query)?;
    let payload = fetch_text(fetcher, PROVIDER, &url)?;
    let table = ElkhornGisParser::new(ElkhornGisConfig::default()).parse(&payload, options)?;
    log_table(PROVIDER, &table);
    Ok(table)
}
