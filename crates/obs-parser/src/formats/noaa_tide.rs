use crate::errors::ParserError;
use crate::model::{ColumnKind, ColumnSpec, MissingValues, ParseOptions, Provider, Table};
use crate::registry::FormatParser;
use crate::time::{SourceZone, TimeEncoding};

use super::common::{
    collect_delimited, dedupe_names, delimited_reader, read_header, reject_time_column,
    snake_case_name, DelimitedPlan,
};

/// First header field of every valid CO-OPS data getter CSV response.
pub const NOAA_HEADER_PREFIX: &str = "Date Time";

/// CO-OPS data getter CSV, requested with `time_zone=GMT`.
#[derive(Debug, Clone, PartialEq)]
pub struct NoaaTideConfig {
    pub time: TimeEncoding,
    pub missing: MissingValues,
}

impl Default for NoaaTideConfig {
    fn default() -> Self {
        Self {
            time: TimeEncoding::pattern(
                &["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"],
                SourceZone::Utc,
            ),
            missing: MissingValues::new(&["NaN"], &[]),
        }
    }
}

impl NoaaTideConfig {
    /// Gauge exports that carry POSIX seconds in the `Date Time` column.
    pub fn epoch_seconds() -> Self {
        Self {
            time: TimeEncoding::EpochSeconds,
            ..Self::default()
        }
    }
}

/// Whether a payload looks like data rather than a CO-OPS error message.
pub fn is_noaa_data(content: &str) -> bool {
    content
        .trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with(NOAA_HEADER_PREFIX)
}

#[derive(Debug, Clone, Default)]
pub struct NoaaTideParser {
    config: NoaaTideConfig,
}

impl NoaaTideParser {
    const PROVIDER: Provider = Provider::NoaaTides;

    pub fn new(config: NoaaTideConfig) -> Self {
        Self { config }
    }

    // Single-letter headers are quality flags (I, L, X, N, R, F, O); the second
    // wind "Direction" is the compass point text.
    fn classify(names: Vec<String>) -> Vec<ColumnSpec> {
        let mut seen_direction = false;
        names
            .into_iter()
            .map(|name| match name.as_str() {
                "direction" if seen_direction => {
                    ColumnSpec::new("direction_cardinal", ColumnKind::Text)
                }
                "direction" => {
                    seen_direction = true;
                    ColumnSpec::new(name, ColumnKind::Float)
                }
                "quality" => ColumnSpec::new(name, ColumnKind::Text),
                flag if flag.len() == 1 => ColumnSpec::new(format!("flag_{flag}"), ColumnKind::Int),
                _ => ColumnSpec::new(name, ColumnKind::Float),
            })
            .collect()
    }

    fn plan(header: &csv::StringRecord) -> Result<DelimitedPlan, ParserError> {
        let first = header.get(0).unwrap_or_default().trim_start_matches('\u{feff}');
        if first != NOAA_HEADER_PREFIX {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: format!("expected first column '{NOAA_HEADER_PREFIX}', found '{first}'"),
            });
        }

        let names: Vec<String> = header.iter().skip(1).map(snake_case_name).collect();
        if names.iter().any(String::is_empty) {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: "header contains an unnamed column".to_string(),
            });
        }

        let specs = Self::classify(names);
        reject_time_column(Self::PROVIDER, specs.iter().map(|spec| spec.name.as_str()))?;
        let names = dedupe_names(specs.iter().map(|spec| spec.name.clone()).collect());
        let columns = specs
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(offset, (spec, name))| (offset + 1, ColumnSpec::new(name, spec.kind)))
            .collect();

        Ok(DelimitedPlan {
            field_count: header.len(),
            time_fields: vec![0],
            columns,
        })
    }
}

impl FormatParser for NoaaTideParser {
    fn provider(&self) -> Provider {
        Self::PROVIDER
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError> {
        let mut reader = delimited_reader(content, b',', None);
        let mut records = reader.records();
        let header = read_header(Self::PROVIDER, &mut records)?;
        let plan = Self::plan(&header)?;
        collect_delimited(
            Self::PROVIDER,
            records,
            &plan,
            &self.config.time,
            &self.config.missing,
            options,
        )
    }
}
