use crate::errors::ParserError;
use crate::model::{ColumnKind, ColumnSpec, MissingValues, ParseOptions, Provider, Table};
use crate::registry::FormatParser;
use crate::time::{SourceZone, TimeEncoding};

use super::common::{
    collect_delimited, delimited_reader, read_header, reject_time_column, DelimitedPlan,
};

/// SWMP CSV exports from the NERRS Centralized Data Management Office.
///
/// `DateTimeStamp` is local standard time with no daylight saving shift.
#[derive(Debug, Clone, PartialEq)]
pub struct NerrConfig {
    pub zone: SourceZone,
    pub missing: MissingValues,
}

impl Default for NerrConfig {
    fn default() -> Self {
        Self {
            zone: SourceZone::hours(-8),
            missing: MissingValues::new(&["NaN", "NA"], &[]),
        }
    }
}

/// Whether the first line is a SWMP header naming the station and timestamp columns.
pub fn is_nerr_data(content: &str) -> bool {
    let Some(header) = content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
    else {
        return false;
    };
    let has = |wanted: &str| {
        header
            .split(',')
            .any(|field| field.trim().trim_matches('"').eq_ignore_ascii_case(wanted))
    };
    has("Station_Code") && has(NerrParser::TIME_COLUMN)
}

#[derive(Debug, Clone, Default)]
pub struct NerrParser {
    config: NerrConfig,
}

impl NerrParser {
    const PROVIDER: Provider = Provider::Nerr;
    const TIME_COLUMN: &'static str = "DateTimeStamp";
    const TIME_FORMATS: &'static [&'static str] = &[
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];

    pub fn new(config: NerrConfig) -> Self {
        Self { config }
    }

    fn column_kind(name: &str) -> ColumnKind {
        if name.starts_with("F_") || name.eq_ignore_ascii_case("station_code") {
            return ColumnKind::Text;
        }
        match name.to_ascii_lowercase().as_str() {
            "isswmp" => ColumnKind::Text,
            "historical" | "provisionalplus" => ColumnKind::Int,
            _ => ColumnKind::Float,
        }
    }

    fn plan(header: &csv::StringRecord) -> Result<DelimitedPlan, ParserError> {
        let position = |wanted: &str| header.iter().position(|h| h.eq_ignore_ascii_case(wanted));

        if position("Station_Code").is_none() {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: "header is missing the Station_Code column".to_string(),
            });
        }
        let time_idx = position(Self::TIME_COLUMN).ok_or_else(|| ParserError::Schema {
            provider: Self::PROVIDER,
            reason: format!("header is missing the {} column", Self::TIME_COLUMN),
        })?;

        let kept = header
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != time_idx)
            .map(|(_, name)| name);
        reject_time_column(Self::PROVIDER, kept)?;

        let mut columns = Vec::with_capacity(header.len());
        for (idx, name) in header.iter().enumerate() {
            if idx == time_idx {
                continue;
            }
            if name.is_empty() {
                return Err(ParserError::Schema {
                    provider: Self::PROVIDER,
                    reason: format!("header column {idx} is empty"),
                });
            }
            if columns.iter().any(|(_, spec): &(usize, ColumnSpec)| spec.name == name) {
                return Err(ParserError::Schema {
                    provider: Self::PROVIDER,
                    reason: format!("header column '{name}' appears more than once"),
                });
            }
            columns.push((idx, ColumnSpec::new(name, Self::column_kind(name))));
        }

        Ok(DelimitedPlan {
            field_count: header.len(),
            time_fields: vec![time_idx],
            columns,
        })
    }
}

impl FormatParser for NerrParser {
    fn provider(&self) -> Provider {
        Self::PROVIDER
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError> {
        let mut reader = delimited_reader(content, b',', None);
        let mut records = reader.records();
        let header = read_header(Self::PROVIDER, &mut records)?;
        let plan = Self::plan(&header)?;
        let encoding = TimeEncoding::pattern(Self::TIME_FORMATS, self.config.zone);
        collect_delimited(
            Self::PROVIDER,
            records,
            &plan,
            &encoding,
            &self.config.missing,
            options,
        )
    }
}
