use crate::errors::ParserError;
use crate::model::{ColumnKind, ColumnSpec, MissingValues, ParseOptions, Provider, Table};
use crate::registry::FormatParser;
use crate::time::{SourceZone, TimeEncoding};

use super::common::{
    collect_delimited, dedupe_names, delimited_reader, read_header, reject_time_column,
    snake_case_name, DelimitedPlan,
};

/// Satlantic LOBO text output: tab separated, `date [TZ]` then `variable [unit]` columns.
///
/// The zone label inside the date header is informational only; `zone` decides the
/// offset. Elkhorn Slough moorings report in Pacific standard time year-round.
#[derive(Debug, Clone, PartialEq)]
pub struct LoboConfig {
    pub zone: SourceZone,
    pub missing: MissingValues,
}

impl Default for LoboConfig {
    fn default() -> Self {
        Self {
            zone: SourceZone::hours(-8),
            missing: MissingValues::new(&["NaN", "NA", "-"], &[]),
        }
    }
}

/// Whether a payload starts with the `date [TZ]` header rather than a service message.
pub fn is_lobo_data(content: &str) -> bool {
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .and_then(|line| line.split('\t').next())
        .is_some_and(|first| snake_case_name(first) == "date")
}

#[derive(Debug, Clone, Default)]
pub struct LoboParser {
    config: LoboConfig,
}

impl LoboParser {
    const PROVIDER: Provider = Provider::Lobo;
    const TIME_FORMATS: &'static [&'static str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

    pub fn new(config: LoboConfig) -> Self {
        Self { config }
    }

    fn plan(header: &csv::StringRecord) -> Result<DelimitedPlan, ParserError> {
        let first = header.get(0).unwrap_or_default();
        if snake_case_name(first) != "date" {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: format!("expected first column 'date [TZ]', found '{first}'"),
            });
        }
        if header.len() < 2 {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: "no variable columns after the date column".to_string(),
            });
        }

        let names: Vec<String> = header.iter().skip(1).map(snake_case_name).collect();
        if let Some(pos) = names.iter().position(String::is_empty) {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: format!("header column {} has no variable name", pos + 1),
            });
        }

        reject_time_column(Self::PROVIDER, names.iter().map(String::as_str))?;

        let columns = dedupe_names(names)
            .into_iter()
            .enumerate()
            .map(|(offset, name)| (offset + 1, ColumnSpec::new(name, ColumnKind::Float)))
            .collect();

        Ok(DelimitedPlan {
            field_count: header.len(),
            time_fields: vec![0],
            columns,
        })
    }
}

impl FormatParser for LoboParser {
    fn provider(&self) -> Provider {
        Self::PROVIDER
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError> {
        let mut reader = delimited_reader(content, b'\t', Some(b'#'));
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
