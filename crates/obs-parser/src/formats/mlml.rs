use crate::errors::ParserError;
use crate::model::{ColumnKind, ColumnSpec, MissingValues, ParseOptions, Provider, Table};
use crate::registry::FormatParser;
use crate::time::{SourceZone, TimeEncoding};

use super::common::{
    collect_delimited, dedupe_names, delimited_reader, read_header, reject_time_column,
    snake_case_name, DelimitedPlan,
};

/// Moss Landing shore station exports: `#` comments, then a `year,yday,...` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MlmlConfig {
    pub zone: SourceZone,
    pub missing: MissingValues,
}

impl Default for MlmlConfig {
    fn default() -> Self {
        Self {
            zone: SourceZone::Utc,
            missing: MissingValues::new(&["NaN", "NA"], &[-99999.0, -9999.0]),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MlmlParser {
    config: MlmlConfig,
}

impl MlmlParser {
    const PROVIDER: Provider = Provider::Mlml;

    pub fn new(config: MlmlConfig) -> Self {
        Self { config }
    }

    fn plan(header: &csv::StringRecord) -> Result<DelimitedPlan, ParserError> {
        let names: Vec<String> = header.iter().map(snake_case_name).collect();
        if names.len() < 3 {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: format!("expected at least 3 header fields, found {}", names.len()),
            });
        }
        if names[0] != "year" || !matches!(names[1].as_str(), "yday" | "yearday" | "doy") {
            return Err(ParserError::Schema {
                provider: Self::PROVIDER,
                reason: format!(
                    "header must start with 'year,yday' but starts with '{},{}'",
                    names[0], names[1]
                ),
            });
        }

        reject_time_column(Self::PROVIDER, names[2..].iter().map(String::as_str))?;

        let field_count = names.len();
        let columns = dedupe_names(names.into_iter().skip(2).collect())
            .into_iter()
            .enumerate()
            .map(|(offset, name)| (offset + 2, ColumnSpec::new(name, ColumnKind::Float)))
            .collect();

        Ok(DelimitedPlan {
            field_count,
            time_fields: vec![0, 1],
            columns,
        })
    }
}

impl FormatParser for MlmlParser {
    fn provider(&self) -> Provider {
        Self::PROVIDER
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError> {
        let mut reader = delimited_reader(content, b',', Some(b'#'));
        let mut records = reader.records();
        let header = read_header(Self::PROVIDER, &mut records)?;
        let plan = Self::plan(&header)?;
        let encoding = TimeEncoding::YearDay {
            zone: self.config.zone,
        };
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
