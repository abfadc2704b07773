use csv::StringRecord;
use tracing::{debug, warn};

use crate::errors::{ParserError, RowFailure};
use crate::model::{
    ColumnKind, ColumnSpec, MissingValues, NormalizedRow, ParseOptions, Provider, SkippedRow,
    Table, Value,
};
use crate::table::TableBuilder;
use crate::time::TimeEncoding;

pub(crate) const TIME_COLUMN: &str = "time";

pub(crate) fn delimited_reader(
    content: &str,
    delimiter: u8,
    comment: Option<u8>,
) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .comment(comment)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

pub(crate) fn record_line(record: &StringRecord) -> usize {
    record
        .position()
        .map(|pos| pos.line() as usize)
        .unwrap_or_default()
}

pub(crate) fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

/// Reads the first non-blank record, which every delimited provider uses as its header.
pub(crate) fn read_header(
    provider: Provider,
    records: &mut csv::StringRecordsIter<'_, &[u8]>,
) -> Result<StringRecord, ParserError> {
    for record in records.by_ref() {
        let record = record.map_err(|source| ParserError::Csv { provider, source })?;
        if !is_blank(&record) {
            return Ok(record);
        }
    }
    Err(ParserError::Schema {
        provider,
        reason: "payload has no header row".to_string(),
    })
}

/// `"Water Level"` -> `water_level`, `"temperature [C]"` -> `temperature`.
pub(crate) fn snake_case_name(raw: &str) -> String {
    let without_unit = match raw.find(['[', '(']) {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let mut name = String::with_capacity(without_unit.len());
    for ch in without_unit.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    name.trim_matches('_').to_string()
}

/// Appends `_2`, `_3`, ... to repeated names so every column stays addressable.
pub(crate) fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 2;
        while seen.contains(&candidate) {
            candidate = format!("{name}_{suffix}");
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}

pub(crate) fn float_cell(
    value: &str,
    column: &str,
    missing: &MissingValues,
) -> Result<Value, RowFailure> {
    let trimmed = value.trim();
    if missing.is_missing_token(trimmed) {
        return Ok(Value::Absent);
    }
    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_nan() || missing.is_fill_number(parsed) => Ok(Value::Absent),
        Ok(parsed) => Ok(Value::Float(parsed)),
        Err(_) => Err(RowFailure::NotNumeric {
            column: column.to_string(),
            value: trimmed.to_string(),
        }),
    }
}

pub(crate) fn int_cell(
    value: &str,
    column: &str,
    missing: &MissingValues,
) -> Result<Value, RowFailure> {
    let trimmed = value.trim();
    if missing.is_missing_token(trimmed) {
        return Ok(Value::Absent);
    }
    trimmed
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| RowFailure::NotInteger {
            column: column.to_string(),
            value: trimmed.to_string(),
        })
}

pub(crate) fn text_cell(value: &str, missing: &MissingValues) -> Value {
    let trimmed = value.trim();
    if missing.is_missing_token(trimmed) {
        Value::Absent
    } else {
        Value::Text(trimmed.to_string())
    }
}

pub(crate) fn cell(
    kind: ColumnKind,
    value: &str,
    column: &str,
    missing: &MissingValues,
) -> Result<Value, RowFailure> {
    match kind {
        ColumnKind::Float => float_cell(value, column, missing),
        ColumnKind::Int => int_cell(value, column, missing),
        ColumnKind::Text => Ok(text_cell(value, missing)),
        ColumnKind::Timestamp => Err(RowFailure::Malformed(format!(
            "column '{column}' cannot hold a raw timestamp"
        ))),
    }
}

/// Feeds rows into a [`TableBuilder`], applying the skip-and-warn policy.
pub(crate) struct RowCollector {
    provider: Provider,
    strict: bool,
    builder: TableBuilder,
    skipped: Vec<SkippedRow>,
}

impl RowCollector {
    pub fn new(provider: Provider, schema: Vec<ColumnSpec>, options: &ParseOptions) -> Self {
        Self {
            provider,
            strict: options.strict,
            builder: TableBuilder::new(provider, schema),
            skipped: Vec::new(),
        }
    }

    pub fn accept(
        &mut self,
        line_index: usize,
        row: Result<NormalizedRow, RowFailure>,
    ) -> Result<(), ParserError> {
        match row {
            Ok(row) => self.builder.push(row),
            Err(failure) if self.strict => Err(ParserError::Row {
                provider: self.provider,
                line_index,
                failure,
            }),
            Err(failure) => {
                warn!(
                    provider = %self.provider,
                    line_index,
                    reason = %failure,
                    "skipping malformed row"
                );
                self.skipped.push(SkippedRow {
                    line_index,
                    reason: failure.to_string(),
                });
                Ok(())
            }
        }
    }

    pub fn finish(self) -> Result<Table, ParserError> {
        let provider = self.provider;
        let rows = self.builder.len();
        let df = self.builder.finish()?;
        debug!(%provider, rows, skipped = self.skipped.len(), "parsed table");
        Ok(Table {
            provider,
            df,
            skipped: self.skipped,
        })
    }
}

/// Fails when a source column would shadow the synthetic `time` column.
pub(crate) fn reject_time_column<'a>(
    provider: Provider,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ParserError> {
    if names.into_iter().any(|name| name == TIME_COLUMN) {
        return Err(ParserError::Schema {
            provider,
            reason: format!("header column '{TIME_COLUMN}' clashes with the parsed timestamp"),
        });
    }
    Ok(())
}

/// Where each output column of a delimited payload comes from.
#[derive(Debug, Clone)]
pub(crate) struct DelimitedPlan {
    pub field_count: usize,
    /// Source indices of the timestamp parts, in encoding order.
    pub time_fields: Vec<usize>,
    /// `(source index, output column)` for every non-time column kept.
    pub columns: Vec<(usize, ColumnSpec)>,
}

impl DelimitedPlan {
    pub fn schema(&self) -> Vec<ColumnSpec> {
        let mut schema = Vec::with_capacity(self.columns.len() + 1);
        schema.push(ColumnSpec::new(TIME_COLUMN, ColumnKind::Timestamp));
        schema.extend(self.columns.iter().map(|(_, spec)| spec.clone()));
        schema
    }

    fn normalize(
        &self,
        record: &StringRecord,
        encoding: &TimeEncoding,
        missing: &MissingValues,
    ) -> Result<NormalizedRow, RowFailure> {
        if record.len() != self.field_count {
            return Err(RowFailure::FieldCount {
                expected: self.field_count,
                found: record.len(),
            });
        }

        let parts: Vec<&str> = self
            .time_fields
            .iter()
            .map(|idx| record.get(*idx).unwrap_or_default())
            .collect();
        let time = encoding.normalize(&parts)?;

        let mut row = NormalizedRow::with_capacity(self.columns.len() + 1);
        row.push(TIME_COLUMN, Value::Timestamp(time));
        for (idx, spec) in &self.columns {
            let raw = record.get(*idx).unwrap_or_default();
            row.push(spec.name.clone(), cell(spec.kind, raw, &spec.name, missing)?);
        }
        Ok(row)
    }
}

/// Drains the data records following the header into a [`Table`].
pub(crate) fn collect_delimited(
    provider: Provider,
    records: csv::StringRecordsIter<'_, &[u8]>,
    plan: &DelimitedPlan,
    encoding: &TimeEncoding,
    missing: &MissingValues,
    options: &ParseOptions,
) -> Result<Table, ParserError> {
    let mut collector = RowCollector::new(provider, plan.schema(), options);
    for record in records {
        let record = record.map_err(|source| ParserError::Csv { provider, source })?;
        if is_blank(&record) {
            continue;
        }
        let line_index = record_line(&record);
        collector.accept(line_index, plan.normalize(&record, encoding, missing))?;
    }
    collector.finish()
}
