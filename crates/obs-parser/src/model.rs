use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use polars::prelude::*;

use crate::errors::ParserError;

/// The closed set of data providers this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Mlml,
    Lobo,
    Nerr,
    ElkhornGis,
    NoaaTides,
    OceanColor,
}

impl Provider {
    pub fn all() -> &'static [Provider] {
        use Provider::*;
        &[Mlml, Lobo, Nerr, ElkhornGis, NoaaTides, OceanColor]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Mlml => "MLML",
            Provider::Lobo => "LOBO",
            Provider::Nerr => "NERR",
            Provider::ElkhornGis => "ELKHORN_GIS",
            Provider::NoaaTides => "NOAA_TIDES",
            Provider::OceanColor => "NASA_OCEAN_COLOR",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "mlml" => Ok(Provider::Mlml),
            "lobo" => Ok(Provider::Lobo),
            "nerr" => Ok(Provider::Nerr),
            "elkhorn_gis" | "elkhorn" => Ok(Provider::ElkhornGis),
            "noaa_tides" | "noaa_tide" | "noaa" => Ok(Provider::NoaaTides),
            "nasa_ocean_color" | "ocean_color" | "nasa" => Ok(Provider::OceanColor),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// A single cell of a normalized row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Missing data; sentinels and empty cells land here.
    Absent,
}

impl Value {
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            Value::Float(_) => Some(ColumnKind::Float),
            Value::Int(_) => Some(ColumnKind::Int),
            Value::Text(_) => Some(ColumnKind::Text),
            Value::Timestamp(_) => Some(ColumnKind::Timestamp),
            Value::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Float,
    Int,
    Text,
    Timestamp,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Float => "float",
            ColumnKind::Int => "int",
            ColumnKind::Text => "text",
            ColumnKind::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered `(column, value)` pairs produced by a format parser.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRow {
    cells: Vec<(String, Value)>,
}

impl NormalizedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.cells.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn cells(&self) -> &[(String, Value)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn into_cells(self) -> Vec<(String, Value)> {
        self.cells
    }
}

/// Tokens and numeric fill values a provider uses to mean "no data".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MissingValues {
    pub tokens: Vec<String>,
    pub numbers: Vec<f64>,
}

impl MissingValues {
    pub fn new(tokens: &[&str], numbers: &[f64]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            numbers: numbers.to_vec(),
        }
    }

    /// Empty cells are always missing.
    pub fn is_missing_token(&self, trimmed: &str) -> bool {
        trimmed.is_empty() || self.tokens.iter().any(|t| t.eq_ignore_ascii_case(trimmed))
    }

    pub fn is_fill_number(&self, value: f64) -> bool {
        self.numbers
            .iter()
            .any(|fill| (value - fill).abs() <= f64::EPSILON * fill.abs().max(1.0))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Escalate the first row-level failure to a parse failure.
    pub strict: bool,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based line (or record) index in the raw payload.
    pub line_index: usize,
    pub reason: String,
}

/// Normalized output of one parse: a typed frame plus the rows that were dropped.
///
/// The `time` column, always first, holds UTC instants as
/// `Datetime(Microseconds)`.
#[derive(Debug, Clone)]
pub struct Table {
    pub provider: Provider,
    pub df: DataFrame,
    pub skipped: Vec<SkippedRow>,
}

impl Table {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Appends `other` below this table. Both must share the same column schema.
    pub fn append(&mut self, other: Table) -> Result<(), ParserError> {
        if self.df.width() == 0 {
            self.df = other.df;
        } else if other.df.width() > 0 {
            if self.df.schema() != other.df.schema() {
                return Err(ParserError::SchemaMismatch {
                    provider: self.provider,
                    row_index: self.df.height(),
                    message: format!(
                        "cannot append table with columns {:?} to table with columns {:?}",
                        other.column_names(),
                        self.column_names()
                    ),
                });
            }
            self.df
                .vstack_mut(&other.df)
                .map_err(|source| ParserError::Table {
                    provider: self.provider,
                    source,
                })?;
        }
        self.skipped.extend(other.skipped);
        Ok(())
    }

    /// Keeps rows whose `time` lies in `[begin, end)`.
    pub fn retain_time_range(
        &mut self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), ParserError> {
        if self.df.width() == 0 {
            return Ok(());
        }
        let lo = begin.timestamp_micros();
        let hi = end.timestamp_micros();
        let provider = self.provider;
        let to_table_err = move |source| ParserError::Table { provider, source };
        let micros = self
            .df
            .column("time")
            .and_then(|col| col.cast(&DataType::Int64))
            .map_err(to_table_err)?;
        let mask: BooleanChunked = micros
            .i64()
            .map_err(to_table_err)?
            .into_iter()
            .map(|value| Some(value.is_some_and(|v| v >= lo && v < hi)))
            .collect();
        self.df = self.df.filter(&mask).map_err(to_table_err)?;
        Ok(())
    }
}
