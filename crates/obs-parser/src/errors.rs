use polars::error::PolarsError;
use thiserror::Error;

use crate::model::Provider;
use crate::time::TimeParseError;

/// Why a single data row could not be normalized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowFailure {
    #[error("expected {expected} fields but found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("column '{column}' value '{value}' is not a number")]
    NotNumeric { column: String, value: String },

    #[error("column '{column}' value '{value}' is not an integer")]
    NotInteger { column: String, value: String },

    #[error("invalid timestamp: {0}")]
    Time(#[from] TimeParseError),

    #[error("{0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{provider} payload schema not recognized: {reason}")]
    Schema { provider: Provider, reason: String },

    #[error("{provider} line {line_index} invalid: {failure}")]
    Row {
        provider: Provider,
        line_index: usize,
        #[source]
        failure: RowFailure,
    },

    #[error("{provider} row {row_index} does not match the table schema: {message}")]
    SchemaMismatch {
        provider: Provider,
        row_index: usize,
        message: String,
    },

    #[error("{provider} CSV error: {source}")]
    Csv {
        provider: Provider,
        #[source]
        source: csv::Error,
    },

    #[error("{provider} failed to build table: {source}")]
    Table {
        provider: Provider,
        #[source]
        source: PolarsError,
    },
}

impl ParserError {
    pub fn provider(&self) -> Provider {
        match self {
            ParserError::Schema { provider, .. }
            | ParserError::Row { provider, .. }
            | ParserError::SchemaMismatch { provider, .. }
            | ParserError::Csv { provider, .. }
            | ParserError::Table { provider, .. } => *provider,
        }
    }
}
