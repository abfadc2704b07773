use std::path::PathBuf;

use obs_parser::{ParserError, Provider};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{provider} source unavailable at {url}: {reason}")]
    SourceUnavailable {
        provider: Provider,
        url: String,
        reason: String,
    },

    #[error("invalid {provider} query parameter '{parameter}': {reason}")]
    InvalidQuery {
        provider: Provider,
        parameter: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("File I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SourceError {
    pub(crate) fn invalid(
        provider: Provider,
        parameter: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        SourceError::InvalidQuery {
            provider,
            parameter,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SourceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
