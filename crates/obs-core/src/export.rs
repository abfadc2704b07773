use std::fs::File;
use std::path::Path;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;
use tracing::info;

use crate::error::{Result, SourceError};
use obs_parser::Table;

/// Timestamps are written as ISO 8601 UTC with a `Z` suffix.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|source| SourceError::io(path, source))?;
    let mut clone = table.df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_datetime_format(Some("%Y-%m-%dT%H:%M:%SZ".to_string()))
        .finish(&mut clone)?;
    info!(path = %path.display(), rows = table.height(), "wrote csv");
    Ok(())
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|source| SourceError::io(path, source))?;
    let mut clone = table.df.clone();
    ParquetWriter::new(&mut file)
        .with_compression(ParquetCompression::Zstd(None))
        .with_statistics(StatisticsOptions::default())
        .finish(&mut clone)?;
    info!(path = %path.display(), rows = table.height(), "wrote parquet");
    Ok(())
}
