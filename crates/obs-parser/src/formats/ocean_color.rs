use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{ParserError, RowFailure};
use crate::model::{
    ColumnKind, ColumnSpec, MissingValues, NormalizedRow, ParseOptions, Provider, Table, Value,
};
use crate::registry::FormatParser;
use crate::time::{SourceZone, TimeEncoding};

use super::common::{float_cell, RowCollector, TIME_COLUMN};

static BLOCK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][\w.]*)\s*((?:\[\d+\])+)\s*$").expect("valid regex")
});
static DIMENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("valid regex"));
static GRANULE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+(\d{4})(\d{3})\.").expect("valid regex"));

/// Year and day of year of one Level-3 granule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GranuleDay {
    pub year: i32,
    pub day: u32,
}

/// OPeNDAP ASCII responses for one variable of a Level-3 mapped granule.
#[derive(Debug, Clone, PartialEq)]
pub struct OceanColorConfig {
    pub variable: String,
    pub missing: MissingValues,
    /// Overrides the date encoded in the `Dataset:` line.
    pub granule: Option<GranuleDay>,
    /// Inclusive `(min, max)` windows; cells outside are dropped.
    pub lat_extent: Option<(f64, f64)>,
    pub lon_extent: Option<(f64, f64)>,
}

impl Default for OceanColorConfig {
    fn default() -> Self {
        Self {
            variable: "chl_ocx".to_string(),
            missing: MissingValues::new(&["NaN"], &[-32767.0]),
            granule: None,
            lat_extent: None,
            lon_extent: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OceanColorParser {
    config: OceanColorConfig,
}

struct Block<'a> {
    name: &'a str,
    dims: Vec<usize>,
    lines: Vec<(usize, &'a str)>,
}

impl<'a> Block<'a> {
    fn short_name(&self) -> &'a str {
        self.name.rsplit('.').next().unwrap_or(self.name)
    }
}

fn within(value: f64, extent: Option<(f64, f64)>) -> bool {
    extent.map_or(true, |(a, b)| value >= a.min(b) && value <= a.max(b))
}

impl OceanColorParser {
    const PROVIDER: Provider = Provider::OceanColor;

    pub fn new(config: OceanColorConfig) -> Self {
        Self { config }
    }

    fn schema_error(reason: impl Into<String>) -> ParserError {
        ParserError::Schema {
            provider: Self::PROVIDER,
            reason: reason.into(),
        }
    }

    fn split_blocks(content: &str) -> (Option<&str>, Vec<Block<'_>>) {
        let mut dataset = None;
        let mut blocks: Vec<Block<'_>> = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix("Dataset:") {
                dataset = Some(name.trim());
                continue;
            }
            if let Some(caps) = BLOCK_HEADER.captures(trimmed) {
                let (Some(name), Some(dims)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let dims = DIMENSION
                    .captures_iter(dims.as_str())
                    .filter_map(|d| d[1].parse().ok())
                    .collect();
                blocks.push(Block {
                    name: name.as_str(),
                    dims,
                    lines: Vec::new(),
                });
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }
            if let Some(block) = blocks.last_mut() {
                block.lines.push((idx + 1, trimmed));
            }
        }
        (dataset, blocks)
    }

    fn axis(blocks: &[Block<'_>], name: &str) -> Result<Vec<f64>, ParserError> {
        let block = blocks
            .iter()
            .find(|b| b.short_name() == name && b.dims.len() == 1)
            .ok_or_else(|| Self::schema_error(format!("response has no '{name}' axis")))?;
        let values = block
            .lines
            .iter()
            .flat_map(|(_, line)| line.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| Self::schema_error(format!("{name} axis value '{v}' is not a number")))
            })
            .collect::<Result<Vec<f64>, ParserError>>()?;
        if values.len() != block.dims[0] {
            return Err(Self::schema_error(format!(
                "{name} axis declares {} values but lists {}",
                block.dims[0],
                values.len()
            )));
        }
        Ok(values)
    }

    fn granule(&self, dataset: Option<&str>) -> Result<GranuleDay, ParserError> {
        if let Some(granule) = self.config.granule {
            return Ok(granule);
        }
        let name = dataset.ok_or_else(|| {
            Self::schema_error("no Dataset line and no granule date configured")
        })?;
        let caps = GRANULE_DATE
            .captures(name)
            .ok_or_else(|| Self::schema_error(format!("cannot read a date from granule '{name}'")))?;
        Ok(GranuleDay {
            year: caps[1].parse().map_err(|_| Self::schema_error("invalid granule year"))?,
            day: caps[2].parse().map_err(|_| Self::schema_error("invalid granule day"))?,
        })
    }

    fn grid_line(
        &self,
        line: &str,
        lats: &[f64],
        lons: &[f64],
    ) -> Result<(usize, Vec<Value>), RowFailure> {
        let (index, rest) = line
            .strip_prefix('[')
            .and_then(|s| s.split_once(']'))
            .ok_or_else(|| RowFailure::Malformed(format!("grid row '{line}' has no [index] prefix")))?;
        let lat_idx: usize = index
            .trim()
            .parse()
            .map_err(|_| RowFailure::Malformed(format!("invalid grid row index '{index}'")))?;
        if lat_idx >= lats.len() {
            return Err(RowFailure::Malformed(format!(
                "grid row index {lat_idx} exceeds {} latitudes",
                lats.len()
            )));
        }
        let raw: Vec<&str> = rest
            .trim_start()
            .trim_start_matches(',')
            .split(',')
            .map(str::trim)
            .collect();
        if raw.len() != lons.len() {
            return Err(RowFailure::FieldCount {
                expected: lons.len(),
                found: raw.len(),
            });
        }
        let values = raw
            .into_iter()
            .map(|v| float_cell(v, &self.config.variable, &self.config.missing))
            .collect::<Result<Vec<Value>, RowFailure>>()?;
        Ok((lat_idx, values))
    }
}

impl FormatParser for OceanColorParser {
    fn provider(&self) -> Provider {
        Self::PROVIDER
    }

    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError> {
        let (dataset, blocks) = Self::split_blocks(content);
        let variable = self.config.variable.as_str();
        let grid = blocks
            .iter()
            .find(|b| b.short_name() == variable && b.dims.len() == 2)
            .ok_or_else(|| {
                Self::schema_error(format!("response has no two-dimensional '{variable}' grid"))
            })?;
        let lats = Self::axis(&blocks, "lat")?;
        let lons = Self::axis(&blocks, "lon")?;
        if grid.dims != [lats.len(), lons.len()] {
            return Err(Self::schema_error(format!(
                "grid shape {:?} does not match lat/lon axes ({}, {})",
                grid.dims,
                lats.len(),
                lons.len()
            )));
        }

        let granule = self.granule(dataset)?;
        let (year, day) = (granule.year.to_string(), granule.day.to_string());
        let time = TimeEncoding::YearDay {
            zone: SourceZone::Utc,
        }
        .normalize(&[year.as_str(), day.as_str()])
        .map_err(|err| Self::schema_error(format!("invalid granule date: {err}")))?;

        let schema = vec![
            ColumnSpec::new(TIME_COLUMN, ColumnKind::Timestamp),
            ColumnSpec::new("latitude", ColumnKind::Float),
            ColumnSpec::new("longitude", ColumnKind::Float),
            ColumnSpec::new(variable, ColumnKind::Float),
        ];
        let mut collector = RowCollector::new(Self::PROVIDER, schema, options);

        for (line_index, line) in &grid.lines {
            let (lat_idx, values) = match self.grid_line(line, &lats, &lons) {
                Ok(parsed) => parsed,
                Err(failure) => {
                    collector.accept(*line_index, Err(failure))?;
                    continue;
                }
            };
            let lat = lats[lat_idx];
            if !within(lat, self.config.lat_extent) {
                continue;
            }
            for (lon, value) in lons.iter().zip(values) {
                if !within(*lon, self.config.lon_extent) {
                    continue;
                }
                let mut row = NormalizedRow::with_capacity(4);
                row.push(TIME_COLUMN, Value::Timestamp(time));
                row.push("latitude", Value::Float(lat));
                row.push("longitude", Value::Float(*lon));
                row.push(variable, value);
                collector.accept(*line_index, Ok(row))?;
            }
        }
        collector.finish()
    }
}
