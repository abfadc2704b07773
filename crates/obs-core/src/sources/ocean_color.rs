use std::fmt;

use chrono::{Datelike, NaiveDate};
use obs_parser::{
    FormatParser, GranuleDay, OceanColorConfig, OceanColorParser, ParseOptions, ParserError,
    Provider, Table,
};
use tracing::warn;

use super::{fetch_text, log_table};
use crate::config::Endpoints;
use crate::error::{Result, SourceError};
use crate::fetch::Fetcher;

const PROVIDER: Provider = Provider::OceanColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialResolution {
    Km4,
    Km9,
}

impl SpatialResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialResolution::Km4 => "4km",
            SpatialResolution::Km9 => "9km",
        }
    }

    /// `(rows, columns)` of the global equirectangular grid.
    pub fn grid_shape(&self) -> (usize, usize) {
        match self {
            SpatialResolution::Km4 => (4320, 8640),
            SpatialResolution::Km9 => (2160, 4320),
        }
    }
}

impl fmt::Display for SpatialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one Level-3 product, e.g. `A2004001.L3m_DAY_CHL_chl_ocx_4km.nc`.
#[derive(Debug, Clone, PartialEq)]
pub struct OceanColorVariable {
    /// Variable inside the file: `chl_ocx`, `nflh`, `Rrs_555`, ...
    pub name: String,
    /// Upper-case product group: `CHL`, `FLH`, `RRS`, ...
    pub category: String,
    /// `DAY`, `8D`, `MO`, `R32` or `YR`.
    pub time_resolution: String,
    pub spatial_resolution: SpatialResolution,
    pub mapping: String,
    /// Sensor prefix ahead of the date, `A` for MODIS Aqua.
    pub file_prefix: String,
}

impl Default for OceanColorVariable {
    fn default() -> Self {
        Self {
            name: "chl_ocx".to_string(),
            category: "CHL".to_string(),
            time_resolution: "DAY".to_string(),
            spatial_resolution: SpatialResolution::Km4,
            mapping: "L3m".to_string(),
            file_prefix: "A".to_string(),
        }
    }
}

impl OceanColorVariable {
    pub fn granule_name(&self, day: GranuleDay) -> String {
        format!(
            "{prefix}{year}{doy:03}.{mapping}_{time}_{category}_{name}_{res}.nc",
            prefix = self.file_prefix,
            year = day.year,
            doy = day.day,
            mapping = self.mapping,
            time = self.time_resolution,
            category = self.category,
            name = self.name,
            res = self.spatial_resolution,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OceanColorQuery {
    pub first_year: i32,
    pub last_year: i32,
    /// Day of year to start at in the first year.
    pub start_day: Option<u32>,
    /// Day of year to stop at (inclusive) in the last year.
    pub end_day: Option<u32>,
    /// `(min, max)` degrees north.
    pub lat_extent: (f64, f64),
    /// `(min, max)` degrees east.
    pub lon_extent: (f64, f64),
    pub variable: OceanColorVariable,
}

/// Inclusive row and column index ranges into the global grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub rows: (usize, usize),
    pub columns: (usize, usize),
}

pub fn days_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31).map_or(365, |d| d.ordinal())
}

/// Indices of the cells whose centres fall inside `[lo, hi]`, for an axis
/// whose first cell edge is `start` and whose cells are `step` wide.
fn cell_range(start: f64, step: f64, size: usize, lo: f64, hi: f64) -> Option<(usize, usize)> {
    let (near, far) = if step > 0.0 { (lo, hi) } else { (hi, lo) };
    let first = ((near - start) / step - 0.5).ceil().max(0.0);
    let last = ((far - start) / step - 0.5).floor();
    if last < first || first >= size as f64 {
        return None;
    }
    Some((first as usize, (last as usize).min(size - 1)))
}

impl OceanColorQuery {
    pub fn new(years: (i32, i32), lat_extent: (f64, f64), lon_extent: (f64, f64)) -> Self {
        Self {
            first_year: years.0,
            last_year: years.1,
            start_day: None,
            end_day: None,
            lat_extent,
            lon_extent,
            variable: OceanColorVariable::default(),
        }
    }

    /// Every granule day requested, in order.
    pub fn days(&self) -> Result<Vec<GranuleDay>> {
        if self.first_year > self.last_year {
            return Err(SourceError::invalid(
                PROVIDER,
                "years",
                format!("{} is after {}", self.first_year, self.last_year),
            ));
        }
        let first_len = days_in_year(self.first_year);
        let last_len = days_in_year(self.last_year);
        let start = self.start_day.unwrap_or(1);
        let end = self.end_day.unwrap_or(last_len);
        if !(1..=first_len).contains(&start) {
            return Err(SourceError::invalid(
                PROVIDER,
                "start_day",
                format!("{start} is outside 1..={first_len}"),
            ));
        }
        if !(1..=last_len).contains(&end) {
            return Err(SourceError::invalid(
                PROVIDER,
                "end_day",
                format!("{end} is outside 1..={last_len}"),
            ));
        }
        if self.first_year == self.last_year && start > end {
            return Err(SourceError::invalid(
                PROVIDER,
                "start_day",
                format!("{start} is after end day {end}"),
            ));
        }

        let mut days = Vec::new();
        for year in self.first_year..=self.last_year {
            let from = if year == self.first_year { start } else { 1 };
            let to = if year == self.last_year {
                end
            } else {
                days_in_year(year)
            };
            days.extend((from..=to).map(|day| GranuleDay { year, day }));
        }
        Ok(days)
    }

    pub fn window(&self) -> Result<GridWindow> {
        let (lat_lo, lat_hi) = self.lat_extent;
        let (lon_lo, lon_hi) = self.lon_extent;
        if !(lat_lo <= lat_hi && lat_lo >= -90.0 && lat_hi <= 90.0) {
            return Err(SourceError::invalid(
                PROVIDER,
                "lat_extent",
                format!("({lat_lo}, {lat_hi}) is not an ordered latitude range"),
            ));
        }
        if !(lon_lo <= lon_hi && lon_lo >= -180.0 && lon_hi <= 180.0) {
            return Err(SourceError::invalid(
                PROVIDER,
                "lon_extent",
                format!("({lon_lo}, {lon_hi}) is not an ordered longitude range"),
            ));
        }

        // Rows run north to south from 90N, columns west to east from 180W.
        let (rows, columns) = self.variable.spatial_resolution.grid_shape();
        let row_range = cell_range(90.0, -180.0 / rows as f64, rows, lat_lo, lat_hi);
        let column_range = cell_range(-180.0, 360.0 / columns as f64, columns, lon_lo, lon_hi);
        let Some(rows) = row_range else {
            return Err(SourceError::invalid(
                PROVIDER,
                "lat_extent",
                format!("({lat_lo}, {lat_hi}) contains no grid cell centre"),
            ));
        };
        let Some(columns) = column_range else {
            return Err(SourceError::invalid(
                PROVIDER,
                "lon_extent",
                format!("({lon_lo}, {lon_hi}) contains no grid cell centre"),
            ));
        };
        Ok(GridWindow { rows, columns })
    }
}

/// `{base}{year}/{doy:03}/{granule}.ascii?{var}[r0:r1][c0:c1]`
pub fn granule_url(
    endpoints: &Endpoints,
    variable: &OceanColorVariable,
    day: GranuleDay,
    window: GridWindow,
) -> String {
    let base = endpoints.ocean_color.trim_end_matches('/');
    format!(
        "{base}/{year}/{doy:03}/{granule}.ascii?{name}[{r0}:{r1}][{c0}:{c1}]",
        year = day.year,
        doy = day.day,
        granule = variable.granule_name(day),
        name = variable.name,
        r0 = window.rows.0,
        r1 = window.rows.1,
        c0 = window.columns.0,
        c1 = window.columns.1,
    )
}

/// Requests the window for every day and stacks the daily tables.
///
/// Days the server cannot deliver, or answers with something other than a
/// grid, are logged and left out; the call fails only when no day at all
/// could be fetched.
pub fn fetch(
    fetcher: &dyn Fetcher,
    endpoints: &Endpoints,
    query: &OceanColorQuery,
    options: &ParseOptions,
) -> Result<Table> {
    let days = query.days()?;
    let window = query.window()?;

    let mut table: Option<Table> = None;
    let mut first_failure: Option<SourceError> = None;
    for day in days {
        let url = granule_url(endpoints, &query.variable, day, window);
        let payload = match fetch_text(fetcher, PROVIDER, &url) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(year = day.year, day = day.day, error = %err, "granule unavailable");
                first_failure.get_or_insert(err);
                continue;
            }
        };

        let parser = OceanColorParser::new(OceanColorConfig {
            variable: query.variable.name.clone(),
            granule: Some(day),
            lat_extent: Some(query.lat_extent),
            lon_extent: Some(query.lon_extent),
            ..OceanColorConfig::default()
        });
        let daily = match parser.parse(&payload, options) {
            Ok(daily) => daily,
            // OPeNDAP answers a missing granule with an `Error { ... }` body.
            Err(ParserError::Schema { reason, .. }) => {
                warn!(year = day.year, day = day.day, reason = %reason, "granule is not a grid");
                first_failure.get_or_insert(SourceError::SourceUnavailable {
                    provider: PROVIDER,
                    url,
                    reason,
                });
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        match table.as_mut() {
            Some(table) => table.append(daily)?,
            None => table = Some(daily),
        }
    }

    match (table, first_failure) {
        (Some(table), _) => {
            log_table(PROVIDER, &table);
            Ok(table)
        }
        (None, Some(err)) => Err(err),
        (None, None) => Err(SourceError::invalid(PROVIDER, "years", "no days requested")),
    }
}
