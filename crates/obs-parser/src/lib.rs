//! Normalizes provider-specific oceanographic payloads into typed tables.

pub mod errors;
pub mod formats;
pub mod model;
pub mod table;
pub mod time;
mod registry;

pub use errors::{ParserError, RowFailure};
pub use formats::{
    is_lobo_data, is_nerr_data, is_noaa_data, ElkhornGisConfig, ElkhornGisParser, GranuleDay,
    LoboConfig, LoboParser, MlmlConfig, MlmlParser, NerrConfig, NerrParser, NoaaTideConfig,
    NoaaTideParser, OceanColorConfig, OceanColorParser, NOAA_HEADER_PREFIX,
};
pub use model::{
    ColumnKind, ColumnSpec, MissingValues, NormalizedRow, ParseOptions, Provider, SkippedRow,
    Table, Value,
};
pub use registry::{parse_payload, FormatParser, ProviderConfig};
pub use table::{build_rows, TableBuilder};
pub use time::{SourceZone, TimeEncoding, TimeParseError};
