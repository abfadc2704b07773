mod common;
mod elkhorn_gis;
mod lobo;
mod mlml;
mod nerr;
mod noaa_tide;
mod ocean_color;

pub use elkhorn_gis::{ElkhornGisConfig, ElkhornGisParser};
pub use lobo::{is_lobo_data, LoboConfig, LoboParser};
pub use mlml::{MlmlConfig, MlmlParser};
pub use nerr::{is_nerr_data, NerrConfig, NerrParser};
pub use noaa_tide::{is_noaa_data, NoaaTideConfig, NoaaTideParser, NOAA_HEADER_PREFIX};
pub use ocean_color::{GranuleDay, OceanColorConfig, OceanColorParser};
