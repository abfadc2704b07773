use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, SourceError};

/// Environment variable naming a TOML file with endpoint overrides.
pub const CONFIG_ENV: &str = "OBS_CONFIG";

/// Base URLs for every provider plus the HTTP timeout.
///
/// Any key missing from the TOML file keeps its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub mlml: String,
    pub lobo: String,
    pub nerr: String,
    pub elkhorn_gis: String,
    pub noaa_tides: String,
    pub ocean_color: String,
    pub timeout_secs: u64,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            mlml: "https://pubdata.mlml.calstate.edu/".to_string(),
            lobo: "https://www3.mbari.org/lobo/cgi-bin/GetLOBOData.exe".to_string(),
            nerr: "https://cdmo.baruch.sc.edu/dges/export.cfm".to_string(),
            elkhorn_gis: "https://www.elkhornslough.org/gis/".to_string(),
            noaa_tides: "https://tidesandcurrents.noaa.gov/api/datagetter".to_string(),
            ocean_color: "https://oceandata.sci.gsfc.nasa.gov:443/opendap/MODISA/L3SMI/"
                .to_string(),
            timeout_secs: 60,
        }
    }
}

impl Endpoints {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| SourceError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| SourceError::io(path, source))?;
        Self::from_toml_str(&raw)
    }

    /// Reads `.env`, then loads the file named by `OBS_CONFIG`, if any.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        match env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                info!(path = %path, "loading endpoint configuration");
                Self::load(Path::new(path.trim()))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
