// geocontrol_node/src/config/mod.rs

//! Loading and validation of the node configuration.
//!
//! Sources, later ones winning:
//! 1. the TOML file given on the command line,
//! 2. environment variables prefixed with `GEOCONTROL_`, where `__` separates
//!    nesting levels (`GEOCONTROL_GAINS__KX=4.0` sets `gains.kx`).

pub mod structs;

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::info;

use crate::errors::ConfigError;
pub use structs::{NodeConfig, NodeSection, TransportConfig, VehicleConfig, STDIO};

/// Prefix of the environment overrides.
pub const ENV_PREFIX: &str = "GEOCONTROL_";

impl NodeConfig {
    /// Reads `path`, applies environment overrides and validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        info!("Loading controller configuration from: {}", path.display());

        let config: NodeConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses an in-memory TOML document without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = Figment::new().merge(Toml::string(toml)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.node.rate_hz;
        if !(rate.is_finite() && rate > 0.0) || self.node.period().is_none() {
            return Err(ConfigError::InvalidRate(rate));
        }
        if self.node.stale_after_ms == 0 {
            return Err(ConfigError::InvalidStaleness);
        }
        if let Some(seconds) = self.node.run_for_seconds {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(ConfigError::InvalidDuration(seconds));
            }
        }
        self.gains.validate()?;
        self.vehicle.to_params()?;
        Ok(())
    }
}
