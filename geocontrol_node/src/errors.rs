// geocontrol_node/src/errors.rs

use std::io;
use std::path::PathBuf;

use geocontrol_core::prelude::{ControlError, MixerError, ParamsError};
use thiserror::Error;

/// Anything wrong with the startup configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    // Covers missing gains, unknown keys and type mismatches.
    #[error("failed to load configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("invalid parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("`node.rate_hz` must be positive and finite, got {0}")]
    InvalidRate(f64),

    #[error("`node.stale_after_ms` must be greater than zero")]
    InvalidStaleness,

    #[error("`node.run_for_seconds` must be positive and finite, got {0}")]
    InvalidDuration(f64),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Extract(Box::new(e))
    }
}

/// Why one control tick published nothing. Never outlives the tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error("failed to publish rotor speeds: {0}")]
    Sink(#[from] io::Error),
}

/// Startup and shutdown failures of the whole node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot build the actuator mixer: {0}")]
    Mixer(#[from] MixerError),

    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to serialize the effective configuration: {0}")]
    PrintConfig(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<ParamsError> for NodeError {
    fn from(e: ParamsError) -> Self {
        NodeError::Config(ConfigError::Params(e))
    }
}
