//! Error types for the replay harness.

use shuttle_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading replay sources, fixtures and config files.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A replay source holds no records
    #[error("replay source {0} is empty")]
    EmptySource(String),

    /// The first record of a replay source has no vehicle id
    #[error("replay source {0} has no vehicle id")]
    MissingVehicle(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SimError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
