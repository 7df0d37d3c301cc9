//! Combined configuration file for the replay harness.

use crate::error::SimError;
use crate::replay::ReplayConfig;
use serde::{Deserialize, Serialize};
use shuttle_core::TrackingConfig;
use std::path::Path;

/// Top-level configuration: one section per manager.
///
/// ```json
/// {
///   "tracking": { "predictUpdates": true, "predictionInterval": "1s" },
///   "replay": { "replayUpdates": true, "replayInterval": "10s", "dataDir": "spoof_data" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuttleConfig {
    pub tracking: TrackingConfig,
    pub replay: ReplayConfig,
}

impl ShuttleConfig {
    /// Loads a configuration file. Missing sections and keys take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| SimError::parse(path, e))
    }

    /// Checks both intervals without building anything.
    pub fn validate(&self) -> Result<(), SimError> {
        self.tracking.interval()?;
        self.replay.interval()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_partial_config_takes_defaults() {
        let config: ShuttleConfig =
            serde_json::from_str(r#"{"replay": {"replayUpdates": true, "dataDir": "recordings"}}"#).unwrap();

        assert!(config.replay.replay_updates);
        assert_eq!(config.replay.data_dir, PathBuf::from("recordings"));
        assert_eq!(config.replay.interval().unwrap(), Duration::from_secs(10));
        assert_eq!(config.tracking, TrackingConfig::default());
    }

    #[test]
    fn test_validate_reports_bad_interval() {
        let mut config = ShuttleConfig::default();
        assert!(config.validate().is_ok());

        config.tracking.prediction_interval = "fast".to_string();
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_from_file_rejects_malformed_json() {
        let path = std::env::temp_dir().join(format!("shuttle-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ tracking: ").unwrap();

        assert!(matches!(ShuttleConfig::from_file(&path), Err(SimError::Parse { .. })));
        std::fs::remove_file(&path).unwrap();
    }
}
