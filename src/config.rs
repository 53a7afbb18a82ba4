use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::MAX_OPEN;
use crate::disk::BUFFER_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine settings, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path of the disk file
    pub disk_path: PathBuf,
    /// Number of frames in the buffer pool
    pub buffer_capacity: usize,
    /// Maximum number of simultaneously open relations, catalogs included
    pub max_open: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disk_path: PathBuf::from("disk"),
            buffer_capacity: BUFFER_CAPACITY,
            max_open: MAX_OPEN,
        }
    }
}

impl EngineConfig {
    /// Default settings with a different disk file
    pub fn with_disk<P: AsRef<Path>>(path: P) -> Self {
        Self {
            disk_path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save settings as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                name: "buffer_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        // The two catalogs always occupy a slot each
        if self.max_open < 3 {
            return Err(ConfigError::Invalid {
                name: "max_open",
                reason: format!("must be at least 3, got {}", self.max_open),
            });
        }
        Ok(())
    }
}
