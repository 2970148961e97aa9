//! Manager-level configuration: the data directory directory discovery (C3)
//! scans, and the default per-filter engine config `create_filter` falls
//! back to when no override is supplied. Shape mirrors
//! `src/storage/config.rs`'s `Config` in the teacher crate.

use std::path::PathBuf;

use filter_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Config {
        let data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        Config {
            engine: EngineConfig {
                data_dir: data_dir.clone(),
                ..EngineConfig::default()
            },
            data_dir,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("data_dir must not be empty".into()));
        }
        self.engine
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(())
    }

    /// Builds the per-filter engine config a `create_filter` call without an
    /// explicit override uses: the manager default, rooted at this
    /// manager's data directory.
    pub fn default_engine_config(&self) -> EngineConfig {
        EngineConfig {
            data_dir: self.data_dir.clone(),
            ..self.engine.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn empty_data_dir_rejected() {
        let mut cfg = Config::default();
        cfg.data_dir = PathBuf::new();
        assert!(cfg.validate().is_err());
    }
}
