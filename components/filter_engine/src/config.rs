use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-filter engine configuration. The manager's default `Config` carries
/// one of these; `create_filter` may pass a distinct override that the
/// wrapper then owns for the filter's lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory under which `bloomd.<name>/` subdirectories are created.
    pub data_dir: PathBuf,
    /// When true, slices are never written to disk and `is_proxied` is
    /// always false (there is nothing to proxy to).
    pub in_memory: bool,
    /// Expected number of items the first slice is sized for.
    pub initial_capacity: u64,
    /// Target false-positive probability for each slice.
    pub fp_probability: f64,
    /// Growth ratio applied to `initial_capacity` for each subsequent
    /// slice once the current one crosses its fill threshold (the
    /// simplified scalable-Bloom-filter growth scheme).
    pub scale_size: f64,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            data_dir: PathBuf::from("."),
            in_memory: false,
            initial_capacity: 100_000,
            fp_probability: 0.001,
            scale_size: 4.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(Error::InvalidConfig("initial_capacity must be > 0".into()));
        }
        if !(self.fp_probability > 0.0 && self.fp_probability < 1.0) {
            return Err(Error::InvalidConfig(
                "fp_probability must be in (0, 1)".into(),
            ));
        }
        if self.scale_size <= 1.0 {
            return Err(Error::InvalidConfig("scale_size must be > 1.0".into()));
        }
        Ok(())
    }

    /// Directory a filter named `name` is persisted under, per the fixed
    /// `bloomd.` prefix discovery relies on.
    pub fn filter_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("bloomd.{}", name))
    }
}
