//! Named configuration presets kept in `~/.csv2db.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::LoadConfig;
use crate::error::Result;

/// Preset applied when none is named.
pub const DEFAULT_PRESET: &str = "default";

const PRESETS_FILE_NAME: &str = ".csv2db.yaml";

/// Contents of the presets file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetStore {
    #[serde(default)]
    pub presets: BTreeMap<String, LoadConfig>,
}

impl PresetStore {
    /// `~/.csv2db.yaml`, or `./.csv2db.yaml` when no home directory is set.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(PRESETS_FILE_NAME)
    }

    /// Load the store; a missing file is an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No presets file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        info!("Saved presets to {}", path.display());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LoadConfig> {
        self.presets.get(name)
    }

    /// Store `config` under `name`, dropping the password and input.
    pub fn set(&mut self, name: &str, config: &LoadConfig) {
        self.presets.insert(name.to_string(), config.to_preset());
    }
}
