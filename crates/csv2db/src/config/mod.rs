//! Configuration loading, presets and validation.

mod presets;
mod types;
mod validation;

pub use presets::{PresetStore, DEFAULT_PRESET};
pub use types::*;

use crate::core::traits::WriterOptions;
use crate::drivers::ConnectOptions;
use crate::error::Result;
use crate::source::SourceOptions;

/// Validated configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub connect: ConnectOptions,
    /// Explicit schema; the driver default applies when unset.
    pub schema: Option<String>,
    pub table: String,
    pub table_mode: TableMode,
    pub has_header: bool,
    pub source: SourceOptions,
    pub writer: WriterOptions,
    pub queue_capacity: usize,
}

impl LoadConfig {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate and apply defaults.
    pub fn resolve(&self) -> Result<LoadSettings> {
        validation::resolve(self)
    }
}
