//! Run configuration for the correction CLI
//!
//! The YAML file names the entries to correct, the scheme and its options.
//! Command-line arguments override the file.

mod args;

pub use args::Args;

use compat::{AqueousReferences, OnError, SchemeOptions};
use entries::EnergyUnit;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Path to a JSON or YAML list of entries.
    pub entries: Option<String>,
    pub scheme: Option<String>,
    /// Unit of the energies in the entries file.
    pub energy_unit: Option<EnergyUnit>,
    pub options: Option<SchemeOptions>,
    pub process: Option<ProcessParams>,
    pub aqueous: Option<AqueousReferences>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            entries: None,
            scheme: Some("mp2020".to_string()),
            energy_unit: Some(EnergyUnit::Ev),
            options: Some(SchemeOptions::default()),
            process: Some(ProcessParams::default()),
            aqueous: Some(AqueousReferences::default()),
        }
    }
}

impl Config {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.scheme.is_none() {
            self.scheme = defaults.scheme;
        }
        if self.energy_unit.is_none() {
            self.energy_unit = defaults.energy_unit;
        }
        if self.options.is_none() {
            self.options = defaults.options;
        }
        self.process = Some(self.process.unwrap_or_default().with_defaults());
        if self.aqueous.is_none() {
            self.aqueous = defaults.aqueous;
        }
        self
    }
}

/// Batch processing parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProcessParams {
    /// Left unset to use the scheme's own default.
    pub clean: Option<bool>,
    pub inplace: Option<bool>,
    pub on_error: Option<OnError>,
    pub verbose: Option<bool>,
}

impl Default for ProcessParams {
    fn default() -> Self {
        ProcessParams {
            clean: None,
            inplace: Some(true),
            on_error: Some(OnError::Warn),
            verbose: Some(false),
        }
    }
}

impl ProcessParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.inplace.is_none() {
            self.inplace = defaults.inplace;
        }
        if self.on_error.is_none() {
            self.on_error = defaults.on_error;
        }
        if self.verbose.is_none() {
            self.verbose = defaults.verbose;
        }
        self
    }
}
