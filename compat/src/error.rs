//! Error types for correction schemes
//!
//! [`CompatibilityError`] is raised for a single entry and only drops that
//! entry (unless the caller asks to fail fast). [`ConfigError`] is raised
//! while building a scheme and is always fatal.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompatibilityError {
    #[error("entry {entry} has invalid run type {run_type:?}, expected one of {allowed:?}")]
    InvalidRunType {
        entry: String,
        run_type: Option<String>,
        allowed: Vec<String>,
    },

    #[error("incompatible POTCAR {found:?}, expected {expected:?}")]
    PotcarMismatch {
        found: BTreeSet<Option<String>>,
        expected: BTreeSet<Option<String>>,
    },

    #[error("cannot check POTCAR hashes of entry {0} without potcar_spec")]
    MissingPotcarData(String),

    #[error("invalid U value of {actual:.1} on {element}, expected {expected:.1}")]
    InvalidHubbardU {
        element: String,
        actual: f64,
        expected: f64,
    },

    #[error(
        "O2 and H2O reference energies are required; provide them when building the scheme \
         or include ground-state O2 and H2O entries in the batch"
    )]
    MissingAqueousReferences,

    #[error("no H2 reference energy available for entry {0}")]
    MissingH2Reference(String),

    #[error("no {compound} value in the {table} table")]
    MissingCompoundEnergy { compound: String, table: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yml::Error,
    },

    #[error("no scheme named {0:?} in the correction tables")]
    UnknownScheme(String),

    #[error("no input set named {0:?}")]
    UnknownInputSet(String),

    #[error("{table} table is missing required key {key:?}")]
    MissingKey { table: String, key: String },

    #[error("invalid compat_type {0:?}, expected GGA or Advanced")]
    InvalidCompatType(String),

    #[error("cannot check POTCAR hashes: input set {0} carries no hashes")]
    HashesUnavailable(String),
}
