//! Correction tables
//!
//! The tables are read once from YAML when a scheme is built and are
//! immutable afterwards. A copy is bundled into the binary; any other file
//! with the same layout can replace it.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const BUNDLED_TABLES: &str = include_str!("../data/compatibility.yaml");

/// Values in eV keyed by element symbol, formula or anion type.
pub type Table = BTreeMap<String, f64>;

/// One set of tables; used for both corrections and their uncertainties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionTables {
    /// Gas-phase compound energies per atom, keyed by reduced formula.
    #[serde(default)]
    pub gas: Table,
    /// Per-sulfur corrections keyed by sulfide type.
    #[serde(default)]
    pub sulfide: Table,
    /// Per-oxygen corrections keyed by oxide type.
    #[serde(default)]
    pub oxide: Table,
    /// Per-atom corrections keyed by oxide type or anion element.
    #[serde(default)]
    pub composition: Table,
    /// Most electronegative element -> U element -> correction per atom.
    #[serde(default)]
    pub u_mixing: BTreeMap<String, Table>,
    /// Aqueous compound energies per atom, keyed by reduced formula.
    #[serde(default)]
    pub aqueous: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeTables {
    /// Short name used in adjustment names, e.g. "MP2020".
    pub name: String,
    pub corrections: CorrectionTables,
    #[serde(default)]
    pub uncertainties: CorrectionTables,
}

impl SchemeTables {
    /// Fail unless every key is present in `table`.
    pub fn require(&self, label: &str, table: &Table, keys: &[&str]) -> Result<(), ConfigError> {
        match keys.iter().find(|key| !table.contains_key(**key)) {
            Some(key) => Err(ConfigError::MissingKey {
                table: format!("{} {}", self.name, label),
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompatibilityConfig {
    schemes: BTreeMap<String, SchemeTables>,
}

impl CompatibilityConfig {
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUNDLED_TABLES, "bundled compatibility tables")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, &path.display().to_string())
    }

    pub fn from_yaml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Load `path` if given, the bundled tables otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::bundled(),
        }
    }

    pub fn scheme(&self, name: &str) -> Result<&SchemeTables, ConfigError> {
        self.schemes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownScheme(name.to_string()))
    }

    pub fn scheme_names(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }
}
