//! Reference calculation input sets
//!
//! A correction scheme is only valid for calculations run with the settings
//! it was fitted against. For the schemes here that means the POTCAR chosen
//! for each element and the Hubbard U applied to each element.

use crate::error::ConfigError;
use crate::tables::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const BUNDLED_INPUT_SETS: &str = include_str!("../data/input_sets.yaml");

pub const MP_RELAX_SET: &str = "MPRelaxSet";
pub const MIT_RELAX_SET: &str = "MITRelaxSet";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PotcarSetting {
    Symbol(String),
    Detailed {
        symbol: String,
        #[serde(default)]
        hash: Option<String>,
    },
}

impl PotcarSetting {
    pub fn symbol(&self) -> &str {
        match self {
            PotcarSetting::Symbol(symbol) => symbol,
            PotcarSetting::Detailed { symbol, .. } => symbol,
        }
    }

    pub fn hash(&self) -> Option<&str> {
        match self {
            PotcarSetting::Symbol(_) => None,
            PotcarSetting::Detailed { hash, .. } => hash.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSet {
    #[serde(skip)]
    pub name: String,
    pub potcar: BTreeMap<String, PotcarSetting>,
    #[serde(default)]
    pub hubbard_u: BTreeMap<String, Table>,
}

impl InputSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            potcar: BTreeMap::new(),
            hubbard_u: BTreeMap::new(),
        }
    }

    pub fn with_potcar(mut self, element: &str, setting: PotcarSetting) -> Self {
        self.potcar.insert(element.to_string(), setting);
        self
    }

    pub fn with_hubbard_u(mut self, anion: &str, element: &str, u: f64) -> Self {
        self.hubbard_u
            .entry(anion.to_string())
            .or_default()
            .insert(element.to_string(), u);
        self
    }

    /// Mandated POTCAR symbol (or hash) for an element.
    pub fn mandated(&self, element: &str, by_hash: bool) -> Option<String> {
        let setting = self.potcar.get(element)?;
        if by_hash {
            setting.hash().map(str::to_string)
        } else {
            Some(setting.symbol().to_string())
        }
    }

    /// True when every POTCAR setting carries a hash.
    pub fn has_hashes(&self) -> bool {
        !self.potcar.is_empty() && self.potcar.values().all(|s| s.hash().is_some())
    }

    /// U values mandated when `anion` is the most electronegative element.
    pub fn u_settings(&self) -> &BTreeMap<String, Table> {
        &self.hubbard_u
    }
}

/// Input sets keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InputSetLibrary {
    sets: BTreeMap<String, Arc<InputSet>>,
}

impl InputSetLibrary {
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUNDLED_INPUT_SETS, "bundled input sets")
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
        let parsed: BTreeMap<String, InputSet> =
            serde_yml::from_str(content).map_err(|source| ConfigError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        let sets = parsed
            .into_iter()
            .map(|(name, mut set)| {
                set.name = name.clone();
                (name, Arc::new(set))
            })
            .collect();
        Ok(Self { sets })
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::bundled(),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<InputSet>, ConfigError> {
        self.sets
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownInputSet(name.to_string()))
    }

    pub fn insert(&mut self, set: InputSet) {
        self.sets.insert(set.name.clone(), Arc::new(set));
    }
}
