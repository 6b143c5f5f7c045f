//! Computed entries
//!
//! A [`ComputedEntry`] is the result of one total-energy calculation: a
//! composition, the uncorrected energy, the calculation parameters the
//! compatibility schemes inspect and a list of energy adjustments.

use crate::adjustment::EnergyAdjustment;
use crate::composition::Composition;
use crate::structure::Structure;
use crate::uncertainty::{UFloat, Uncertainty};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Oxygen anion character of an oxide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OxideType {
    Oxide,
    Peroxide,
    Superoxide,
    Ozonide,
    Hydroxide,
}

impl OxideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OxideType::Oxide => "oxide",
            OxideType::Peroxide => "peroxide",
            OxideType::Superoxide => "superoxide",
            OxideType::Ozonide => "ozonide",
            OxideType::Hydroxide => "hydroxide",
        }
    }
}

impl fmt::Display for OxideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OxideType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oxide" => Ok(OxideType::Oxide),
            "peroxide" => Ok(OxideType::Peroxide),
            "superoxide" => Ok(OxideType::Superoxide),
            "ozonide" => Ok(OxideType::Ozonide),
            "hydroxide" => Ok(OxideType::Hydroxide),
            _ => Err(format!("Unknown oxide type: {}", s)),
        }
    }
}

/// Sulfur anion character of a sulfide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SulfideType {
    Sulfide,
    Polysulfide,
    Sulfate,
}

impl SulfideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SulfideType::Sulfide => "sulfide",
            SulfideType::Polysulfide => "polysulfide",
            SulfideType::Sulfate => "sulfate",
        }
    }
}

impl fmt::Display for SulfideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SulfideType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sulfide" => Ok(SulfideType::Sulfide),
            "polysulfide" => Ok(SulfideType::Polysulfide),
            "sulfate" => Ok(SulfideType::Sulfate),
            _ => Err(format!("Unknown sulfide type: {}", s)),
        }
    }
}

/// One pseudopotential used in a calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotcarSpec {
    /// Full title, e.g. "PAW_PBE Fe_pv 06Sep2000".
    pub titel: String,
    #[serde(default)]
    pub hash: Option<String>,
}

impl PotcarSpec {
    pub fn new(titel: impl Into<String>, hash: Option<String>) -> Self {
        Self {
            titel: titel.into(),
            hash,
        }
    }

    /// Short symbol, the second whitespace token of the title.
    pub fn symbol(&self) -> &str {
        potcar_symbol(&self.titel)
    }
}

/// Extract the short POTCAR symbol from "PAW_PBE Fe_pv 06Sep2000" style
/// labels. A label with a single token is returned unchanged.
pub fn potcar_symbol(label: &str) -> &str {
    let mut tokens = label.split_whitespace();
    let first = tokens.next().unwrap_or("");
    tokens.next().unwrap_or(first)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcParameters {
    /// Run type such as "GGA", "GGA+U", "PBE" or "R2SCAN".
    #[serde(default)]
    pub run_type: Option<String>,
    /// Hubbard U values by element; absent for plain GGA runs.
    #[serde(default)]
    pub hubbards: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub software: Option<String>,
    #[serde(default)]
    pub potcar_symbols: Vec<String>,
    #[serde(default)]
    pub potcar_spec: Option<Vec<PotcarSpec>>,
}

impl CalcParameters {
    /// U value used for `symbol`, zero when absent.
    pub fn hubbard(&self, symbol: &str) -> f64 {
        self.hubbards
            .as_ref()
            .and_then(|u| u.get(symbol).copied())
            .unwrap_or(0.0)
    }

    /// True when any element carries a nonzero U.
    pub fn is_hubbard(&self) -> bool {
        self.hubbards
            .as_ref()
            .map(|u| u.values().any(|value| *value != 0.0))
            .unwrap_or(false)
    }

    /// Short POTCAR symbols, preferring the detailed spec when present.
    pub fn potcar_short_symbols(&self) -> Vec<String> {
        match &self.potcar_spec {
            Some(spec) if !spec.is_empty() => {
                spec.iter().map(|p| p.symbol().to_string()).collect()
            }
            _ => self
                .potcar_symbols
                .iter()
                .map(|label| potcar_symbol(label).to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxide_type: Option<OxideType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sulfide_type: Option<SulfideType>,
    /// Cached oxidation-state guess; an empty map means the guess failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxidation_states: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedEntry {
    #[serde(default)]
    pub entry_id: Option<String>,
    pub composition: Composition,
    #[serde(alias = "energy")]
    pub uncorrected_energy: f64,
    #[serde(default)]
    pub parameters: CalcParameters,
    #[serde(default)]
    pub data: EntryData,
    #[serde(default)]
    pub energy_adjustments: Vec<EnergyAdjustment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Structure>,
}

impl ComputedEntry {
    pub fn new(composition: Composition, uncorrected_energy: f64) -> Self {
        Self {
            entry_id: None,
            composition,
            uncorrected_energy,
            parameters: CalcParameters::default(),
            data: EntryData::default(),
            energy_adjustments: Vec::new(),
            structure: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.entry_id = Some(id.into());
        self
    }

    pub fn with_parameters(mut self, parameters: CalcParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_data(mut self, data: EntryData) -> Self {
        self.data = data;
        self
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_adjustments(mut self, adjustments: Vec<EnergyAdjustment>) -> Self {
        self.energy_adjustments = adjustments;
        self
    }

    /// Sum of all adjustment values.
    pub fn correction(&self) -> f64 {
        self.energy_adjustments.iter().map(|a| a.value()).sum()
    }

    /// Sum of adjustments with their errors propagated in quadrature.
    pub fn correction_ufloat(&self) -> UFloat {
        self.energy_adjustments
            .iter()
            .map(|a| UFloat::new(a.value(), a.uncertainty().known().unwrap_or(0.0)))
            .sum()
    }

    /// Uncertainty of the total correction. Adjustments with unknown error
    /// contribute nothing; a nonzero total with zero error is unknown.
    pub fn correction_uncertainty(&self) -> Uncertainty {
        Uncertainty::of_correction(self.correction_ufloat())
    }

    /// Corrected total energy.
    pub fn energy(&self) -> f64 {
        self.uncorrected_energy + self.correction()
    }

    pub fn num_atoms(&self) -> f64 {
        self.composition.num_atoms()
    }

    pub fn energy_per_atom(&self) -> f64 {
        self.energy() / self.num_atoms()
    }

    pub fn uncorrected_energy_per_atom(&self) -> f64 {
        self.uncorrected_energy / self.num_atoms()
    }

    pub fn correction_per_atom(&self) -> f64 {
        self.correction() / self.num_atoms()
    }

    pub fn reduced_formula(&self) -> String {
        self.composition.reduced_formula()
    }

    /// Identifier for log messages: the id if set, else the formula.
    pub fn label(&self) -> String {
        match &self.entry_id {
            Some(id) => format!("{} ({})", id, self.composition.formula()),
            None => self.composition.formula(),
        }
    }
}

impl fmt::Display for ComputedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: E = {:.4} eV (uncorrected {:.4} eV, correction {:.4} eV)",
            self.label(),
            self.energy(),
            self.uncorrected_energy,
            self.correction()
        )
    }
}
