//! Energy values tagged with a unit
//!
//! All corrections are computed in eV; other units only appear at the
//! edges (input files and reports).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HARTREE_TO_EV: f64 = 27.211386245988;
const RYDBERG_TO_EV: f64 = HARTREE_TO_EV / 2.0;
const EV_TO_KJ_PER_MOL: f64 = 96.485332123;
const KCAL_TO_KJ: f64 = 4.184;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnergyUnit {
    #[default]
    #[serde(rename = "eV")]
    Ev,
    #[serde(rename = "meV")]
    MilliEv,
    #[serde(rename = "Ha")]
    Hartree,
    #[serde(rename = "Ry")]
    Rydberg,
    #[serde(rename = "kJ/mol")]
    KjPerMol,
    #[serde(rename = "kcal/mol")]
    KcalPerMol,
}

impl EnergyUnit {
    /// Size of one of this unit, in eV.
    pub fn in_ev(self) -> f64 {
        match self {
            EnergyUnit::Ev => 1.0,
            EnergyUnit::MilliEv => 1e-3,
            EnergyUnit::Hartree => HARTREE_TO_EV,
            EnergyUnit::Rydberg => RYDBERG_TO_EV,
            EnergyUnit::KjPerMol => 1.0 / EV_TO_KJ_PER_MOL,
            EnergyUnit::KcalPerMol => KCAL_TO_KJ / EV_TO_KJ_PER_MOL,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            EnergyUnit::Ev => "eV",
            EnergyUnit::MilliEv => "meV",
            EnergyUnit::Hartree => "Ha",
            EnergyUnit::Rydberg => "Ry",
            EnergyUnit::KjPerMol => "kJ/mol",
            EnergyUnit::KcalPerMol => "kcal/mol",
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for EnergyUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ev" => Ok(EnergyUnit::Ev),
            "mev" => Ok(EnergyUnit::MilliEv),
            "ha" | "hartree" => Ok(EnergyUnit::Hartree),
            "ry" | "rydberg" => Ok(EnergyUnit::Rydberg),
            "kj/mol" | "kjmol" => Ok(EnergyUnit::KjPerMol),
            "kcal/mol" | "kcalmol" => Ok(EnergyUnit::KcalPerMol),
            _ => Err(format!("Unknown energy unit: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    pub value: f64,
    pub unit: EnergyUnit,
}

impl Energy {
    pub fn new(value: f64, unit: EnergyUnit) -> Self {
        Self { value, unit }
    }

    pub fn ev(value: f64) -> Self {
        Self::new(value, EnergyUnit::Ev)
    }

    pub fn to(self, unit: EnergyUnit) -> Energy {
        Energy {
            value: self.value * self.unit.in_ev() / unit.in_ev(),
            unit,
        }
    }

    pub fn as_ev(self) -> f64 {
        self.to(EnergyUnit::Ev).value
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6} {}", self.value, self.unit)
    }
}
