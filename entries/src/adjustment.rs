//! Named energy adjustments
//!
//! An adjustment is an energy delta in eV with an uncertainty, a name, the
//! scheme that produced it (`cls`) and a description. Composition- and
//! temperature-based adjustments keep their per-unit values so they can be
//! explained later; their effective value is always recomputed.

use crate::uncertainty::Uncertainty;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdjustmentKind {
    Constant {
        value: f64,
        uncertainty: Uncertainty,
    },
    /// Scales with the number of atoms of some element.
    Composition {
        adj_per_atom: f64,
        uncertainty_per_atom: Uncertainty,
        n_atoms: f64,
    },
    /// Scales with temperature and the number of atoms.
    Temperature {
        adj_per_deg: f64,
        uncertainty_per_deg: Uncertainty,
        temp: f64,
        n_atoms: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyAdjustment {
    #[serde(flatten)]
    pub kind: AdjustmentKind,
    pub name: String,
    #[serde(default)]
    pub cls: String,
    #[serde(default)]
    pub description: String,
}

impl EnergyAdjustment {
    pub fn constant(value: f64, uncertainty: Uncertainty) -> Self {
        Self {
            kind: AdjustmentKind::Constant { value, uncertainty },
            name: "Constant energy adjustment".to_string(),
            cls: String::new(),
            description: "Constant energy adjustment".to_string(),
        }
    }

    pub fn composition(adj_per_atom: f64, n_atoms: f64, uncertainty_per_atom: Uncertainty) -> Self {
        Self {
            kind: AdjustmentKind::Composition {
                adj_per_atom,
                uncertainty_per_atom,
                n_atoms,
            },
            name: "Composition-based energy adjustment".to_string(),
            cls: String::new(),
            description: "Composition-based energy adjustment".to_string(),
        }
    }

    pub fn temperature(
        adj_per_deg: f64,
        temp: f64,
        n_atoms: f64,
        uncertainty_per_deg: Uncertainty,
    ) -> Self {
        Self {
            kind: AdjustmentKind::Temperature {
                adj_per_deg,
                uncertainty_per_deg,
                temp,
                n_atoms,
            },
            name: "Temperature-based energy adjustment".to_string(),
            cls: String::new(),
            description: "Temperature-based energy adjustment".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_cls(mut self, cls: impl Into<String>) -> Self {
        self.cls = cls.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Effective energy delta in eV.
    pub fn value(&self) -> f64 {
        match self.kind {
            AdjustmentKind::Constant { value, .. } => value,
            AdjustmentKind::Composition {
                adj_per_atom,
                n_atoms,
                ..
            } => adj_per_atom * n_atoms,
            AdjustmentKind::Temperature {
                adj_per_deg,
                temp,
                n_atoms,
                ..
            } => adj_per_deg * temp * n_atoms,
        }
    }

    pub fn uncertainty(&self) -> Uncertainty {
        match self.kind {
            AdjustmentKind::Constant { uncertainty, .. } => uncertainty,
            AdjustmentKind::Composition {
                uncertainty_per_atom,
                n_atoms,
                ..
            } => uncertainty_per_atom.scale(n_atoms),
            AdjustmentKind::Temperature {
                uncertainty_per_deg,
                temp,
                n_atoms,
                ..
            } => uncertainty_per_deg.scale(temp * n_atoms),
        }
    }

    /// Same name and provenance, regardless of value.
    pub fn same_name(&self, other: &EnergyAdjustment) -> bool {
        self.name == other.name && self.cls == other.cls
    }

    /// Identity used for de-duplication: name, provenance and value.
    /// Uncertainty is deliberately not compared.
    pub fn same_adjustment(&self, other: &EnergyAdjustment) -> bool {
        self.same_name(other) && self.value() == other.value()
    }

    /// Human-readable account of how the value was obtained.
    pub fn explain(&self) -> String {
        match self.kind {
            AdjustmentKind::Constant { value, .. } => {
                format!("{} ({:.3} eV)", self.description, value)
            }
            AdjustmentKind::Composition {
                adj_per_atom,
                n_atoms,
                ..
            } => format!(
                "{} ({:.3} eV/atom x {} atoms)",
                self.description, adj_per_atom, n_atoms
            ),
            AdjustmentKind::Temperature {
                adj_per_deg,
                temp,
                n_atoms,
                ..
            } => format!(
                "{} ({:.4} eV/K/atom x {} K x {} atoms)",
                self.description, adj_per_deg, temp, n_atoms
            ),
        }
    }
}

impl fmt::Display for EnergyAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.3} eV (uncertainty {})",
            self.name,
            self.value(),
            self.uncertainty()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_composition_adjustment_scales() {
        let adj = EnergyAdjustment::composition(-0.687, 3.0, Uncertainty::Known(0.002));
        assert_relative_eq!(adj.value(), -2.061, epsilon = 1e-12);
        assert_relative_eq!(adj.uncertainty().known().unwrap(), 0.006, epsilon = 1e-12);
    }

    #[test]
    fn test_temperature_adjustment_scales() {
        let adj = EnergyAdjustment::temperature(-0.316731 / 298.0, 298.0, 2.0, Uncertainty::Unknown);
        assert_relative_eq!(adj.value(), -0.633462, epsilon = 1e-9);
        assert!(adj.uncertainty().is_unknown());
    }

    #[test]
    fn test_unknown_uncertainty_survives_scaling() {
        let adj = EnergyAdjustment::composition(-1.0, 4.0, Uncertainty::Unknown);
        assert!(adj.uncertainty().is_unknown());
    }

    #[test]
    fn test_identity_ignores_uncertainty() {
        let a = EnergyAdjustment::constant(-0.5, Uncertainty::Known(0.1))
            .with_name("anion")
            .with_cls("scheme");
        let b = EnergyAdjustment::constant(-0.5, Uncertainty::Unknown)
            .with_name("anion")
            .with_cls("scheme");
        let c = EnergyAdjustment::constant(-0.6, Uncertainty::Known(0.1))
            .with_name("anion")
            .with_cls("scheme");
        assert!(a.same_adjustment(&b));
        assert!(a.same_name(&c));
        assert!(!a.same_adjustment(&c));
        assert!(!a.same_name(&c.clone().with_cls("other")));
    }

    #[test]
    fn test_serde_round_trip_keeps_kind() {
        let adj = EnergyAdjustment::composition(-0.687, 3.0, Uncertainty::Unknown)
            .with_name("MP2020 anion correction (oxide)");
        let json = serde_json::to_string(&adj).unwrap();
        assert!(json.contains("\"type\":\"composition\""));
        let back: EnergyAdjustment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, adj);
    }
}
