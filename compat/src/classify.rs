//! Anion classification and oxidation-state seams
//!
//! Deciding whether oxygen is an oxide or a peroxide, or guessing oxidation
//! states, is done by external analysis code. The schemes only need the
//! answers, so both are traits; the defaults here know nothing and make the
//! schemes fall back to formula heuristics.

use entries::{Composition, OxideType, Structure, SulfideType};
use std::collections::BTreeMap;
use std::fmt;

pub const COMMON_PEROXIDES: [&str; 10] = [
    "Li2O2", "Na2O2", "K2O2", "Cs2O2", "Rb2O2", "BeO2", "MgO2", "CaO2", "SrO2", "BaO2",
];
pub const COMMON_SUPEROXIDES: [&str; 5] = ["LiO2", "NaO2", "KO2", "RbO2", "CsO2"];
pub const OZONIDES: [&str; 4] = ["LiO3", "NaO3", "KO3", "NaO5"];

/// Relative bond-length cutoff passed to structural oxide classifiers.
pub const OXIDE_BOND_CUTOFF: f64 = 1.05;

/// Oxide type of a known peroxide, superoxide or ozonide formula.
pub fn known_oxide_type(reduced_formula: &str) -> Option<OxideType> {
    if COMMON_PEROXIDES.contains(&reduced_formula) {
        Some(OxideType::Peroxide)
    } else if COMMON_SUPEROXIDES.contains(&reduced_formula) {
        Some(OxideType::Superoxide)
    } else if OZONIDES.contains(&reduced_formula) {
        Some(OxideType::Ozonide)
    } else {
        None
    }
}

/// Oxide type of a structure and the number of oxygen atoms involved in
/// the characteristic bonds (all oxygens for a plain oxide).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OxideClassification {
    pub kind: OxideType,
    pub bonds: f64,
}

pub trait AnionClassifier: Send + Sync {
    /// `None` when the structure cannot be classified.
    fn oxide_type(&self, structure: &Structure, relative_cutoff: f64) -> Option<OxideClassification>;

    fn sulfide_type(&self, structure: &Structure) -> Option<SulfideType>;
}

/// Classifier that never has an answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStructureClassifier;

impl AnionClassifier for NoStructureClassifier {
    fn oxide_type(&self, _structure: &Structure, _relative_cutoff: f64) -> Option<OxideClassification> {
        None
    }

    fn sulfide_type(&self, _structure: &Structure) -> Option<SulfideType> {
        None
    }
}

impl fmt::Debug for dyn AnionClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AnionClassifier")
    }
}

pub type OxidationStates = BTreeMap<String, f64>;

pub trait OxidationStateGuesser: Send + Sync {
    /// Most likely oxidation state per element, or `None` if no charge
    /// balanced assignment exists.
    fn guess(&self, composition: &Composition) -> Option<OxidationStates>;
}

impl<F> OxidationStateGuesser for F
where
    F: Fn(&Composition) -> Option<OxidationStates> + Send + Sync,
{
    fn guess(&self, composition: &Composition) -> Option<OxidationStates> {
        self(composition)
    }
}

/// Guesser that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOxidationStates;

impl OxidationStateGuesser for NoOxidationStates {
    fn guess(&self, _composition: &Composition) -> Option<OxidationStates> {
        None
    }
}

impl fmt::Debug for dyn OxidationStateGuesser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OxidationStateGuesser")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_formulas() {
        assert_eq!(known_oxide_type("Li2O2"), Some(OxideType::Peroxide));
        assert_eq!(known_oxide_type("KO2"), Some(OxideType::Superoxide));
        assert_eq!(known_oxide_type("NaO5"), Some(OxideType::Ozonide));
        assert_eq!(known_oxide_type("Fe2O3"), None);
    }

    #[test]
    fn test_closure_guesser() {
        let guesser = |composition: &Composition| {
            composition
                .contains("O")
                .then(|| OxidationStates::from([("O".to_string(), -2.0)]))
        };
        let fe2o3: Composition = "Fe2O3".parse().unwrap();
        assert_eq!(guesser.guess(&fe2o3).unwrap()["O"], -2.0);
        assert!(NoOxidationStates.guess(&fe2o3).is_none());
    }
}
