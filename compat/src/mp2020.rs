//! The Materials Project 2020 scheme
//!
//! Unlike the legacy schemes this one does all its work in a single pass and
//! returns one composition-scaled adjustment per corrected element, each
//! carrying a fitted uncertainty.

use crate::classify::{
    known_oxide_type, AnionClassifier, NoOxidationStates, NoStructureClassifier,
    OxidationStateGuesser, OxidationStates, OXIDE_BOND_CUTOFF,
};
use crate::compatibility::{CompatType, Compatibility, SchemeOptions};
use crate::correction::PotcarCorrection;
use crate::error::{CompatibilityError, ConfigError};
use crate::input_set::{InputSet, InputSetLibrary, MP_RELAX_SET};
use crate::tables::{CompatibilityConfig, SchemeTables, Table};
use entries::{ComputedEntry, EnergyAdjustment, OxideType, SulfideType, Uncertainty};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub const MP2020_NAME: &str = "MaterialsProject2020Compatibility";

/// Anions corrected by composition, in the order they are checked.
pub const ANION_ORDER: [&str; 10] = ["Br", "I", "Se", "Si", "Sb", "Te", "H", "N", "F", "Cl"];

/// Oxidation states are not guessed for reduced formulas larger than this.
pub const MAX_GUESS_ATOMS: f64 = 20.0;

const RUN_TYPES: [&str; 2] = ["GGA", "GGA+U"];

pub struct Mp2020Compatibility {
    label: String,
    correct_peroxide: bool,
    potcar: PotcarCorrection,
    composition: Table,
    composition_errors: Table,
    u_settings: BTreeMap<String, Table>,
    u_corrections: BTreeMap<String, Table>,
    u_errors: BTreeMap<String, Table>,
    classifier: Arc<dyn AnionClassifier>,
    oxidation_states: Arc<dyn OxidationStateGuesser>,
}

impl Mp2020Compatibility {
    pub fn new(options: &SchemeOptions) -> Result<Self, ConfigError> {
        let config = CompatibilityConfig::load(options.config_file.as_deref())?;
        let input_set = InputSetLibrary::load(options.input_set_file.as_deref())?.get(MP_RELAX_SET)?;
        Self::from_tables(config.scheme("MP2020")?, input_set, options)
    }

    pub fn from_tables(
        tables: &SchemeTables,
        input_set: Arc<InputSet>,
        options: &SchemeOptions,
    ) -> Result<Self, ConfigError> {
        tables.require(
            "composition corrections",
            &tables.corrections.composition,
            &["oxide", "peroxide", "superoxide", "ozonide"],
        )?;

        let (u_settings, u_corrections, u_errors) = match options.compat_type {
            CompatType::Advanced => (
                input_set.u_settings().clone(),
                tables.corrections.u_mixing.clone(),
                tables.uncertainties.u_mixing.clone(),
            ),
            CompatType::Gga => (BTreeMap::new(), BTreeMap::new(), BTreeMap::new()),
        };

        Ok(Self {
            label: tables.name.clone(),
            correct_peroxide: options.correct_peroxide,
            potcar: PotcarCorrection::new(
                input_set,
                options.check_potcar,
                options.check_potcar_hash,
            )?,
            composition: tables.corrections.composition.clone(),
            composition_errors: tables.uncertainties.composition.clone(),
            u_settings,
            u_corrections,
            u_errors,
            classifier: Arc::new(NoStructureClassifier),
            oxidation_states: Arc::new(NoOxidationStates),
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn AnionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_oxidation_states(mut self, guesser: Arc<dyn OxidationStateGuesser>) -> Self {
        self.oxidation_states = guesser;
        self
    }

    fn anion_adjustment(
        &self,
        key: &str,
        n_atoms: f64,
    ) -> Result<EnergyAdjustment, CompatibilityError> {
        let value = self.composition.get(key).copied().ok_or_else(|| {
            CompatibilityError::MissingCompoundEnergy {
                compound: key.to_string(),
                table: format!("{} composition", self.label),
            }
        })?;
        let error = self.composition_errors.get(key).copied().unwrap_or(0.0);
        Ok(
            EnergyAdjustment::composition(value, n_atoms, Uncertainty::Known(error))
                .with_name(format!("{} anion correction ({})", self.label, key))
                .with_cls(MP2020_NAME),
        )
    }

    fn sulfide_type(&self, entry: &ComputedEntry) -> SulfideType {
        entry
            .data
            .sulfide_type
            .or_else(|| {
                entry
                    .structure
                    .as_ref()
                    .and_then(|structure| self.classifier.sulfide_type(structure))
            })
            .unwrap_or(SulfideType::Sulfide)
    }

    fn oxide_type(&self, entry: &ComputedEntry) -> OxideType {
        if !self.correct_peroxide {
            return OxideType::Oxide;
        }
        if let Some(kind) = entry.data.oxide_type {
            return kind;
        }
        if let Some(classification) = entry
            .structure
            .as_ref()
            .and_then(|structure| self.classifier.oxide_type(structure, OXIDE_BOND_CUTOFF))
        {
            return classification.kind;
        }
        warn!(
            "No structure or oxide_type parameter present for {}. Peroxide/superoxide \
             corrections rely only on detection of special formulas, e.g. Li2O2.",
            entry.label()
        );
        known_oxide_type(&entry.reduced_formula()).unwrap_or(OxideType::Oxide)
    }

    /// Cached oxidation states of the entry, guessed on first use.
    fn oxidation_states<'a>(&self, entry: &'a mut ComputedEntry) -> &'a OxidationStates {
        if entry.data.oxidation_states.is_none() {
            let (reduced, _) = entry.composition.reduced_composition_and_factor();
            let guess = if reduced.num_atoms() > MAX_GUESS_ATOMS {
                None
            } else {
                self.oxidation_states.guess(&entry.composition)
            };
            entry.data.oxidation_states = Some(guess.unwrap_or_default());
        }
        entry.data.oxidation_states.get_or_insert_with(BTreeMap::new)
    }
}

impl Compatibility for Mp2020Compatibility {
    fn name(&self) -> &str {
        MP2020_NAME
    }

    fn get_adjustments(
        &self,
        entry: &mut ComputedEntry,
    ) -> Result<Vec<EnergyAdjustment>, CompatibilityError> {
        let run_type = entry.parameters.run_type.as_deref();
        if !run_type.is_some_and(|run_type| RUN_TYPES.contains(&run_type)) {
            return Err(CompatibilityError::InvalidRunType {
                entry: entry.label(),
                run_type: run_type.map(str::to_string),
                allowed: RUN_TYPES.iter().map(|s| s.to_string()).collect(),
            });
        }

        if entry.parameters.software.as_deref().unwrap_or("vasp") == "vasp" {
            self.potcar.check(entry)?;
        }

        let mut adjustments = Vec::new();
        if entry.composition.len() == 1 {
            return Ok(adjustments);
        }

        if entry.composition.contains("S") {
            let sulfide_type = match self.sulfide_type(entry) {
                SulfideType::Polysulfide => SulfideType::Sulfide,
                other => other,
            };
            if sulfide_type == SulfideType::Sulfide {
                adjustments.push(self.anion_adjustment("S", entry.composition.get("S"))?);
            }
        }

        if entry.composition.contains("O") {
            let oxide_type = match self.oxide_type(entry) {
                OxideType::Hydroxide => OxideType::Oxide,
                other => other,
            };
            adjustments.push(self.anion_adjustment(oxide_type.as_str(), entry.composition.get("O"))?);
        }

        let oxidation_states = self.oxidation_states(entry).clone();
        if oxidation_states.is_empty() {
            warn!(
                "Failed to guess oxidation states for entry {}. Assigning anion correction to \
                 only the most electronegative atom.",
                entry.label()
            );
        }

        let composition = &entry.composition;
        let most_electronegative = composition.most_electronegative().unwrap_or_default();
        for anion in ANION_ORDER {
            if !composition.contains(anion) || !self.composition.contains_key(anion) {
                continue;
            }
            let is_anion = oxidation_states.get(anion).copied().unwrap_or(0.0) < 0.0
                || anion == most_electronegative;
            if is_anion {
                adjustments.push(self.anion_adjustment(anion, composition.get(anion))?);
            }
        }

        let empty = Table::new();
        let u_settings = self.u_settings.get(most_electronegative).unwrap_or(&empty);
        let u_corrections = self.u_corrections.get(most_electronegative).unwrap_or(&empty);
        let u_errors = self.u_errors.get(most_electronegative).unwrap_or(&empty);

        for (element, amount) in composition.iter() {
            let expected = u_settings.get(element).copied().unwrap_or(0.0);
            let actual = entry.parameters.hubbard(element);
            if actual != expected {
                return Err(CompatibilityError::InvalidHubbardU {
                    element: element.to_string(),
                    actual,
                    expected,
                });
            }
            if let Some(value) = u_corrections.get(element) {
                let error = u_errors.get(element).copied().unwrap_or(0.0);
                adjustments.push(
                    EnergyAdjustment::composition(*value, amount, Uncertainty::Known(error))
                        .with_name(format!(
                            "{} GGA/GGA+U mixing correction ({})",
                            self.label, element
                        ))
                        .with_cls(MP2020_NAME),
                );
            }
        }

        Ok(adjustments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::ProcessOptions;
    use approx::assert_relative_eq;
    use entries::{CalcParameters, Composition, EntryData};

    fn scheme() -> Mp2020Compatibility {
        Mp2020Compatibility::new(&SchemeOptions {
            check_potcar: false,
            ..Default::default()
        })
        .unwrap()
    }

    fn entry(formula: &str, energy: f64) -> ComputedEntry {
        ComputedEntry::new(formula.parse().unwrap(), energy).with_parameters(CalcParameters {
            run_type: Some("GGA".into()),
            ..Default::default()
        })
    }

    fn names(adjustments: &[EnergyAdjustment]) -> Vec<&str> {
        adjustments.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn test_fe2o3_with_matching_u() {
        let mut fe2o3 = entry("Fe2O3", -38.0);
        fe2o3.parameters.run_type = Some("GGA+U".into());
        fe2o3.parameters.hubbards = Some([("Fe".to_string(), 5.3), ("O".to_string(), 0.0)].into());

        let adjustments = scheme().get_adjustments(&mut fe2o3).unwrap();
        assert_eq!(
            names(&adjustments),
            vec![
                "MP2020 anion correction (oxide)",
                "MP2020 GGA/GGA+U mixing correction (Fe)"
            ]
        );
        assert_relative_eq!(adjustments[0].value(), -0.687 * 3.0, epsilon = 1e-12);
        assert_relative_eq!(adjustments[1].value(), -2.256 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(
            adjustments[1].uncertainty().known().unwrap(),
            0.0101 * 2.0,
            epsilon = 1e-12
        );
        assert!(adjustments.iter().all(|a| a.cls == MP2020_NAME));
        assert_eq!(fe2o3.data.oxidation_states, Some(BTreeMap::new()));
    }

    #[test]
    fn test_wrong_u_and_run_type_are_rejected() {
        let mut fe2o3 = entry("Fe2O3", -38.0);
        assert!(matches!(
            scheme().get_adjustments(&mut fe2o3),
            Err(CompatibilityError::InvalidHubbardU { .. })
        ));

        let mut pbe = entry("NaCl", -7.0);
        pbe.parameters.run_type = Some("PBE".into());
        assert!(matches!(
            scheme().get_adjustments(&mut pbe),
            Err(CompatibilityError::InvalidRunType { .. })
        ));

        let gga_only = Mp2020Compatibility::new(&SchemeOptions {
            check_potcar: false,
            compat_type: CompatType::Gga,
            ..Default::default()
        })
        .unwrap();
        let mut plain = entry("Fe2O3", -38.0);
        let adjustments = gga_only.get_adjustments(&mut plain).unwrap();
        assert_eq!(names(&adjustments), vec!["MP2020 anion correction (oxide)"]);
    }

    #[test]
    fn test_single_element_is_not_corrected() {
        let mut o2 = entry("O2", -9.8);
        assert!(scheme().get_adjustments(&mut o2).unwrap().is_empty());
    }

    #[test]
    fn test_sulfide_types() {
        let tagged = |sulfide_type| {
            entry("Na2S2", -10.0).with_data(EntryData {
                sulfide_type: Some(sulfide_type),
                ..Default::default()
            })
        };
        let mut poly = tagged(SulfideType::Polysulfide);
        let mut plain = tagged(SulfideType::Sulfide);
        let poly = scheme().get_adjustments(&mut poly).unwrap();
        let plain = scheme().get_adjustments(&mut plain).unwrap();
        assert_eq!(poly[0].name, "MP2020 anion correction (S)");
        assert_relative_eq!(poly[0].value(), plain[0].value(), epsilon = 1e-12);
        assert_relative_eq!(poly[0].value(), -0.503 * 2.0, epsilon = 1e-12);

        let mut sulfate = tagged(SulfideType::Sulfate);
        sulfate.composition = "Na2SO4".parse().unwrap();
        let adjustments = scheme().get_adjustments(&mut sulfate).unwrap();
        assert_eq!(names(&adjustments), vec!["MP2020 anion correction (oxide)"]);
    }

    #[test]
    fn test_peroxide_detection() {
        let mut li2o2 = entry("Li2O2", -14.0);
        let adjustments = scheme().get_adjustments(&mut li2o2).unwrap();
        assert_eq!(adjustments[0].name, "MP2020 anion correction (peroxide)");
        assert_relative_eq!(adjustments[0].value(), -0.465 * 2.0, epsilon = 1e-12);

        let no_peroxide = Mp2020Compatibility::new(&SchemeOptions {
            check_potcar: false,
            correct_peroxide: false,
            ..Default::default()
        })
        .unwrap();
        let mut li2o2 = entry("Li2O2", -14.0);
        let adjustments = no_peroxide.get_adjustments(&mut li2o2).unwrap();
        assert_eq!(adjustments[0].name, "MP2020 anion correction (oxide)");

        let mut hydroxide = entry("LiOH", -10.0).with_data(EntryData {
            oxide_type: Some(OxideType::Hydroxide),
            ..Default::default()
        });
        let adjustments = scheme().get_adjustments(&mut hydroxide).unwrap();
        assert_eq!(adjustments[0].name, "MP2020 anion correction (oxide)");
    }

    #[test]
    fn test_anion_needs_negative_state_or_highest_electronegativity() {
        let mut without_guess = entry("Li4NCl", -20.0);
        let adjustments = scheme().get_adjustments(&mut without_guess).unwrap();
        assert_eq!(names(&adjustments), vec!["MP2020 anion correction (Cl)"]);

        let guesser = |_: &Composition| {
            Some(OxidationStates::from([
                ("Li".to_string(), 1.0),
                ("N".to_string(), -3.0),
                ("Cl".to_string(), -1.0),
            ]))
        };
        let guessing = scheme().with_oxidation_states(Arc::new(guesser));
        let mut with_guess = entry("Li4NCl", -20.0);
        let adjustments = guessing.get_adjustments(&mut with_guess).unwrap();
        assert_eq!(
            names(&adjustments),
            vec!["MP2020 anion correction (N)", "MP2020 anion correction (Cl)"]
        );
        assert_eq!(with_guess.data.oxidation_states.as_ref().unwrap()["N"], -3.0);
    }

    #[test]
    fn test_cached_oxidation_states_are_reused() {
        let never = |_: &Composition| -> Option<OxidationStates> { panic!("guessed twice") };
        let scheme = scheme().with_oxidation_states(Arc::new(never));
        let mut cached = entry("Li4NCl", -20.0).with_data(EntryData {
            oxidation_states: Some(OxidationStates::from([("N".to_string(), -3.0)])),
            ..Default::default()
        });
        let adjustments = scheme.get_adjustments(&mut cached).unwrap();
        assert_eq!(adjustments.len(), 2);
    }

    #[test]
    fn test_large_compositions_skip_guessing() {
        let never = |_: &Composition| -> Option<OxidationStates> { panic!("should not guess") };
        let scheme = scheme().with_oxidation_states(Arc::new(never));
        let mut large = entry("Li11N3Cl7", -80.0);
        scheme.get_adjustments(&mut large).unwrap();
        assert_eq!(large.data.oxidation_states, Some(BTreeMap::new()));
    }

    #[test]
    fn test_potcar_check_only_for_vasp() {
        let checked = Mp2020Compatibility::new(&SchemeOptions::default()).unwrap();
        let mut bare = entry("NaCl", -7.0);
        assert!(matches!(
            checked.get_adjustments(&mut bare),
            Err(CompatibilityError::PotcarMismatch { .. })
        ));

        bare.parameters.software = Some("cp2k".into());
        assert!(checked.get_adjustments(&mut bare).is_ok());
    }

    #[test]
    fn test_process_is_idempotent() {
        let scheme = scheme();
        let mut batch = vec![entry("NaCl", -7.0)];
        let first = scheme.process_entries(&mut batch, &ProcessOptions::default()).unwrap();
        let second = scheme
            .process_entries(&mut batch, &ProcessOptions::default().with_clean(false))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second[0].energy_adjustments.len(), 1);
        assert_relative_eq!(second[0].energy(), -7.0 - 0.614, epsilon = 1e-12);
    }
}
