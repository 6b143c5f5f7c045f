//! Individual correction strategies
//!
//! Each strategy looks at one entry and either produces a correction with
//! its uncertainty, produces nothing, or declares the entry incompatible.
//! They are composed into a scheme by [`crate::CorrectionsList`].

use crate::classify::{known_oxide_type, AnionClassifier, NoStructureClassifier, OXIDE_BOND_CUTOFF};
use crate::compatibility::CompatType;
use crate::error::{CompatibilityError, ConfigError};
use crate::input_set::InputSet;
use crate::tables::{SchemeTables, Table};
use entries::{ComputedEntry, EnergyAdjustment, OxideType, SulfideType, UFloat, Uncertainty};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// Water formation free energy, eV per H2O.
pub const MU_H2O: f64 = -2.4583;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionOutcome {
    Applied(UFloat),
    NotApplicable,
}

impl CorrectionOutcome {
    /// Zero corrections with zero error count as not applicable.
    pub fn from_value(value: UFloat) -> Self {
        if value.is_zero() {
            CorrectionOutcome::NotApplicable
        } else {
            CorrectionOutcome::Applied(value)
        }
    }

    pub fn value(&self) -> UFloat {
        match self {
            CorrectionOutcome::Applied(value) => *value,
            CorrectionOutcome::NotApplicable => UFloat::ZERO,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, CorrectionOutcome::Applied(_))
    }
}

pub trait Correction: Send + Sync {
    /// Name used for the adjustment this strategy produces.
    fn name(&self) -> String;

    fn description(&self) -> &'static str;

    fn get_correction(&self, entry: &ComputedEntry) -> Result<CorrectionOutcome, CompatibilityError>;

    /// Fold this correction and everything already on the entry into one
    /// constant adjustment.
    fn correct_entry(&self, entry: &mut ComputedEntry) -> Result<(), CompatibilityError> {
        let new = self.get_correction(entry)?.value();
        let updated = new + entry.correction_ufloat();
        entry.energy_adjustments = vec![EnergyAdjustment::constant(
            updated.nominal,
            Uncertainty::of_correction(updated),
        )
        .with_name(self.name())];
        Ok(())
    }
}

/// Checks the POTCARs of an entry against an input set. Never corrects.
#[derive(Debug, Clone)]
pub struct PotcarCorrection {
    input_set: Arc<InputSet>,
    check_potcar: bool,
    check_hash: bool,
}

impl PotcarCorrection {
    pub fn new(
        input_set: Arc<InputSet>,
        check_potcar: bool,
        check_hash: bool,
    ) -> Result<Self, ConfigError> {
        if check_hash && !input_set.has_hashes() {
            return Err(ConfigError::HashesUnavailable(input_set.name.clone()));
        }
        Ok(Self {
            input_set,
            check_potcar,
            check_hash,
        })
    }

    pub fn input_set(&self) -> &InputSet {
        &self.input_set
    }

    pub fn check(&self, entry: &ComputedEntry) -> Result<(), CompatibilityError> {
        if !self.check_potcar {
            return Ok(());
        }

        let parameters = &entry.parameters;
        let found: BTreeSet<Option<String>> = if self.check_hash {
            match &parameters.potcar_spec {
                Some(spec) if !spec.is_empty() => spec.iter().map(|p| p.hash.clone()).collect(),
                _ => return Err(CompatibilityError::MissingPotcarData(entry.label())),
            }
        } else {
            parameters
                .potcar_short_symbols()
                .into_iter()
                .filter(|symbol| !symbol.is_empty())
                .map(Some)
                .collect()
        };

        let expected: BTreeSet<Option<String>> = entry
            .composition
            .elements()
            .map(|element| self.input_set.mandated(element, self.check_hash))
            .collect();

        if found != expected {
            return Err(CompatibilityError::PotcarMismatch { found, expected });
        }
        Ok(())
    }
}

impl Correction for PotcarCorrection {
    fn name(&self) -> String {
        format!("{} Potcar Correction", self.input_set.name)
    }

    fn description(&self) -> &'static str {
        "Checks that POTCARs are valid within a pre-defined input set. This ensures that \
         calculations performed using different input sets are not compared against each other."
    }

    fn get_correction(&self, entry: &ComputedEntry) -> Result<CorrectionOutcome, CompatibilityError> {
        self.check(entry)?;
        Ok(CorrectionOutcome::NotApplicable)
    }
}

/// Replaces the energy of gas-phase references with tabulated values.
#[derive(Debug, Clone)]
pub struct GasCorrection {
    name: String,
    energies: Table,
}

impl GasCorrection {
    pub fn new(tables: &SchemeTables) -> Result<Self, ConfigError> {
        if tables.corrections.gas.is_empty() {
            return Err(ConfigError::MissingKey {
                table: format!("{} corrections", tables.name),
                key: "gas".to_string(),
            });
        }
        Ok(Self {
            name: tables.name.clone(),
            energies: tables.corrections.gas.clone(),
        })
    }
}

impl Correction for GasCorrection {
    fn name(&self) -> String {
        format!("{} Gas Correction", self.name)
    }

    fn description(&self) -> &'static str {
        "Correct gas energies to obtain the right formation energies. Note that this depends \
         on calculations being run within the same input set."
    }

    fn get_correction(&self, entry: &ComputedEntry) -> Result<CorrectionOutcome, CompatibilityError> {
        let rform = entry.reduced_formula();
        Ok(match self.energies.get(&rform) {
            Some(energy) => CorrectionOutcome::from_value(UFloat::exact(
                energy * entry.num_atoms() - entry.uncorrected_energy,
            )),
            None => CorrectionOutcome::NotApplicable,
        })
    }
}

/// Oxide and sulfide corrections of the legacy schemes.
pub struct AnionCorrection {
    name: String,
    oxide: Table,
    sulfide: Table,
    correct_peroxide: bool,
    classifier: Arc<dyn AnionClassifier>,
}

impl AnionCorrection {
    pub fn new(tables: &SchemeTables, correct_peroxide: bool) -> Result<Self, ConfigError> {
        tables.require("oxide corrections", &tables.corrections.oxide, &["oxide"])?;
        Ok(Self {
            name: tables.name.clone(),
            oxide: tables.corrections.oxide.clone(),
            sulfide: tables.corrections.sulfide.clone(),
            correct_peroxide,
            classifier: Arc::new(NoStructureClassifier),
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn AnionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn sulfide_correction(&self, entry: &ComputedEntry) -> UFloat {
        let sulfide_type = entry
            .data
            .sulfide_type
            .or_else(|| {
                entry
                    .structure
                    .as_ref()
                    .and_then(|structure| self.classifier.sulfide_type(structure))
            })
            .unwrap_or(SulfideType::Sulfide);
        // polysulfides take the sulfide correction
        let key = match sulfide_type {
            SulfideType::Polysulfide => SulfideType::Sulfide,
            other => other,
        };
        match self.sulfide.get(key.as_str()) {
            Some(value) => UFloat::exact(value * entry.composition.get("S")),
            None => UFloat::ZERO,
        }
    }

    fn oxide_correction(&self, entry: &ComputedEntry) -> UFloat {
        let oxygen = entry.composition.get("O");
        let per_oxygen = |kind: OxideType| self.oxide.get(kind.as_str()).copied();
        let oxide = self.oxide.get("oxide").copied().unwrap_or(0.0);

        if !self.correct_peroxide {
            return UFloat::exact(oxide * oxygen);
        }

        if let Some(kind) = entry.data.oxide_type {
            let mut value = per_oxygen(kind).map(|v| v * oxygen).unwrap_or(0.0);
            if kind == OxideType::Hydroxide {
                value += oxide * oxygen;
            }
            return UFloat::exact(value);
        }

        if let Some(classification) = entry
            .structure
            .as_ref()
            .and_then(|structure| self.classifier.oxide_type(structure, OXIDE_BOND_CUTOFF))
        {
            let value = match per_oxygen(classification.kind) {
                Some(v) => v * classification.bonds,
                None if classification.kind == OxideType::Hydroxide => oxide * oxygen,
                None => 0.0,
            };
            return UFloat::exact(value);
        }

        warn!(
            "No structure or oxide_type parameter present for {}. Peroxide/superoxide \
             corrections rely only on detection of special formulas, e.g. Li2O2.",
            entry.label()
        );
        let kind = known_oxide_type(&entry.reduced_formula()).unwrap_or(OxideType::Oxide);
        UFloat::exact(per_oxygen(kind).unwrap_or(0.0) * oxygen)
    }
}

impl Correction for AnionCorrection {
    fn name(&self) -> String {
        format!("{} Anion Correction", self.name)
    }

    fn description(&self) -> &'static str {
        "Correct anion energies to obtain the right formation energies. Note that this depends \
         on calculations being run within the same input set."
    }

    fn get_correction(&self, entry: &ComputedEntry) -> Result<CorrectionOutcome, CompatibilityError> {
        let composition = &entry.composition;
        if composition.len() == 1 {
            return Ok(CorrectionOutcome::NotApplicable);
        }

        let mut correction = UFloat::ZERO;
        if composition.contains("S") {
            correction += self.sulfide_correction(entry);
        }
        if composition.contains("O") {
            correction += self.oxide_correction(entry);
        }
        Ok(CorrectionOutcome::from_value(correction))
    }
}

/// GGA/GGA+U mixing: validates the U values of an entry and corrects the
/// elements run with U.
#[derive(Debug, Clone)]
pub struct UCorrection {
    name: String,
    compat_type: CompatType,
    u_settings: BTreeMap<String, Table>,
    u_corrections: BTreeMap<String, Table>,
    u_errors: BTreeMap<String, Table>,
}

impl UCorrection {
    pub fn new(tables: &SchemeTables, input_set: &InputSet, compat_type: CompatType) -> Self {
        let (u_settings, u_corrections, u_errors) = match compat_type {
            CompatType::Advanced => (
                input_set.u_settings().clone(),
                tables.corrections.u_mixing.clone(),
                tables.uncertainties.u_mixing.clone(),
            ),
            CompatType::Gga => (BTreeMap::new(), BTreeMap::new(), BTreeMap::new()),
        };
        Self {
            name: tables.name.clone(),
            compat_type,
            u_settings,
            u_corrections,
            u_errors,
        }
    }
}

impl Correction for UCorrection {
    fn name(&self) -> String {
        format!("{} {} Correction", self.name, self.compat_type)
    }

    fn description(&self) -> &'static str {
        "Implements the GGA/GGA+U mixing scheme, which allows mixing of entries. Entries must \
         list every non-zero Hubbard U used in the calculation; a missing list means GGA."
    }

    fn get_correction(&self, entry: &ComputedEntry) -> Result<CorrectionOutcome, CompatibilityError> {
        let composition = &entry.composition;
        let Some(anion) = composition.most_electronegative() else {
            return Ok(CorrectionOutcome::NotApplicable);
        };
        let empty = Table::new();
        let settings = self.u_settings.get(anion).unwrap_or(&empty);
        let corrections = self.u_corrections.get(anion).unwrap_or(&empty);
        let errors = self.u_errors.get(anion).unwrap_or(&empty);

        let mut correction = UFloat::ZERO;
        for (element, amount) in composition.iter() {
            let expected = settings.get(element).copied().unwrap_or(0.0);
            let actual = entry.parameters.hubbard(element);
            if actual != expected {
                return Err(CompatibilityError::InvalidHubbardU {
                    element: element.to_string(),
                    actual,
                    expected,
                });
            }
            if let Some(value) = corrections.get(element) {
                let error = errors.get(element).copied().unwrap_or(0.0);
                correction += UFloat::new(*value, error) * amount;
            }
        }
        Ok(CorrectionOutcome::from_value(correction))
    }
}

/// Aqueous-phase corrections of the legacy MIT scheme.
#[derive(Debug, Clone)]
pub struct AqueousCorrection {
    name: String,
    energies: Table,
    errors: Table,
    composition: Table,
    oxide: Table,
}

impl AqueousCorrection {
    pub fn new(tables: &SchemeTables) -> Result<Self, ConfigError> {
        tables.require("aqueous corrections", &tables.corrections.aqueous, &["H2", "H2O"])?;
        Ok(Self {
            name: tables.name.clone(),
            energies: tables.corrections.aqueous.clone(),
            errors: tables.uncertainties.aqueous.clone(),
            composition: tables.corrections.composition.clone(),
            oxide: tables.corrections.oxide.clone(),
        })
    }

    fn lookup(table: &Table, key: &str) -> f64 {
        table.get(key).copied().unwrap_or(0.0)
    }
}

impl Correction for AqueousCorrection {
    fn name(&self) -> String {
        format!("{} Aqueous Correction", self.name)
    }

    fn description(&self) -> &'static str {
        "Implements aqueous phase compound corrections for elements and H2O."
    }

    fn get_correction(&self, entry: &ComputedEntry) -> Result<CorrectionOutcome, CompatibilityError> {
        let composition = &entry.composition;
        let rform = entry.reduced_formula();
        let num_atoms = entry.num_atoms();
        let mut correction = UFloat::ZERO;

        if let Some(energy) = self.energies.get(&rform) {
            let error = Self::lookup(&self.errors, &rform) * num_atoms;
            let value = if rform == "H2" || rform == "H2O" {
                energy * num_atoms - entry.uncorrected_energy - entry.correction()
            } else {
                energy * num_atoms
            };
            correction += UFloat::new(value, error);
        }

        if rform != "H2O" {
            let hydrogen = composition.get("H");
            let oxygen = composition.get("O");
            let waters = (hydrogen / 2.0).min(oxygen).floor();
            if waters > 0.0 {
                // take back the H and O corrections already given to the water
                correction -= UFloat::exact(
                    (hydrogen - waters / 2.0) * Self::lookup(&self.composition, "H"),
                );
                correction -= UFloat::exact(
                    (oxygen - waters)
                        * (Self::lookup(&self.composition, "oxide")
                            + Self::lookup(&self.oxide, "oxide")),
                );
                correction += UFloat::exact(-MU_H2O * waters);
            }
        }

        Ok(CorrectionOutcome::from_value(correction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::OxideClassification;
    use crate::input_set::{InputSetLibrary, PotcarSetting, MP_RELAX_SET};
    use crate::tables::CompatibilityConfig;
    use approx::assert_relative_eq;
    use entries::{CalcParameters, EntryData, PotcarSpec, Structure};

    fn mp_tables() -> SchemeTables {
        CompatibilityConfig::bundled().unwrap().scheme("MP").unwrap().clone()
    }

    fn mit_tables() -> SchemeTables {
        CompatibilityConfig::bundled().unwrap().scheme("MIT").unwrap().clone()
    }

    fn entry(formula: &str, energy: f64) -> ComputedEntry {
        ComputedEntry::new(formula.parse().unwrap(), energy)
    }

    #[test]
    fn test_gas_correction_replaces_energy() {
        let gas = GasCorrection::new(&mp_tables()).unwrap();
        let o2 = entry("O2", -9.0);
        let value = gas.get_correction(&o2).unwrap().value();
        assert_relative_eq!(value.nominal + o2.uncorrected_energy, -4.94795 * 2.0, epsilon = 1e-12);
        assert!(!gas.get_correction(&entry("Fe2O3", -38.0)).unwrap().is_applied());
        assert_eq!(gas.name(), "MP Gas Correction");
    }

    #[test]
    fn test_gas_table_is_required() {
        let tables = CompatibilityConfig::bundled().unwrap().scheme("MP2020").unwrap().clone();
        assert!(matches!(GasCorrection::new(&tables), Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_anion_correction_by_formula() {
        let anion = AnionCorrection::new(&mp_tables(), true).unwrap();
        let li2o2 = anion.get_correction(&entry("Li2O2", -10.0)).unwrap().value();
        assert_relative_eq!(li2o2.nominal, -0.465 * 2.0, epsilon = 1e-12);

        let fe2o3 = anion.get_correction(&entry("Fe2O3", -38.0)).unwrap().value();
        assert_relative_eq!(fe2o3.nominal, -0.702 * 3.0, epsilon = 1e-12);

        let elemental = anion.get_correction(&entry("O2", -9.0)).unwrap();
        assert_eq!(elemental, CorrectionOutcome::NotApplicable);

        let no_peroxide = AnionCorrection::new(&mp_tables(), false).unwrap();
        let value = no_peroxide.get_correction(&entry("Li2O2", -10.0)).unwrap().value();
        assert_relative_eq!(value.nominal, -0.702 * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_anion_correction_uses_tags() {
        let anion = AnionCorrection::new(&mp_tables(), true).unwrap();
        let tagged = |oxide_type, sulfide_type| {
            entry("Fe2SO4", -50.0).with_data(EntryData {
                oxide_type,
                sulfide_type,
                ..Default::default()
            })
        };

        let hydroxide = anion
            .get_correction(&tagged(Some(OxideType::Hydroxide), Some(SulfideType::Sulfate)))
            .unwrap()
            .value();
        assert_relative_eq!(hydroxide.nominal, -0.702 * 4.0, epsilon = 1e-12);

        let poly = anion
            .get_correction(&tagged(Some(OxideType::Ozonide), Some(SulfideType::Polysulfide)))
            .unwrap()
            .value();
        let plain = anion
            .get_correction(&tagged(Some(OxideType::Ozonide), Some(SulfideType::Sulfide)))
            .unwrap()
            .value();
        assert_relative_eq!(poly.nominal, -0.653, epsilon = 1e-12);
        assert_relative_eq!(poly.nominal, plain.nominal, epsilon = 1e-12);
    }

    struct BondCounter;

    impl AnionClassifier for BondCounter {
        fn oxide_type(&self, _structure: &Structure, _cutoff: f64) -> Option<OxideClassification> {
            Some(OxideClassification {
                kind: OxideType::Superoxide,
                bonds: 1.0,
            })
        }

        fn sulfide_type(&self, _structure: &Structure) -> Option<SulfideType> {
            None
        }
    }

    #[test]
    fn test_anion_correction_uses_classifier() {
        let anion = AnionCorrection::new(&mp_tables(), true)
            .unwrap()
            .with_classifier(Arc::new(BondCounter));
        let structure = Structure::orthorhombic(4.0, 4.0, 4.0, Vec::new());
        let ko2 = entry("KO2", -12.0).with_structure(structure);
        let value = anion.get_correction(&ko2).unwrap().value();
        assert_relative_eq!(value.nominal, -0.161, epsilon = 1e-12);
    }

    fn fe2o3_with_u(u: f64) -> ComputedEntry {
        entry("Fe2O3", -38.0).with_parameters(CalcParameters {
            run_type: Some("GGA+U".into()),
            hubbards: Some([("Fe".to_string(), u)].into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_u_correction() {
        let library = InputSetLibrary::bundled().unwrap();
        let mp = library.get(MP_RELAX_SET).unwrap();
        let correction = UCorrection::new(&mp_tables(), &mp, CompatType::Advanced);
        assert_eq!(correction.name(), "MP Advanced Correction");

        let value = correction.get_correction(&fe2o3_with_u(5.3)).unwrap().value();
        assert_relative_eq!(value.nominal, -2.733 * 2.0, epsilon = 1e-12);

        let err = correction.get_correction(&fe2o3_with_u(0.0)).unwrap_err();
        assert!(matches!(err, CompatibilityError::InvalidHubbardU { ref element, .. } if element == "Fe"));

        let gga = UCorrection::new(&mp_tables(), &mp, CompatType::Gga);
        assert!(gga.get_correction(&fe2o3_with_u(5.3)).is_err());
        assert!(!gga.get_correction(&fe2o3_with_u(0.0)).unwrap().is_applied());
    }

    #[test]
    fn test_potcar_symbols() {
        let library = InputSetLibrary::bundled().unwrap();
        let potcar = PotcarCorrection::new(library.get(MP_RELAX_SET).unwrap(), true, false).unwrap();
        let with_symbols = |symbols: &[&str]| {
            entry("Fe2O3", -38.0).with_parameters(CalcParameters {
                potcar_symbols: symbols.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            })
        };
        assert!(potcar.check(&with_symbols(&["PAW_PBE Fe_pv 06Sep2000", "PAW_PBE O 08Apr2002"])).is_ok());
        assert!(matches!(
            potcar.check(&with_symbols(&["PAW_PBE Fe 06Sep2000", "PAW_PBE O 08Apr2002"])),
            Err(CompatibilityError::PotcarMismatch { .. })
        ));

        let disabled = PotcarCorrection::new(library.get(MP_RELAX_SET).unwrap(), false, false).unwrap();
        assert!(disabled.check(&with_symbols(&[])).is_ok());
    }

    #[test]
    fn test_potcar_hashes() {
        let library = InputSetLibrary::bundled().unwrap();
        assert!(matches!(
            PotcarCorrection::new(library.get(MP_RELAX_SET).unwrap(), true, true),
            Err(ConfigError::HashesUnavailable(_))
        ));

        let hashed = InputSet::new("Hashed")
            .with_potcar("Fe", PotcarSetting::Detailed { symbol: "Fe_pv".into(), hash: Some("aa".into()) })
            .with_potcar("O", PotcarSetting::Detailed { symbol: "O".into(), hash: Some("bb".into()) });
        let potcar = PotcarCorrection::new(Arc::new(hashed), true, true).unwrap();

        let bare = entry("Fe2O3", -38.0);
        assert!(matches!(potcar.check(&bare), Err(CompatibilityError::MissingPotcarData(_))));

        let spec = |hashes: [&str; 2]| {
            entry("Fe2O3", -38.0).with_parameters(CalcParameters {
                potcar_spec: Some(vec![
                    PotcarSpec::new("PAW_PBE Fe_pv 06Sep2000", Some(hashes[0].into())),
                    PotcarSpec::new("PAW_PBE O 08Apr2002", Some(hashes[1].into())),
                ]),
                ..Default::default()
            })
        };
        assert!(potcar.check(&spec(["aa", "bb"])).is_ok());
        assert!(potcar.check(&spec(["aa", "cc"])).is_err());
    }

    #[test]
    fn test_aqueous_correction() {
        let aqueous = AqueousCorrection::new(&mit_tables()).unwrap();

        let h2o = entry("H2O", -14.0);
        let value = aqueous.get_correction(&h2o).unwrap().value();
        assert_relative_eq!(value.nominal + h2o.uncorrected_energy, -4.972 * 3.0, epsilon = 1e-12);

        // FeO.2H2O: two waters; MIT has no composition table, only the oxide one
        let hydrate = entry("FeH4O3", -40.0);
        let value = aqueous.get_correction(&hydrate).unwrap().value();
        let expected = -(3.0 - 2.0) * -0.708 + 2.0 * 2.4583;
        assert_relative_eq!(value.nominal, expected, epsilon = 1e-12);

        let tables = CompatibilityConfig::bundled().unwrap().scheme("MP").unwrap().clone();
        assert!(matches!(AqueousCorrection::new(&tables), Err(ConfigError::MissingKey { .. })));
    }

    #[test]
    fn test_correct_entry_folds_into_one_adjustment() {
        let gas = GasCorrection::new(&mp_tables()).unwrap();
        let mut o2 = entry("O2", -9.0).with_adjustments(vec![EnergyAdjustment::constant(
            -0.5,
            Uncertainty::Known(0.0),
        )]);
        gas.correct_entry(&mut o2).unwrap();
        assert_eq!(o2.energy_adjustments.len(), 1);
        assert_relative_eq!(o2.energy(), -4.94795 * 2.0 - 0.5, epsilon = 1e-12);
        assert!(o2.correction_uncertainty().is_unknown());
    }
}
