//! Schemes built from an ordered list of correction strategies
//!
//! This is how the legacy Materials Project and MIT schemes are defined.
//! Each strategy contributes at most one constant adjustment named after
//! the strategy.

use crate::compatibility::{Compatibility, ProcessOptions, SchemeOptions};
use crate::correction::{
    AnionCorrection, AqueousCorrection, Correction, CorrectionOutcome, GasCorrection,
    PotcarCorrection, UCorrection,
};
use crate::error::{CompatibilityError, ConfigError};
use crate::input_set::{InputSetLibrary, MIT_RELAX_SET, MP_RELAX_SET};
use crate::tables::CompatibilityConfig;
use entries::{ComputedEntry, EnergyAdjustment, UFloat, Uncertainty};
use serde::Serialize;
use std::fmt;

pub const DEFAULT_RUN_TYPES: [&str; 4] = ["GGA", "GGA+U", "PBE", "PBE+U"];

pub struct CorrectionsList {
    name: String,
    corrections: Vec<Box<dyn Correction>>,
    run_types: Vec<String>,
}

impl CorrectionsList {
    pub fn new(name: impl Into<String>, corrections: Vec<Box<dyn Correction>>) -> Self {
        Self {
            name: name.into(),
            corrections,
            run_types: DEFAULT_RUN_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_run_types<I, S>(mut self, run_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_types = run_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn corrections(&self) -> &[Box<dyn Correction>] {
        &self.corrections
    }

    /// Legacy Materials Project scheme, MPRelaxSet settings.
    pub fn materials_project(options: &SchemeOptions) -> Result<Self, ConfigError> {
        Self::legacy("MaterialsProjectCompatibility", "MP", MP_RELAX_SET, options, false)
    }

    /// MIT scheme, MITRelaxSet settings.
    pub fn mit(options: &SchemeOptions) -> Result<Self, ConfigError> {
        Self::legacy("MITCompatibility", "MIT", MIT_RELAX_SET, options, false)
    }

    /// MIT scheme followed by the legacy aqueous correction.
    pub fn mit_aqueous(options: &SchemeOptions) -> Result<Self, ConfigError> {
        Self::legacy("MITAqueousCompatibility", "MIT", MIT_RELAX_SET, options, true)
    }

    fn legacy(
        name: &str,
        scheme: &str,
        input_set: &str,
        options: &SchemeOptions,
        aqueous: bool,
    ) -> Result<Self, ConfigError> {
        let config = CompatibilityConfig::load(options.config_file.as_deref())?;
        let tables = config.scheme(scheme)?;
        let input_set = InputSetLibrary::load(options.input_set_file.as_deref())?.get(input_set)?;

        let mut corrections: Vec<Box<dyn Correction>> = vec![
            Box::new(PotcarCorrection::new(
                input_set.clone(),
                options.check_potcar,
                options.check_potcar_hash,
            )?),
            Box::new(GasCorrection::new(tables)?),
            Box::new(AnionCorrection::new(tables, options.correct_peroxide)?),
            Box::new(UCorrection::new(tables, &input_set, options.compat_type)),
        ];
        if aqueous {
            corrections.push(Box::new(AqueousCorrection::new(tables)?));
        }
        Ok(Self::new(name, corrections))
    }

    fn check_run_type(&self, entry: &ComputedEntry) -> Result<(), CompatibilityError> {
        let run_type = entry.parameters.run_type.as_deref();
        if run_type.is_some_and(|run_type| self.run_types.iter().any(|r| r == run_type)) {
            Ok(())
        } else {
            Err(CompatibilityError::InvalidRunType {
                entry: entry.label(),
                run_type: run_type.map(str::to_string),
                allowed: self.run_types.clone(),
            })
        }
    }

    /// Nonzero corrections by strategy name, in strategy order.
    pub fn corrections_dict(
        &self,
        entry: &ComputedEntry,
    ) -> Result<Vec<(String, UFloat)>, CompatibilityError> {
        let mut applied = Vec::new();
        for correction in &self.corrections {
            if let CorrectionOutcome::Applied(value) = correction.get_correction(entry)? {
                applied.push((correction.name(), value));
            }
        }
        Ok(applied)
    }

    /// Every strategy's contribution to `entry`, zero ones included, along
    /// with the energy the entry would have after processing.
    pub fn explanation(
        &self,
        entry: &ComputedEntry,
    ) -> Result<CorrectionsExplanation, CompatibilityError> {
        let mut copy = entry.clone();
        let processed = self.process_entry(&mut copy, &ProcessOptions::default())?;
        let applied = self.corrections_dict(entry)?;

        let corrections = self
            .corrections
            .iter()
            .map(|correction| {
                let name = correction.name();
                let value = applied
                    .iter()
                    .find(|(applied_name, _)| *applied_name == name)
                    .map(|(_, value)| *value)
                    .unwrap_or(UFloat::ZERO);
                CorrectionDetail {
                    name,
                    description: correction.description().to_string(),
                    value: value.nominal,
                    uncertainty: Uncertainty::of_correction(value),
                }
            })
            .collect();

        Ok(CorrectionsExplanation {
            compatibility: self.name.clone(),
            composition: entry.composition.formula(),
            uncorrected_energy: entry.uncorrected_energy,
            corrected_energy: processed.as_ref().map(|e| e.energy()),
            correction_uncertainty: processed.as_ref().map(|e| e.correction_uncertainty()),
            corrections,
        })
    }
}

impl Compatibility for CorrectionsList {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_adjustments(
        &self,
        entry: &mut ComputedEntry,
    ) -> Result<Vec<EnergyAdjustment>, CompatibilityError> {
        self.check_run_type(entry)?;
        Ok(self
            .corrections_dict(entry)?
            .into_iter()
            .map(|(name, value)| {
                EnergyAdjustment::constant(value.nominal, Uncertainty::of_correction(value))
                    .with_name(name.clone())
                    .with_cls(self.name.clone())
                    .with_description(name)
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionDetail {
    pub name: String,
    pub description: String,
    pub value: f64,
    pub uncertainty: Uncertainty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionsExplanation {
    pub compatibility: String,
    pub composition: String,
    pub uncorrected_energy: f64,
    /// `None` when the entry is rejected by the scheme.
    pub corrected_energy: Option<f64>,
    pub correction_uncertainty: Option<Uncertainty>,
    pub corrections: Vec<CorrectionDetail>,
}

impl fmt::Display for CorrectionsExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "The uncorrected value of the energy of {} is {:.6} eV",
            self.composition, self.uncorrected_energy
        )?;
        writeln!(
            f,
            "The following corrections / screening are applied for {}:",
            self.compatibility
        )?;
        for correction in &self.corrections {
            writeln!(f, "{}: {}", correction.name, correction.description)?;
            writeln!(f, "For the entry, this correction has the value {:.6} eV.", correction.value)?;
            match correction.uncertainty {
                Uncertainty::Known(sigma) => {
                    writeln!(f, "This correction has an uncertainty value of {:.6} eV.", sigma)?
                }
                Uncertainty::Unknown => {
                    writeln!(f, "This correction does not have uncertainty data available")?
                }
            }
            writeln!(f, "{}", "-".repeat(30))?;
        }
        match self.corrected_energy {
            Some(energy) => write!(f, "The final energy after corrections is {:.6} eV", energy),
            None => write!(f, "The entry is not compatible with {}", self.compatibility),
        }
    }
}
