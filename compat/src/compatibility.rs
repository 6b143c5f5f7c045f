//! The compatibility interface and the shared batch engine
//!
//! Every scheme produces a list of adjustments for one entry. Applying
//! those to a batch is the same for all schemes: optionally clear old
//! adjustments, skip adjustments already present, reject entries whose
//! existing adjustment of the same name has a different value, and drop
//! entries the scheme finds incompatible.

use crate::error::{CompatibilityError, ConfigError};
use entries::{ComputedEntry, EnergyAdjustment, Uncertainty};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do when a scheme finds an entry incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    #[default]
    Ignore,
    Warn,
    Raise,
}

impl FromStr for OnError {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "raise" => Ok(Self::Raise),
            _ => Err(color_eyre::eyre::eyre!("Unknown on_error policy: {}", s)),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Clone)]
pub struct ProcessOptions {
    /// Remove existing adjustments before processing.
    pub clean: bool,
    /// Log progress every `progress_interval` entries.
    pub verbose: bool,
    /// Mutate the caller's entries; otherwise work on copies.
    pub inplace: bool,
    pub on_error: OnError,
    pub progress_interval: usize,
    /// Called with (done, total) after every entry.
    pub progress: Option<ProgressCallback>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            clean: true,
            verbose: false,
            inplace: true,
            on_error: OnError::Ignore,
            progress_interval: 100,
            progress: None,
        }
    }
}

impl fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("clean", &self.clean)
            .field("verbose", &self.verbose)
            .field("inplace", &self.inplace)
            .field("on_error", &self.on_error)
            .field("progress_interval", &self.progress_interval)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ProcessOptions {
    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_inplace(mut self, inplace: bool) -> Self {
        self.inplace = inplace;
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report_progress(&self, done: usize, total: usize) {
        if self.verbose {
            let interval = self.progress_interval.max(1);
            if done % interval == 0 || done == total {
                info!("Processed {}/{} entries", done, total);
            }
        }
        if let Some(callback) = &self.progress {
            callback(done, total);
        }
    }
}

/// GGA-only or the GGA/GGA+U mixing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompatType {
    #[serde(rename = "GGA")]
    Gga,
    #[default]
    Advanced,
}

impl FromStr for CompatType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gga" => Ok(Self::Gga),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ConfigError::InvalidCompatType(s.to_string())),
        }
    }
}

impl fmt::Display for CompatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatType::Gga => f.write_str("GGA"),
            CompatType::Advanced => f.write_str("Advanced"),
        }
    }
}

/// Construction options shared by the schemes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeOptions {
    pub compat_type: CompatType,
    /// Distinguish peroxides, superoxides and ozonides from oxides.
    pub correct_peroxide: bool,
    pub check_potcar: bool,
    /// Compare POTCAR hashes rather than symbols.
    pub check_potcar_hash: bool,
    /// Correction tables to use instead of the bundled ones.
    pub config_file: Option<PathBuf>,
    /// Input sets to use instead of the bundled ones.
    pub input_set_file: Option<PathBuf>,
}

impl Default for SchemeOptions {
    fn default() -> Self {
        Self {
            compat_type: CompatType::Advanced,
            correct_peroxide: true,
            check_potcar: true,
            check_potcar_hash: false,
            config_file: None,
            input_set_file: None,
        }
    }
}

pub trait Compatibility: Send + Sync {
    /// Scheme name, also used as the provenance of its adjustments.
    fn name(&self) -> &str;

    /// Adjustments for one entry. May cache derived data on the entry.
    fn get_adjustments(
        &self,
        entry: &mut ComputedEntry,
    ) -> Result<Vec<EnergyAdjustment>, CompatibilityError>;

    /// Options used when the caller has no preference.
    fn default_options(&self) -> ProcessOptions {
        ProcessOptions::default()
    }

    /// Process `entries[i]` for each `i` in `indices` and return the
    /// indices of the accepted entries, in order.
    fn process_indices(
        &self,
        entries: &mut [ComputedEntry],
        indices: &[usize],
        options: &ProcessOptions,
    ) -> Result<Vec<usize>, CompatibilityError> {
        apply_adjustments(entries, indices, options, |entry| {
            self.get_adjustments(entry)
        })
    }

    /// Process a batch and return the accepted entries in input order.
    ///
    /// With `inplace` the caller's entries carry the new adjustments
    /// (rejected ones included) and the returned entries are copies of the
    /// accepted ones. Otherwise the caller's entries are left untouched.
    fn process_entries(
        &self,
        entries: &mut [ComputedEntry],
        options: &ProcessOptions,
    ) -> Result<Vec<ComputedEntry>, CompatibilityError> {
        let all: Vec<usize> = (0..entries.len()).collect();
        if options.inplace {
            let accepted = self.process_indices(entries, &all, options)?;
            Ok(accepted.into_iter().map(|i| entries[i].clone()).collect())
        } else {
            let mut working = entries.to_vec();
            let accepted = self.process_indices(&mut working, &all, options)?;
            let mut keep = vec![false; working.len()];
            for i in accepted {
                keep[i] = true;
            }
            Ok(working
                .into_iter()
                .zip(keep)
                .filter_map(|(entry, keep)| keep.then_some(entry))
                .collect())
        }
    }

    /// Process one entry; `None` if it was rejected.
    fn process_entry(
        &self,
        entry: &mut ComputedEntry,
        options: &ProcessOptions,
    ) -> Result<Option<ComputedEntry>, CompatibilityError> {
        Ok(self
            .process_entries(std::slice::from_mut(entry), options)?
            .into_iter()
            .next())
    }

    /// Breakdown of the adjustments already applied to `entry`.
    fn explain(&self, entry: &ComputedEntry) -> Explanation {
        Explanation::new(self.name(), entry)
    }
}

/// Apply scheme-produced adjustments to the selected entries.
///
/// Returns the indices of accepted entries. Under [`OnError::Raise`] the
/// first incompatibility aborts the batch; entries before it have already
/// been modified.
pub fn apply_adjustments<F>(
    entries: &mut [ComputedEntry],
    indices: &[usize],
    options: &ProcessOptions,
    mut adjust: F,
) -> Result<Vec<usize>, CompatibilityError>
where
    F: FnMut(&mut ComputedEntry) -> Result<Vec<EnergyAdjustment>, CompatibilityError>,
{
    let total = indices.len();
    let mut accepted = Vec::with_capacity(total);

    for (done, &index) in indices.iter().enumerate() {
        let entry = &mut entries[index];
        if options.clean {
            entry.energy_adjustments.clear();
        }

        match adjust(entry) {
            Ok(adjustments) => {
                if merge_adjustments(entry, adjustments) {
                    accepted.push(index);
                }
            }
            Err(err) => match options.on_error {
                OnError::Raise => return Err(err),
                OnError::Warn => warn!("Discarding entry {}: {}", entry.label(), err),
                OnError::Ignore => debug!("Discarding entry {}: {}", entry.label(), err),
            },
        }

        options.report_progress(done + 1, total);
    }

    Ok(accepted)
}

/// Append new adjustments, returning false if any conflicts with an
/// existing adjustment of the same name.
fn merge_adjustments(entry: &mut ComputedEntry, adjustments: Vec<EnergyAdjustment>) -> bool {
    let mut keep = true;
    for adjustment in adjustments {
        if entry
            .energy_adjustments
            .iter()
            .any(|existing| existing.same_adjustment(&adjustment))
        {
            continue;
        }
        if entry
            .energy_adjustments
            .iter()
            .any(|existing| existing.same_name(&adjustment))
        {
            warn!(
                "Entry {} already has an energy adjustment called {}, but its value differs \
                 from the value of {:.3} calculated here. This entry will be discarded.",
                entry.label(),
                adjustment.name,
                adjustment.value()
            );
            keep = false;
        } else {
            debug!("{}: {}", entry.label(), adjustment);
            entry.energy_adjustments.push(adjustment);
        }
    }
    keep
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentExplanation {
    pub name: String,
    pub description: String,
    pub value: f64,
    pub value_per_atom: f64,
    pub uncertainty: Uncertainty,
}

/// Before/after energies of an entry and every adjustment applied to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub compatibility: String,
    pub entry: String,
    pub composition: String,
    pub uncorrected_energy: f64,
    pub uncorrected_energy_per_atom: f64,
    pub corrected_energy: f64,
    pub corrected_energy_per_atom: f64,
    pub correction_uncertainty: Uncertainty,
    pub adjustments: Vec<AdjustmentExplanation>,
}

impl Explanation {
    pub fn new(compatibility: &str, entry: &ComputedEntry) -> Self {
        let num_atoms = entry.num_atoms();
        Self {
            compatibility: compatibility.to_string(),
            entry: entry.label(),
            composition: entry.composition.formula(),
            uncorrected_energy: entry.uncorrected_energy,
            uncorrected_energy_per_atom: entry.uncorrected_energy_per_atom(),
            corrected_energy: entry.energy(),
            corrected_energy_per_atom: entry.energy_per_atom(),
            correction_uncertainty: entry.correction_uncertainty(),
            adjustments: entry
                .energy_adjustments
                .iter()
                .map(|adjustment| AdjustmentExplanation {
                    name: adjustment.name.clone(),
                    description: adjustment.explain(),
                    value: adjustment.value(),
                    value_per_atom: adjustment.value() / num_atoms,
                    uncertainty: adjustment.uncertainty(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "The uncorrected energy of {} is {:.3} eV ({:.3} eV/atom).",
            self.composition, self.uncorrected_energy, self.uncorrected_energy_per_atom
        )?;
        if self.adjustments.is_empty() {
            writeln!(f, "No energy adjustments have been applied to this entry.")?;
        } else {
            writeln!(f, "The following energy adjustments have been applied to this entry:")?;
            for adjustment in &self.adjustments {
                writeln!(
                    f,
                    "    {}: {:.3} eV ({:.3} eV/atom), uncertainty {}",
                    adjustment.name,
                    adjustment.value,
                    adjustment.value_per_atom,
                    adjustment.uncertainty
                )?;
            }
        }
        write!(
            f,
            "The final energy after adjustments is {:.3} eV ({:.3} eV/atom).",
            self.corrected_energy, self.corrected_energy_per_atom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gives every entry one fixed adjustment, rejects anything with Xe.
    struct Fixed;

    impl Compatibility for Fixed {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn get_adjustments(
            &self,
            entry: &mut ComputedEntry,
        ) -> Result<Vec<EnergyAdjustment>, CompatibilityError> {
            if entry.composition.contains("Xe") {
                return Err(CompatibilityError::MissingAqueousReferences);
            }
            Ok(vec![EnergyAdjustment::constant(-1.0, Uncertainty::Known(0.1))
                .with_name("fixed")
                .with_cls("Fixed")])
        }
    }

    fn entry(formula: &str) -> ComputedEntry {
        ComputedEntry::new(formula.parse().unwrap(), -10.0)
    }

    #[test]
    fn test_rerun_without_clean_is_idempotent() {
        let mut batch = vec![entry("NaCl")];
        let options = ProcessOptions::default().with_clean(false);
        Fixed.process_entries(&mut batch, &options).unwrap();
        let out = Fixed.process_entries(&mut batch, &options).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(batch[0].energy_adjustments.len(), 1);
        assert_relative_eq!(batch[0].energy(), -11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_conflicting_adjustment_rejects_entry() {
        let mut batch = vec![entry("NaCl")];
        batch[0].energy_adjustments.push(
            EnergyAdjustment::constant(-2.0, Uncertainty::Known(0.0))
                .with_name("fixed")
                .with_cls("Fixed"),
        );
        let out = Fixed
            .process_entries(&mut batch, &ProcessOptions::default().with_clean(false))
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_on_error_policies() {
        let mut batch = vec![entry("NaCl"), entry("XeF2"), entry("KCl")];
        let out = Fixed
            .process_entries(&mut batch, &ProcessOptions::default())
            .unwrap();
        let labels: Vec<String> = out.iter().map(|e| e.label()).collect();
        assert_eq!(labels, vec!["NaCl", "KCl"]);

        let result = Fixed.process_entries(
            &mut batch,
            &ProcessOptions::default().with_on_error(OnError::Raise),
        );
        assert_eq!(result.unwrap_err(), CompatibilityError::MissingAqueousReferences);
    }

    #[test]
    fn test_copy_leaves_input_untouched() {
        let mut batch = vec![entry("NaCl")];
        let out = Fixed
            .process_entries(&mut batch, &ProcessOptions::default().with_inplace(false))
            .unwrap();
        assert!(batch[0].energy_adjustments.is_empty());
        assert_eq!(out[0].energy_adjustments.len(), 1);
    }

    #[test]
    fn test_progress_callback_sees_every_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let options = ProcessOptions::default().with_progress(Arc::new(move |done, total| {
            assert!(done <= total);
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let mut batch = vec![entry("NaCl"), entry("XeF2"), entry("KCl")];
        Fixed.process_entries(&mut batch, &options).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_explanation() {
        let mut single = entry("NaCl");
        let processed = Fixed
            .process_entry(&mut single, &ProcessOptions::default())
            .unwrap()
            .unwrap();
        let explanation = Fixed.explain(&processed);
        assert_eq!(explanation.adjustments.len(), 1);
        assert_relative_eq!(explanation.corrected_energy, -11.0, epsilon = 1e-12);
        assert_relative_eq!(explanation.adjustments[0].value_per_atom, -0.5, epsilon = 1e-12);
        assert!(explanation.to_string().contains("fixed: -1.000 eV"));
    }

    #[test]
    fn test_compat_type_parsing() {
        assert_eq!("GGA".parse::<CompatType>().unwrap(), CompatType::Gga);
        assert_eq!("advanced".parse::<CompatType>().unwrap(), CompatType::Advanced);
        assert!(matches!(
            "LDA".parse::<CompatType>(),
            Err(ConfigError::InvalidCompatType(_))
        ));
    }
}
