//! Free energies for aqueous stability analysis
//!
//! Turns DFT energies into free energies that reproduce the experimental
//! formation free energy of water. A solid scheme runs first; the O2, H2O
//! and H2 references are then taken from the constructor or from the batch
//! itself and passed around explicitly for that one call.

use crate::compatibility::{apply_adjustments, Compatibility, ProcessOptions};
use crate::correction::MU_H2O;
use crate::error::CompatibilityError;
use entries::{ComputedEntry, EnergyAdjustment, Uncertainty};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const AQUEOUS_NAME: &str = "MP Aqueous free energy adjustment";

pub const ROOM_TEMPERATURE: f64 = 298.0;

/// -T*S at room temperature for compounds that are gases or liquids at
/// standard state, eV/atom.
pub const COMPOUND_ENTROPIES: [(&str, f64); 7] = [
    ("O2", 0.316731),
    ("N2", 0.295729),
    ("F2", 0.313025),
    ("Cl2", 0.344373),
    ("Br", 0.235039),
    ("Hg", 0.234421),
    ("H2O", 0.071963),
];

fn compound_entropy(reduced_formula: &str) -> Option<f64> {
    COMPOUND_ENTROPIES
        .iter()
        .find(|(formula, _)| *formula == reduced_formula)
        .map(|(_, entropy)| *entropy)
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Reference energies used for one batch, eV/atom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AqueousReferences {
    pub o2_energy: Option<f64>,
    pub h2o_energy: Option<f64>,
    /// Correction already applied to H2O, per atom.
    pub h2o_adjustments: Option<f64>,
    /// Energy of the lowest H2 entry in the batch.
    pub h2_energy: Option<f64>,
}

impl AqueousReferences {
    pub fn new(o2_energy: f64, h2o_energy: f64, h2o_adjustments: f64) -> Self {
        Self {
            o2_energy: Some(o2_energy),
            h2o_energy: Some(h2o_energy),
            h2o_adjustments: Some(h2o_adjustments),
            h2_energy: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.o2_energy.is_some() && self.h2o_energy.is_some() && self.h2o_adjustments.is_some()
    }

    fn required(&self) -> Result<(f64, f64, f64), CompatibilityError> {
        match (self.o2_energy, self.h2o_energy, self.h2o_adjustments) {
            (Some(o2), Some(h2o), Some(adjustments)) => Ok((o2, h2o, adjustments)),
            _ => Err(CompatibilityError::MissingAqueousReferences),
        }
    }

    /// H2 energy per atom that makes the formation free energy of water
    /// equal to [`MU_H2O`], rounded to 6 decimals.
    pub fn fit_h2_energy(&self) -> Result<f64, CompatibilityError> {
        let (o2, h2o, _) = self.required()?;
        let s_h2o = compound_entropy("H2O").unwrap_or_default();
        let s_o2 = compound_entropy("O2").unwrap_or_default();
        Ok(round6(0.5 * (3.0 * (h2o - s_h2o) - (o2 - s_o2) - MU_H2O)))
    }
}

pub struct AqueousCompatibility {
    solid: Option<Arc<dyn Compatibility>>,
    references: AqueousReferences,
}

impl AqueousCompatibility {
    /// `solid` runs before the aqueous pass; `None` keeps DFT energies as
    /// they are. Missing references are looked up in each batch.
    pub fn new(solid: Option<Arc<dyn Compatibility>>, references: AqueousReferences) -> Self {
        if !references.is_complete() {
            warn!(
                "O2 and H2O reference energies were not provided. {} will look for O2 and H2O \
                 entries in each batch and fail if there are none.",
                AQUEOUS_NAME
            );
        }
        Self { solid, references }
    }

    pub fn solid(&self) -> Option<&Arc<dyn Compatibility>> {
        self.solid.as_ref()
    }

    pub fn references(&self) -> &AqueousReferences {
        &self.references
    }

    /// Fill the missing references from the accepted entries of a batch.
    ///
    /// O2 and H2O are only taken from batches of more than one entry; the
    /// H2 reference always comes from the batch.
    pub fn discover_references(
        &self,
        entries: &[ComputedEntry],
        indices: &[usize],
    ) -> AqueousReferences {
        let lowest = |formula: &str| {
            indices
                .iter()
                .map(|&i| &entries[i])
                .filter(|entry| entry.reduced_formula() == formula)
                .min_by(|a, b| a.energy_per_atom().total_cmp(&b.energy_per_atom()))
        };

        let mut references = self.references;
        if indices.len() > 1 {
            if references.o2_energy.is_none() {
                references.o2_energy = lowest("O2").map(ComputedEntry::energy_per_atom);
            }
            if references.h2o_energy.is_none() && references.h2o_adjustments.is_none() {
                if let Some(h2o) = lowest("H2O") {
                    references.h2o_energy = Some(h2o.energy_per_atom());
                    references.h2o_adjustments = Some(h2o.correction() / h2o.num_atoms());
                }
            }
        }
        if let Some(h2) = lowest("H2") {
            references.h2_energy = Some(h2.energy_per_atom());
        }
        references
    }

    pub fn adjustments_for(
        &self,
        entry: &ComputedEntry,
        references: &AqueousReferences,
    ) -> Result<Vec<EnergyAdjustment>, CompatibilityError> {
        let (_, _, h2o_adjustments) = references.required()?;
        let fit_h2_energy = references.fit_h2_energy()?;

        let composition = &entry.composition;
        let rform = entry.reduced_formula();
        let num_atoms = composition.num_atoms();
        let mut adjustments = Vec::new();

        // every H2 polymorph ends up at the fitted energy
        if rform == "H2" {
            let h2_energy = references
                .h2_energy
                .ok_or_else(|| CompatibilityError::MissingH2Reference(entry.label()))?;
            adjustments.push(
                EnergyAdjustment::constant((fit_h2_energy - h2_energy) * num_atoms, Uncertainty::Unknown)
                    .with_name("MP Aqueous H2 / H2O referencing")
                    .with_cls(AQUEOUS_NAME)
                    .with_description(
                        "Adjusts the H2 energy to reproduce the experimental Gibbs formation \
                         free energy of H2O, based on the DFT energy of Oxygen and H2O",
                    ),
            );
        }

        if let Some(entropy) = compound_entropy(&rform) {
            adjustments.push(
                EnergyAdjustment::temperature(
                    -entropy / ROOM_TEMPERATURE,
                    ROOM_TEMPERATURE,
                    num_atoms,
                    Uncertainty::Unknown,
                )
                .with_name("Compound entropy at room temperature")
                .with_cls(AQUEOUS_NAME)
                .with_description(
                    "Adds the entropy (T delta S) to energies of compounds that are gaseous \
                     or liquid at standard state",
                ),
            );
        }

        if rform != "H2O" {
            let (reduced, factor) = composition.reduced_composition_and_factor();
            let waters = (reduced.get("H") / 2.0).min(reduced.get("O")).floor() * factor;
            if waters > 0.0 {
                // undo the H and O corrections of the embedded water, then
                // remove its free energy
                let hydrate = -(h2o_adjustments * 3.0 + MU_H2O);
                adjustments.push(
                    EnergyAdjustment::composition(hydrate, waters, Uncertainty::Unknown)
                        .with_name("MP Aqueous hydrate")
                        .with_cls(AQUEOUS_NAME)
                        .with_description(
                            "Adjust the energy of solid hydrate compounds (compounds containing \
                             H2O molecules in their structure) so that the free energies of \
                             embedded H2O molecules match the experimental value enforced by \
                             the MP Aqueous energy referencing scheme.",
                        ),
                );
            }
        }

        Ok(adjustments)
    }

    fn run(
        &self,
        entries: &mut [ComputedEntry],
        indices: &[usize],
        options: &ProcessOptions,
    ) -> Result<(Vec<usize>, AqueousReferences), CompatibilityError> {
        let accepted = match &self.solid {
            Some(solid) => {
                let solid_options = ProcessOptions {
                    clean: true,
                    on_error: options.on_error,
                    ..ProcessOptions::default()
                };
                let accepted = solid.process_indices(entries, indices, &solid_options)?;
                info!(
                    "{} accepted {} of {} entries",
                    solid.name(),
                    accepted.len(),
                    indices.len()
                );
                accepted
            }
            None => indices.to_vec(),
        };

        if let [only] = accepted.as_slice() {
            if entries[*only].reduced_formula() == "H2" {
                warn!(
                    "Processing a single H2 entry assigns every H2 polymorph the same energy. \
                     Process all entries at once to keep H2 polymorph energy differences."
                );
            }
        }

        let references = self.discover_references(entries, &accepted);
        let accepted = apply_adjustments(entries, &accepted, options, |entry| {
            self.adjustments_for(entry, &references)
        })?;
        Ok((accepted, references))
    }

    /// Like [`Compatibility::process_entries`], also returning the
    /// references used for the batch.
    pub fn process_entries_with_references(
        &self,
        entries: &mut [ComputedEntry],
        options: &ProcessOptions,
    ) -> Result<(Vec<ComputedEntry>, AqueousReferences), CompatibilityError> {
        let all: Vec<usize> = (0..entries.len()).collect();
        let mut copies: Vec<ComputedEntry>;
        let target: &mut [ComputedEntry] = if options.inplace {
            entries
        } else {
            copies = entries.to_vec();
            &mut copies
        };
        let (accepted, references) = self.run(target, &all, options)?;
        let processed = accepted.into_iter().map(|i| target[i].clone()).collect();
        Ok((processed, references))
    }
}

impl Compatibility for AqueousCompatibility {
    fn name(&self) -> &str {
        AQUEOUS_NAME
    }

    /// Uses only the references given at construction.
    fn get_adjustments(
        &self,
        entry: &mut ComputedEntry,
    ) -> Result<Vec<EnergyAdjustment>, CompatibilityError> {
        self.adjustments_for(entry, &self.references)
    }

    /// Solid adjustments must survive the aqueous pass.
    fn default_options(&self) -> ProcessOptions {
        ProcessOptions::default().with_clean(false)
    }

    fn process_indices(
        &self,
        entries: &mut [ComputedEntry],
        indices: &[usize],
        options: &ProcessOptions,
    ) -> Result<Vec<usize>, CompatibilityError> {
        self.run(entries, indices, options).map(|(accepted, _)| accepted)
    }
}
