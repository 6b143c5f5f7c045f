//! Energy correction schemes for computed entries
//!
//! Raw DFT total energies from different functionals, Hubbard U settings or
//! pseudopotentials cannot be compared directly. The schemes here attach
//! named, uncertainty-carrying energy adjustments to [`entries::ComputedEntry`]
//! values so that they can be mixed, and reject the entries that cannot be
//! made compatible.

pub mod aqueous;
pub mod classify;
pub mod compatibility;
pub mod correction;
pub mod corrections_list;
pub mod error;
pub mod input_set;
pub mod mp2020;
pub mod registry;
pub mod tables;

pub use aqueous::{AqueousCompatibility, AqueousReferences, AQUEOUS_NAME};
pub use classify::{AnionClassifier, OxideClassification, OxidationStateGuesser, OxidationStates};
pub use compatibility::{
    apply_adjustments, AdjustmentExplanation, CompatType, Compatibility, Explanation, OnError,
    ProcessOptions, ProgressCallback, SchemeOptions,
};
pub use correction::{
    AnionCorrection, AqueousCorrection, Correction, CorrectionOutcome, GasCorrection,
    PotcarCorrection, UCorrection, MU_H2O,
};
pub use corrections_list::{CorrectionDetail, CorrectionsExplanation, CorrectionsList};
pub use error::{CompatibilityError, ConfigError};
pub use input_set::{InputSet, InputSetLibrary, PotcarSetting};
pub use mp2020::{Mp2020Compatibility, MP2020_NAME};
pub use registry::{SchemeKind, SchemeRegistry};
pub use tables::{CompatibilityConfig, SchemeTables};
