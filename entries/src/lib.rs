//! Data model for computed energy entries
//!
//! Compositions, energy adjustments with uncertainty, computed entries and the
//! small amount of structure and unit handling the correction schemes need.

pub mod adjustment;
pub mod composition;
pub mod element;
pub mod entry;
pub mod structure;
pub mod uncertainty;
pub mod units;

pub use adjustment::{AdjustmentKind, EnergyAdjustment};
pub use composition::{Composition, FormulaError};
pub use entry::{CalcParameters, ComputedEntry, EntryData, OxideType, PotcarSpec, SulfideType};
pub use structure::{Site, Structure};
pub use uncertainty::{UFloat, Uncertainty};
pub use units::{Energy, EnergyUnit};
