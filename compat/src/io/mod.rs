//! Input/Output operations for the correction CLI
//!
//! This module handles entry files, result files and logging setup.

mod entry_file;
mod output;

pub use entry_file::load_entries;
pub use output::{setup_logging, write_entries};
