//! Energy correction command-line interface
//!
//! Reads computed entries, applies a correction scheme configured in YAML
//! and reports or writes the corrected entries.

use color_eyre::eyre::Result;

mod app;
mod config;
mod io;

use app::CompatApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    CompatApplication::from_cli()?.run()
}
