//! Command-line argument parsing for energy corrections

use clap::Parser;

/// Apply energy correction schemes to computed entries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Override the entries file (JSON or YAML)
    #[arg(short, long)]
    pub entries: Option<String>,

    /// Override the correction scheme (mp2020, mp, mit, mit_aqueous, aqueous)
    #[arg(short, long)]
    pub scheme: Option<String>,

    /// Override the policy for incompatible entries (ignore, warn, raise)
    #[arg(long)]
    pub on_error: Option<String>,

    /// Log batch progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Log a breakdown of the adjustments of every accepted entry
    #[arg(long)]
    pub explain: bool,

    /// Write the processed entries to this JSON file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Override log file: (default stdout)
    #[arg(short, long)]
    pub log_file: Option<String>,

    /// Unit for reported energies (eV, meV, Ha, Ry, kJ/mol, kcal/mol)
    #[arg(long)]
    pub report_unit: Option<String>,

    /// Disable every POTCAR check
    #[arg(long)]
    pub no_potcar_check: bool,
}
