mod report;
mod runner;

pub use runner::{run_scheme, RunOutcome, RunSettings};

use self::report::{report_explanations, report_summary};
use crate::config::{Args, Config};
use crate::io::{load_entries, setup_logging, write_entries};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use tracing::info;

pub struct CompatApplication {
    args: Args,
    config: Config,
}

impl CompatApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn run(self) -> Result<()> {
        setup_logging(self.args.log_file.as_ref());
        info!("Read configuration from: {}", self.args.config_file);

        let settings = RunSettings::resolve(&self.args, &self.config)?;
        if !settings.potcar_checks {
            info!("POTCAR checks disabled");
        }

        let mut entries = load_entries(&settings.entries_path, settings.energy_unit)?;
        let outcome = run_scheme(&settings, &mut entries)?;

        report_summary(&outcome, settings.report_unit);
        if self.args.explain {
            report_explanations(&outcome);
        }

        if let Some(path) = &self.args.output {
            write_entries(path, &outcome.processed)?;
        }

        Ok(())
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}
