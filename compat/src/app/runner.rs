use crate::config::{Args, Config, ProcessParams};
use color_eyre::eyre::{eyre, Result, WrapErr};
use compat::{
    AqueousReferences, Compatibility, OnError, ProcessOptions, SchemeKind, SchemeOptions,
    SchemeRegistry,
};
use entries::{ComputedEntry, EnergyUnit};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Settings after command-line overrides have been applied.
#[derive(Debug)]
pub struct RunSettings {
    pub entries_path: String,
    pub kind: SchemeKind,
    pub scheme_options: SchemeOptions,
    pub process: ProcessParams,
    pub references: AqueousReferences,
    pub energy_unit: EnergyUnit,
    pub report_unit: EnergyUnit,
    pub potcar_checks: bool,
}

impl RunSettings {
    pub fn resolve(args: &Args, config: &Config) -> Result<Self> {
        let entries_path = match (&args.entries, &config.entries) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) => relative_to_config(&args.config_file, path),
            (None, None) => {
                return Err(eyre!("No entries file given in the configuration or with --entries"))
            }
        };

        let scheme = args
            .scheme
            .as_deref()
            .or(config.scheme.as_deref())
            .unwrap_or("mp2020");
        let kind: SchemeKind = scheme.parse()?;

        let mut process = config.process.clone().unwrap_or_default().with_defaults();
        if let Some(on_error) = &args.on_error {
            process.on_error = Some(on_error.parse::<OnError>()?);
        }
        if args.verbose {
            process.verbose = Some(true);
        }

        let report_unit = match &args.report_unit {
            Some(unit) => unit.parse::<EnergyUnit>().map_err(|err| eyre!(err))?,
            None => EnergyUnit::Ev,
        };

        Ok(Self {
            entries_path,
            kind,
            scheme_options: config.options.clone().unwrap_or_default(),
            process,
            references: config.aqueous.unwrap_or_default(),
            energy_unit: config.energy_unit.unwrap_or_default(),
            report_unit,
            potcar_checks: !args.no_potcar_check,
        })
    }

    /// Processing options, starting from what the scheme prefers.
    fn process_options(&self, scheme: &dyn Compatibility) -> ProcessOptions {
        let mut options = scheme.default_options();
        if let Some(clean) = self.process.clean {
            options.clean = clean;
        }
        options.inplace = self.process.inplace.unwrap_or(options.inplace);
        options.on_error = self.process.on_error.unwrap_or(options.on_error);
        options.verbose = self.process.verbose.unwrap_or(options.verbose);
        options
    }
}

/// Paths in the configuration file are relative to the file itself.
fn relative_to_config(config_file: &str, path: &str) -> String {
    let path = Path::new(path);
    match Path::new(config_file).parent() {
        Some(dir) if path.is_relative() => dir.join(path).display().to_string(),
        _ => path.display().to_string(),
    }
}

pub struct RunOutcome {
    pub scheme: Arc<dyn Compatibility>,
    pub total: usize,
    pub processed: Vec<ComputedEntry>,
    /// References used by the aqueous scheme.
    pub references: Option<AqueousReferences>,
}

pub fn run_scheme(settings: &RunSettings, entries: &mut [ComputedEntry]) -> Result<RunOutcome> {
    let mut registry = SchemeRegistry::new().with_potcar_checks(settings.potcar_checks);
    let total = entries.len();
    info!("Applying the {} scheme to {} entries", settings.kind, total);

    match settings.kind {
        SchemeKind::Aqueous => {
            let aqueous = registry.aqueous(&settings.scheme_options, settings.references)?;
            let options = settings.process_options(aqueous.as_ref());
            let (processed, references) = aqueous
                .process_entries_with_references(entries, &options)
                .wrap_err("Aqueous processing failed")?;
            Ok(RunOutcome {
                scheme: aqueous,
                total,
                processed,
                references: Some(references),
            })
        }
        kind => {
            let scheme = registry.build(kind, &settings.scheme_options, settings.references)?;
            let options = settings.process_options(scheme.as_ref());
            let processed = scheme
                .process_entries(entries, &options)
                .wrap_err_with(|| format!("{} processing failed", scheme.name()))?;
            Ok(RunOutcome {
                scheme,
                total,
                processed,
                references: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_entries_path_follows_config() {
        assert_eq!(
            relative_to_config("example/config.yaml", "entries.json"),
            "example/entries.json"
        );
        assert_eq!(relative_to_config("config.yaml", "entries.json"), "entries.json");
        assert_eq!(
            relative_to_config("example/config.yaml", "/data/entries.json"),
            "/data/entries.json"
        );
    }

    #[test]
    fn test_command_line_overrides_config() {
        let args = Args::parse_from([
            "compat",
            "-c",
            "example/config.yaml",
            "--scheme",
            "mp",
            "--on-error",
            "raise",
            "--no-potcar-check",
        ]);
        let config = serde_yml::from_str::<Config>(
            "entries: entries.json\nscheme: aqueous\nprocess:\n  clean: false\n",
        )
        .unwrap()
        .with_defaults();

        let settings = RunSettings::resolve(&args, &config).unwrap();
        assert_eq!(settings.entries_path, "example/entries.json");
        assert_eq!(settings.kind, SchemeKind::MaterialsProject);
        assert_eq!(settings.process.on_error, Some(OnError::Raise));
        assert!(!settings.potcar_checks);
        assert_eq!(settings.report_unit, EnergyUnit::Ev);
    }

    #[test]
    fn test_run_example_entries() {
        let dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("example");
        let entries_path = dir.join("entries.json").display().to_string();
        let settings = RunSettings {
            entries_path: entries_path.clone(),
            kind: SchemeKind::Aqueous,
            scheme_options: SchemeOptions::default(),
            process: ProcessParams::default(),
            references: AqueousReferences::default(),
            energy_unit: EnergyUnit::Ev,
            report_unit: EnergyUnit::Ev,
            potcar_checks: true,
        };
        let mut entries = crate::io::load_entries(&entries_path, EnergyUnit::Ev).unwrap();
        let outcome = run_scheme(&settings, &mut entries).unwrap();
        assert_eq!(outcome.total, 9);
        assert_eq!(outcome.processed.len(), 7);
        assert!(outcome.references.is_some_and(|r| r.is_complete()));
    }
}
