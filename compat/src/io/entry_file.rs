//! Reading entries from JSON or YAML files

use color_eyre::eyre::{Result, WrapErr};
use entries::{ComputedEntry, Energy, EnergyUnit};
use std::fs;
use std::path::Path;
use tracing::info;

/// Load a list of entries, converting their energies from `unit` to eV.
///
/// Files ending in `.yaml` or `.yml` are read as YAML, anything else as
/// JSON. Adjustments already present on the entries must be in eV.
pub fn load_entries(path: &str, unit: EnergyUnit) -> Result<Vec<ComputedEntry>> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Unable to read entries file: {}", path))?;

    let is_yaml = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "yaml" | "yml"));

    let mut entries: Vec<ComputedEntry> = if is_yaml {
        serde_yml::from_str(&content).wrap_err("Failed to parse entries file")?
    } else {
        serde_json::from_str(&content).wrap_err("Failed to parse entries file")?
    };

    if unit != EnergyUnit::Ev {
        info!("Converting entry energies from {} to eV", unit);
        for entry in &mut entries {
            entry.uncorrected_energy = Energy::new(entry.uncorrected_energy, unit).as_ev();
        }
    }

    info!("Loaded {} entries from {}", entries.len(), path);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn write_temp(name: &str, content: &str) -> String {
        let path = std::env::temp_dir().join(format!("compat-{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_load_json_in_hartree() {
        let path = write_temp(
            "entries.json",
            r#"[{"entry_id": "mp-1", "composition": "Fe2O3", "energy": -1.0,
                 "parameters": {"run_type": "GGA+U", "hubbards": {"Fe": 5.3}}}]"#,
        );
        let entries = load_entries(&path, EnergyUnit::Hartree).unwrap();
        assert_eq!(entries.len(), 1);
        assert_relative_eq!(entries[0].uncorrected_energy, -27.211386245988, epsilon = 1e-9);
        assert_eq!(entries[0].parameters.hubbard("Fe"), 5.3);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_yaml() {
        let path = write_temp(
            "entries.yaml",
            "- composition: {Na: 1, Cl: 1}\n  uncorrected_energy: -7.0\n",
        );
        let entries = load_entries(&path, EnergyUnit::Ev).unwrap();
        assert_eq!(entries[0].reduced_formula(), "NaCl");
        fs::remove_file(path).unwrap();
    }
}
