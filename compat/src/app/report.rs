use crate::app::RunOutcome;
use entries::{Energy, EnergyUnit};
use tracing::info;

pub fn report_summary(outcome: &RunOutcome, unit: EnergyUnit) {
    let accepted = outcome.processed.len();
    info!(
        "\n{} accepted {} of {} entries ({} dropped)",
        outcome.scheme.name(),
        accepted,
        outcome.total,
        outcome.total - accepted
    );

    if let Some(references) = &outcome.references {
        info!("\nAqueous reference energies (eV/atom):");
        let show = |value: Option<f64>| match value {
            Some(value) => format!("{:.6}", value),
            None => "not set".to_string(),
        };
        info!("  O2:              {}", show(references.o2_energy));
        info!("  H2O:             {}", show(references.h2o_energy));
        info!("  H2O adjustments: {}", show(references.h2o_adjustments));
        info!("  H2:              {}", show(references.h2_energy));
        if let Ok(fit) = references.fit_h2_energy() {
            info!("  Fitted H2:       {:.6}", fit);
        }
    }

    if outcome.processed.is_empty() {
        return;
    }

    info!("\nCorrected energies ({}):", unit);
    for entry in &outcome.processed {
        let convert = |value: f64| Energy::ev(value).to(unit).value;
        info!(
            "  {:<28} {:>16.6} -> {:>16.6}  correction {:+.6}  uncertainty {}",
            entry.label(),
            convert(entry.uncorrected_energy),
            convert(entry.energy()),
            convert(entry.correction()),
            entry.correction_uncertainty()
        );
    }
}

pub fn report_explanations(outcome: &RunOutcome) {
    for entry in &outcome.processed {
        info!("");
        for line in outcome.scheme.explain(entry).to_string().lines() {
            info!("{}", line);
        }
    }
}
