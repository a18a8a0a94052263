use super::{datalayer_config, lammps_options, resolve_format};
use crate::cli::InspectArgs;
use crate::error::{CliError, Result};
use eex::core::metadata::TermOrder;
use eex::core::table::Scalar;
use eex::engine::datalayer::DataLayer;
use eex::engine::error::DataLayerError;
use eex::workflows::translate::{self, TranslateReport};
use std::fmt::Write as _;
use tracing::info;

const SHARED_PROPERTIES: [&str; 2] = ["charge", "mass"];

pub fn run(args: InspectArgs) -> Result<()> {
    let format = resolve_format(&args.format, &args.input)?;
    let config = datalayer_config(&args.store, &args.input)?;
    let catalog = translate::load_catalog(args.store.catalog.as_deref())?;

    info!("Inspecting {:?}", &args.input);
    let (mut dl, summary) = translate::read_file(
        &args.input,
        format,
        &config,
        catalog,
        &lammps_options(&args.styles),
    )
    .map_err(CliError::from_workflow)?;

    let report = TranslateReport::collect(&dl, summary)?;
    print!("{}", render(&dl, &report, args.values)?);
    dl.close()?;
    Ok(())
}

fn scalar_text(value: &Scalar) -> String {
    match value {
        Scalar::Int(v) => v.to_string(),
        Scalar::Float(v) => v.to_string(),
    }
}

/// Formats a human-readable overview of a loaded data layer.
fn render(dl: &DataLayer, report: &TranslateReport, values: bool) -> Result<String> {
    let mut out = String::new();
    let summary = &report.summary;
    writeln!(out, "Title:    {}", summary.title)?;
    writeln!(out, "Sections: {}", summary.sections.join(", "))?;
    if !summary.skipped.is_empty() {
        writeln!(out, "Skipped:  {}", summary.skipped.join(", "))?;
    }
    writeln!(out, "Atoms:    {}", report.atoms)?;

    if let Some(bounds) = dl.box_size() {
        let lengths = bounds.lengths();
        writeln!(
            out,
            "Box:      {:.4} x {:.4} x {:.4}",
            lengths[0], lengths[1], lengths[2]
        )?;
    }

    for order in TermOrder::all() {
        let terms = report.terms.get(&order.value()).copied().unwrap_or(0);
        let parameters = report.parameters.get(&order.value()).copied().unwrap_or(0);
        if terms == 0 && parameters == 0 {
            continue;
        }
        let forms = dl.functional_forms(order)?;
        writeln!(
            out,
            "Order {}:  {} term(s), {} parameter set(s) [{}]",
            order,
            terms,
            parameters,
            forms.join(", ")
        )?;
        if values {
            for uid in dl.parameter_uids(order)? {
                let entry = dl.parameter(order, uid)?;
                let named = dl.functional_form(order, &entry.form)?;
                let pairs: Vec<String> = named
                    .parameters
                    .iter()
                    .zip(&entry.values)
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                writeln!(out, "  {:>4}  {} {}", uid, entry.form, pairs.join(" "))?;
            }
        }
    }

    if values {
        for property in SHARED_PROPERTIES {
            match dl.atom_uids(property) {
                Ok(ids) if !ids.is_empty() => {
                    writeln!(out, "Distinct {}:", property)?;
                    for (id, value) in ids {
                        let text: Vec<String> = value.iter().map(scalar_text).collect();
                        writeln!(out, "  {:>4}  {}", id, text.join(" "))?;
                    }
                }
                Ok(_) => {}
                Err(DataLayerError::Validation(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eex::engine::config::DataLayerConfig;
    use eex::io::lammps::{LammpsFile, LammpsOptions};
    use eex::io::traits::EnergyExpressionFile;
    use std::io::Cursor;

    const WATER: &str = "\
Water

 3 atoms
 2 bonds
 2 atom types
 1 bond types

 -5.0 5.0 xlo xhi
 -5.0 5.0 ylo yhi
 -5.0 5.0 zlo zhi

Masses

 1 15.9994
 2 1.008

Bond Coeffs # harmonic

 1 450.0 1.0

Atoms # full

 1 1 1 -0.8476 0.0 0.0 0.0
 2 1 2 0.4238 1.0 0.0 0.0
 3 1 2 0.4238 -0.33 0.94 0.0

Bonds

 1 1 1 2
 2 1 1 3
";

    fn loaded() -> (DataLayer, TranslateReport) {
        let mut dl = DataLayer::new(DataLayerConfig::in_memory("inspect")).unwrap();
        let summary =
            LammpsFile::read_from(&mut dl, &mut Cursor::new(WATER), &LammpsOptions::default())
                .unwrap();
        let report = TranslateReport::collect(&dl, summary).unwrap();
        (dl, report)
    }

    #[test]
    fn overview_lists_counts_and_box() {
        let (dl, report) = loaded();
        let text = render(&dl, &report, false).unwrap();
        assert!(text.contains("Title:    Water"));
        assert!(text.contains("Atoms:    3"));
        assert!(text.contains("Box:      10.0000 x 10.0000 x 10.0000"));
        assert!(text.contains("Order 2:  2 term(s), 1 parameter set(s) [harmonic]"));
        assert!(!text.contains("Order 3"));
        assert!(!text.contains("Distinct"));
    }

    #[test]
    fn values_flag_lists_parameters_and_shared_values() {
        let (dl, report) = loaded();
        let text = render(&dl, &report, true).unwrap();
        assert!(text.contains("harmonic K=450 R0=1"));
        assert!(text.contains("Distinct charge:"));
        assert!(text.contains("-0.8476"));
        assert!(text.contains("Distinct mass:"));
    }
}
