use super::{datalayer_config, lammps_options, resolve_format};
use crate::cli::ConvertArgs;
use crate::error::{CliError, Result};
use eex::workflows::translate::{self, TranslateConfig};
use tracing::{info, warn};

pub fn run(args: ConvertArgs) -> Result<()> {
    let format = resolve_format(&args.format, &args.input)?;
    let config = TranslateConfig {
        datalayer: datalayer_config(&args.store, &args.input)?,
        catalog: args.store.catalog.clone(),
        options: lammps_options(&args.styles),
    };

    info!("Converting {:?} to {:?}", &args.input, &args.output);
    let report = translate::run(&args.input, &args.output, format, &config)
        .map_err(CliError::from_workflow)?;

    for section in &report.summary.skipped {
        warn!(section = %section, "Section was not carried over.");
        println!("Warning: section '{}' is not supported and was dropped.", section);
    }
    println!(
        "✓ Wrote {} atom(s), {} bond(s), {} angle(s), {} dihedral(s) to: {}",
        report.atoms,
        report.terms.get(&2).copied().unwrap_or(0),
        report.terms.get(&3).copied().unwrap_or(0),
        report.terms.get(&4).copied().unwrap_or(0),
        args.output.display()
    );
    if config.datalayer.persist {
        println!(
            "  Tables kept in: {}",
            config
                .datalayer
                .store_location
                .join(format!("{}.eex", config.datalayer.name))
                .display()
        );
    }
    Ok(())
}
