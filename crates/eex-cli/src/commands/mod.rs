pub mod convert;
pub mod inspect;

use crate::cli::{FormatArgs, StoreArgs, StyleArgs};
use crate::error::{CliError, Result};
use eex::core::store::Backend;
use eex::engine::config::{DataLayerConfig, DataLayerConfigBuilder};
use eex::engine::error::DataLayerError;
use eex::io::lammps::LammpsOptions;
use eex::workflows::translate::FileFormat;
use std::path::Path;
use tracing::debug;

/// Builds the data layer configuration for a command run over `input`.
fn datalayer_config(store: &StoreArgs, input: &Path) -> Result<DataLayerConfig> {
    let backend: Backend = store.backend.parse().map_err(DataLayerError::from)?;
    let name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("eex");
    let location = store
        .store_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);

    let config = DataLayerConfigBuilder::new()
        .name(name)
        .backend(backend)
        .store_location(location)
        .persist(store.keep_store)
        .build()?;
    debug!(name = %config.name, backend = %config.backend, "Resolved data layer configuration.");
    Ok(config)
}

fn lammps_options(styles: &StyleArgs) -> LammpsOptions {
    LammpsOptions {
        bond_style: styles.bond_style.clone(),
        angle_style: styles.angle_style.clone(),
        dihedral_style: styles.dihedral_style.clone(),
    }
}

/// Uses `--format` when given, otherwise the extension of `path`.
fn resolve_format(format: &FormatArgs, path: &Path) -> Result<FileFormat> {
    match &format.format {
        Some(name) => name.parse().map_err(CliError::from),
        None => FileFormat::from_path(path).ok_or_else(|| {
            CliError::Argument(format!(
                "cannot tell the format of '{}'; pass --format",
                path.display()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn store(backend: &str) -> StoreArgs {
        StoreArgs {
            backend: backend.to_string(),
            store_dir: Some(PathBuf::from("/tmp/eex-test")),
            keep_store: true,
            catalog: None,
        }
    }

    #[test]
    fn config_is_named_after_the_input_file() {
        let config = datalayer_config(&store("disk"), Path::new("runs/water.data")).unwrap();
        assert_eq!(config.name, "water");
        assert_eq!(config.backend, Backend::Disk);
        assert!(config.persist);
        assert_eq!(config.store_location, PathBuf::from("/tmp/eex-test"));
    }

    #[test]
    fn unknown_backends_are_rejected() {
        let result = datalayer_config(&store("hdf5"), Path::new("water.data"));
        assert!(matches!(
            result,
            Err(CliError::DataLayer(DataLayerError::UnknownBackend(_)))
        ));
    }

    #[test]
    fn format_falls_back_to_extension() {
        let none = FormatArgs { format: None };
        assert_eq!(
            resolve_format(&none, Path::new("water.lmp")).unwrap(),
            FileFormat::Lammps
        );
        assert!(matches!(
            resolve_format(&none, Path::new("water.xyz")),
            Err(CliError::Argument(_))
        ));
        let explicit = FormatArgs {
            format: Some("lammps".to_string()),
        };
        assert_eq!(
            resolve_format(&explicit, Path::new("water.xyz")).unwrap(),
            FileFormat::Lammps
        );
    }
}
