use crate::core::metadata::{Catalog, CatalogLoadError, TermOrder};
use crate::engine::config::DataLayerConfig;
use crate::engine::datalayer::DataLayer;
use crate::engine::error::DataLayerError;
use crate::io::lammps::{LammpsError, LammpsFile, LammpsOptions, LammpsSummary};
use crate::io::traits::EnergyExpressionFile;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unknown file format '{0}' (expected 'lammps')")]
    UnknownFormat(String),
    #[error("Failed to read '{path}': {source}")]
    Read { path: PathBuf, source: LammpsError },
    #[error("Failed to write '{path}': {source}")]
    Write { path: PathBuf, source: LammpsError },
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
    #[error(transparent)]
    DataLayer(#[from] DataLayerError),
}

/// File formats the workflows can translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Lammps,
}

impl FileFormat {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "data" | "lmp" | "lammps" => Some(FileFormat::Lammps),
            _ => None,
        }
    }
}

impl FromStr for FileFormat {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lammps" => Ok(FileFormat::Lammps),
            _ => Err(WorkflowError::UnknownFormat(s.to_string())),
        }
    }
}

/// Everything a translation needs besides its input and output paths.
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub datalayer: DataLayerConfig,
    /// TOML catalog replacing the built-in one.
    pub catalog: Option<PathBuf>,
    pub options: LammpsOptions,
}

/// Sizes of a data layer after a translation.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateReport {
    pub summary: LammpsSummary,
    pub atoms: usize,
    /// Term count per order.
    pub terms: BTreeMap<u8, usize>,
    /// Parameter set count per order.
    pub parameters: BTreeMap<u8, usize>,
}

impl TranslateReport {
    pub fn collect(dl: &DataLayer, summary: LammpsSummary) -> Result<Self, WorkflowError> {
        let mut terms = BTreeMap::new();
        let mut parameters = BTreeMap::new();
        for order in TermOrder::all() {
            let count = dl.term_count(order)?.total;
            if count > 0 {
                terms.insert(order.value(), count);
            }
            let count = dl.parameter_count(order)?;
            if count > 0 {
                parameters.insert(order.value(), count);
            }
        }
        Ok(Self {
            summary,
            atoms: dl.atom_count()?,
            terms,
            parameters,
        })
    }
}

/// Loads the catalog named by `path`, or the built-in one.
pub fn load_catalog(path: Option<&Path>) -> Result<Arc<Catalog>, WorkflowError> {
    Ok(Arc::new(match path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    }))
}

/// Opens a data layer and reads `path` into it.
#[instrument(skip_all, name = "read_workflow", fields(path = %path.display()))]
pub fn read_file(
    path: &Path,
    format: FileFormat,
    config: &DataLayerConfig,
    catalog: Arc<Catalog>,
    options: &LammpsOptions,
) -> Result<(DataLayer, LammpsSummary), WorkflowError> {
    let mut dl = DataLayer::with_catalog(config.clone(), catalog)?;
    let summary = match format {
        FileFormat::Lammps => LammpsFile::read_from_path(&mut dl, path, options),
    }
    .map_err(|source| WorkflowError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    info!(tables = dl.list_tables().len(), "Read input file.");
    Ok((dl, summary))
}

#[instrument(skip_all, name = "write_workflow", fields(path = %path.display()))]
pub fn write_file(
    dl: &DataLayer,
    path: &Path,
    format: FileFormat,
    options: &LammpsOptions,
) -> Result<(), WorkflowError> {
    match format {
        FileFormat::Lammps => LammpsFile::write_to_path(dl, path, options),
    }
    .map_err(|source| WorkflowError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote output file.");
    Ok(())
}

/// Reads `input`, writes it to `output` and closes the data layer.
#[instrument(skip_all, name = "translate_workflow")]
pub fn run(
    input: &Path,
    output: &Path,
    format: FileFormat,
    config: &TranslateConfig,
) -> Result<TranslateReport, WorkflowError> {
    let catalog = load_catalog(config.catalog.as_deref())?;
    let (mut dl, summary) = read_file(input, format, &config.datalayer, catalog, &config.options)?;
    let report = TranslateReport::collect(&dl, summary)?;
    write_file(&dl, output, format, &config.options)?;
    dl.close()?;
    info!(atoms = report.atoms, "Translation complete.");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Backend;
    use crate::engine::config::DataLayerConfigBuilder;
    use std::fs;
    use tempfile::tempdir;

    const WATER: &str = "\
One water

 3 atoms
 2 bonds
 1 angles
 2 atom types
 1 bond types
 1 angle types

 0.0 10.0 xlo xhi
 0.0 10.0 ylo yhi
 0.0 10.0 zlo zhi

Masses

 1 15.9994
 2 1.008

Bond Coeffs

 1 450.0 1.0

Angle Coeffs

 1 55.0 109.47

Atoms

 1 1 1 -0.8476 5.0 5.0 5.0
 2 1 2 0.4238 6.0 5.0 5.0
 3 1 2 0.4238 4.67 5.94 5.0

Bonds

 1 1 1 2
 2 1 1 3

Angles

 1 1 2 1 3
";

    fn config(name: &str) -> TranslateConfig {
        TranslateConfig {
            datalayer: DataLayerConfig::in_memory(name),
            catalog: None,
            options: LammpsOptions::default(),
        }
    }

    #[test]
    fn formats_parse_from_names_and_extensions() {
        assert_eq!("LAMMPS".parse::<FileFormat>().unwrap(), FileFormat::Lammps);
        assert!(matches!(
            "gromacs".parse::<FileFormat>(),
            Err(WorkflowError::UnknownFormat(_))
        ));
        assert_eq!(
            FileFormat::from_path(Path::new("water.data")),
            Some(FileFormat::Lammps)
        );
        assert_eq!(FileFormat::from_path(Path::new("water.pdb")), None);
    }

    #[test]
    fn run_translates_a_file_and_reports_sizes() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.data");
        let output = dir.path().join("out.data");
        fs::write(&input, WATER).unwrap();

        let report = run(&input, &output, FileFormat::Lammps, &config("run")).unwrap();
        assert_eq!(report.atoms, 3);
        assert_eq!(report.terms[&2], 2);
        assert_eq!(report.terms[&3], 1);
        assert_eq!(report.parameters[&2], 1);
        assert_eq!(report.summary.title, "One water");

        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains(" 3 atoms"));
        assert!(written.contains("Bond Coeffs # harmonic"));
    }

    #[test]
    fn read_file_names_the_failing_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.data");
        let err = read_file(
            &missing,
            FileFormat::Lammps,
            &DataLayerConfig::in_memory("missing"),
            load_catalog(None).unwrap(),
            &LammpsOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(&err, WorkflowError::Read { path, .. } if path == &missing));
        assert!(err.to_string().contains("missing.data"));
    }

    #[test]
    fn disk_backend_is_cleaned_up_after_run() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.data");
        let output = dir.path().join("out.data");
        fs::write(&input, WATER).unwrap();

        let datalayer = DataLayerConfigBuilder::new()
            .name("scratch")
            .backend(Backend::Disk)
            .store_location(dir.path().to_path_buf())
            .build()
            .unwrap();
        let config = TranslateConfig {
            datalayer,
            ..config("scratch")
        };
        run(&input, &output, FileFormat::Lammps, &config).unwrap();
        assert!(output.exists());
        assert!(!dir.path().join("scratch.eex").exists());
    }

    #[test]
    fn custom_catalog_is_loaded_from_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(
            load_catalog(Some(&path)),
            Err(WorkflowError::Catalog(_))
        ));
    }
}
