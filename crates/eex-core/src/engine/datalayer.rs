use super::atoms::AtomStore;
use super::command::{Command, Payload};
use super::config::{DataLayerConfig, UnitMap};
use super::error::DataLayerError;
use super::forms::{FormDefinition, FormRegistry};
use super::parameters::{ParameterEntry, ParameterStore, ParameterValues};
use super::terms::{self, TermCount};
use crate::core::geometry::BoxBounds;
use crate::core::metadata::{Catalog, FunctionalForm, OrderKey, TermOrder};
use crate::core::store::{self, TableStore};
use crate::core::table::{Scalar, Table};
use crate::core::units::UnitRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const OTHER_PREFIX: &str = "other_";

/// One energy-expression dataset.
///
/// Owns the table-store backend and every store built on top of it: atom
/// properties, functional forms, term parameters and term connectivity.
#[derive(Debug)]
pub struct DataLayer {
    config: DataLayerConfig,
    catalog: Arc<Catalog>,
    store: Box<dyn TableStore>,
    converter: UnitRegistry,
    atoms: AtomStore,
    forms: FormRegistry,
    parameters: ParameterStore,
    box_bounds: Option<BoxBounds>,
}

impl DataLayer {
    /// Opens a data layer over the built-in catalog.
    pub fn new(config: DataLayerConfig) -> Result<Self, DataLayerError> {
        Self::with_catalog(config, Arc::new(Catalog::default()))
    }

    #[instrument(skip_all, fields(name = %config.name, backend = %config.backend))]
    pub fn with_catalog(
        config: DataLayerConfig,
        catalog: Arc<Catalog>,
    ) -> Result<Self, DataLayerError> {
        let store = store::open(
            config.backend,
            &config.name,
            &config.store_location,
            config.persist,
        )?;
        info!("Opened data layer.");
        Ok(Self {
            atoms: AtomStore::new(Arc::clone(&catalog)),
            forms: FormRegistry::new(Arc::clone(&catalog)),
            parameters: ParameterStore::new(config.tolerance),
            converter: UnitRegistry::new(),
            box_bounds: None,
            store,
            catalog,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DataLayerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Releases the backend. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), DataLayerError> {
        debug!(name = %self.config.name, "Closing data layer.");
        Ok(self.store.close()?)
    }

    // ---- Tables ----

    /// Backend tables, excluding the ones added through [`add_other`](Self::add_other).
    pub fn list_tables(&self) -> Vec<String> {
        self.store
            .list_tables()
            .into_iter()
            .filter(|t| !t.starts_with(OTHER_PREFIX))
            .collect()
    }

    /// Keys of tables added through [`add_other`](Self::add_other).
    pub fn list_other_tables(&self) -> Vec<String> {
        self.store
            .list_tables()
            .into_iter()
            .filter_map(|t| t.strip_prefix(OTHER_PREFIX).map(str::to_string))
            .collect()
    }

    pub fn add_other(&mut self, key: &str, table: &Table) -> Result<bool, DataLayerError> {
        self.store
            .add_table(&format!("{}{}", OTHER_PREFIX, key), table)?;
        Ok(true)
    }

    /// Reads one or more other tables joined column-wise by index.
    pub fn get_other<S: AsRef<str>>(&self, keys: &[S]) -> Result<Table, DataLayerError> {
        let mut joined: Option<Table> = None;
        for key in keys {
            let table = self
                .store
                .read_table(&format!("{}{}", OTHER_PREFIX, key.as_ref()))?;
            joined = Some(match joined {
                None => table,
                Some(acc) => acc.join(&table)?,
            });
        }
        joined.ok_or_else(|| DataLayerError::Validation("no other tables requested".into()))
    }

    // ---- Atoms ----

    /// Stores atom properties by value, or as existing ids when `by_value` is false.
    pub fn add_atoms(
        &mut self,
        table: &Table,
        by_value: bool,
        units: &UnitMap,
    ) -> Result<bool, DataLayerError> {
        self.atoms
            .add_atoms(self.store.as_mut(), table, by_value, units, &self.converter)
    }

    pub fn get_atoms<S: AsRef<str>>(
        &self,
        properties: &[S],
        by_value: bool,
        units: &UnitMap,
    ) -> Result<Table, DataLayerError> {
        self.atoms
            .get_atoms(self.store.as_ref(), properties, by_value, units, &self.converter)
    }

    pub fn atom_count(&self) -> Result<usize, DataLayerError> {
        self.atoms.atom_count(self.store.as_ref())
    }

    /// The id to value map of a shared atom property such as `charge`.
    pub fn atom_uids(&self, property: &str) -> Result<BTreeMap<i64, Vec<Scalar>>, DataLayerError> {
        self.atoms.uids(property)
    }

    // ---- Functional forms and parameters ----

    pub fn register_functional_form(
        &mut self,
        order: impl OrderKey,
        name: &str,
        definition: FormDefinition,
    ) -> Result<(), DataLayerError> {
        self.forms.register(order.to_order()?, name, definition)
    }

    pub fn functional_form(
        &self,
        order: impl OrderKey,
        name: &str,
    ) -> Result<&FunctionalForm, DataLayerError> {
        self.forms.get(order.to_order()?, name)
    }

    pub fn functional_forms(&self, order: impl OrderKey) -> Result<Vec<String>, DataLayerError> {
        Ok(self.forms.names(order.to_order()?))
    }

    /// Records a parameter set of a registered functional form and returns its uid.
    pub fn add_parameters(
        &mut self,
        order: impl OrderKey,
        form_name: &str,
        values: impl Into<ParameterValues>,
        uid: Option<i64>,
        units: &UnitMap,
    ) -> Result<i64, DataLayerError> {
        let order = order.to_order()?;
        let form = self.forms.get(order, form_name)?;
        self.parameters
            .add(order, form_name, form, &values.into(), uid, units)
    }

    pub fn parameter(&self, order: impl OrderKey, uid: i64) -> Result<&ParameterEntry, DataLayerError> {
        self.parameters.get(order.to_order()?, uid)
    }

    /// Named parameter values of `uid`, converted to `units` where given.
    pub fn get_parameter(
        &self,
        order: impl OrderKey,
        uid: i64,
        units: &UnitMap,
    ) -> Result<BTreeMap<String, f64>, DataLayerError> {
        let order = order.to_order()?;
        let entry = self.parameters.get(order, uid)?;
        let form = self.forms.get(order, &entry.form)?;
        self.parameters
            .get_converted(order, uid, form, units, &self.converter)
    }

    /// Parameter uids of `order`, ascending.
    pub fn parameter_uids(&self, order: impl OrderKey) -> Result<Vec<i64>, DataLayerError> {
        Ok(self.parameters.uids(order.to_order()?))
    }

    pub fn parameter_count(&self, order: impl OrderKey) -> Result<usize, DataLayerError> {
        Ok(self.parameters.len(order.to_order()?))
    }

    // ---- Terms ----

    pub fn add_terms(&mut self, order: impl OrderKey, table: &Table) -> Result<bool, DataLayerError> {
        terms::add_terms(self.store.as_mut(), order.to_order()?, table)
    }

    pub fn read_terms(&self, order: impl OrderKey) -> Result<Table, DataLayerError> {
        terms::read_terms(self.store.as_ref(), order.to_order()?)
    }

    pub fn add_bonds(&mut self, table: &Table) -> Result<bool, DataLayerError> {
        self.add_terms(TermOrder::BOND, table)
    }

    pub fn get_bonds(&self) -> Result<Table, DataLayerError> {
        self.read_terms(TermOrder::BOND)
    }

    pub fn add_angles(&mut self, table: &Table) -> Result<bool, DataLayerError> {
        self.add_terms(TermOrder::ANGLE, table)
    }

    pub fn get_angles(&self) -> Result<Table, DataLayerError> {
        self.read_terms(TermOrder::ANGLE)
    }

    pub fn add_dihedrals(&mut self, table: &Table) -> Result<bool, DataLayerError> {
        self.add_terms(TermOrder::DIHEDRAL, table)
    }

    pub fn get_dihedrals(&self) -> Result<Table, DataLayerError> {
        self.read_terms(TermOrder::DIHEDRAL)
    }

    pub fn term_count(&self, order: impl OrderKey) -> Result<TermCount, DataLayerError> {
        terms::term_count(self.store.as_ref(), order.to_order()?)
    }

    /// `term_index` values of `order` with no stored parameters.
    pub fn dangling_term_indices(&self, order: impl OrderKey) -> Result<Vec<i64>, DataLayerError> {
        let order = order.to_order()?;
        terms::dangling(self.store.as_ref(), order, &self.parameters.uids(order))
    }

    // ---- Box ----

    pub fn set_box_size(&mut self, bounds: BoxBounds) {
        self.box_bounds = Some(bounds);
    }

    pub fn box_size(&self) -> Option<BoxBounds> {
        self.box_bounds
    }

    // ---- Dispatch ----

    /// Runs a named command.
    ///
    /// `NYI` accepts any payload and returns `false` without storing anything.
    pub fn call(&mut self, name: &str, payload: Payload) -> Result<bool, DataLayerError> {
        let command: Command = name.parse()?;
        debug!(command = %command, payload = payload.kind(), "Dispatching command.");
        match command {
            Command::AddAtoms => {
                let table = payload.into_table(command)?;
                self.add_atoms(&table, true, &UnitMap::new())
            }
            Command::AddBonds => self.add_bonds(&payload.into_table(command)?),
            Command::AddAngles => self.add_angles(&payload.into_table(command)?),
            Command::AddDihedrals => self.add_dihedrals(&payload.into_table(command)?),
            Command::AddOther => {
                let (key, table) = payload.into_keyed(command)?;
                self.add_other(&key, &table)
            }
            Command::NotYetImplemented => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{Backend, StoreError};
    use crate::engine::config::DataLayerConfigBuilder;
    use crate::engine::terms::TERM_INDEX;
    use nalgebra::Point3;
    use tempfile::tempdir;

    fn layer() -> DataLayer {
        DataLayer::new(DataLayerConfig::in_memory("test")).unwrap()
    }

    fn harmonic_units() -> UnitMap {
        [
            ("K".to_string(), "kcal / mol / angstrom ** 2".to_string()),
            ("R0".to_string(), "angstrom".to_string()),
        ]
        .into()
    }

    fn with_harmonic_bonds() -> DataLayer {
        let mut dl = layer();
        dl.register_functional_form(2, "harmonic", FormDefinition::Builtin(harmonic_units()))
            .unwrap();
        dl
    }

    fn bonds(rows: &[(i64, i64, i64)]) -> Table {
        Table::with_range_index(rows.len())
            .with_column("atom1", rows.iter().map(|r| r.0).collect::<Vec<_>>())
            .unwrap()
            .with_column("atom2", rows.iter().map(|r| r.1).collect::<Vec<_>>())
            .unwrap()
            .with_column(TERM_INDEX, rows.iter().map(|r| r.2).collect::<Vec<_>>())
            .unwrap()
    }

    #[test]
    fn identical_parameters_are_deduplicated() {
        let mut dl = with_harmonic_bonds();
        let none = UnitMap::new();
        assert_eq!(dl.add_parameters(2, "harmonic", [4.0, 5.0], None, &none).unwrap(), 0);
        assert_eq!(dl.add_parameters(2, "harmonic", [4.0, 5.0], None, &none).unwrap(), 0);
        assert_eq!(dl.parameter_count("bonds").unwrap(), 1);
        assert_eq!(dl.add_parameters(2, "harmonic", [4.0, 6.0], None, &none).unwrap(), 1);
        assert_eq!(dl.add_parameters(2, "harmonic", [5.0, 5.0], None, &none).unwrap(), 2);
        assert_eq!(dl.parameter_uids(2).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn parameters_require_a_registered_form() {
        let mut dl = layer();
        assert!(matches!(
            dl.add_parameters(2, "harmonic", [4.0, 5.0], None, &UnitMap::new()),
            Err(DataLayerError::NotRegistered { order: 2, .. })
        ));
    }

    #[test]
    fn unknown_order_keys_are_rejected() {
        let mut dl = layer();
        assert!(matches!(
            dl.register_functional_form("impropers", "harmonic", FormDefinition::Builtin(harmonic_units())),
            Err(DataLayerError::UnknownOrder(_))
        ));
        assert!(matches!(dl.term_count(9), Err(DataLayerError::UnknownOrder(_))));
    }

    #[test]
    fn get_parameter_converts_units() {
        let mut dl = with_harmonic_bonds();
        let uid = dl
            .add_parameters(2, "harmonic", [1.0, 2.0], None, &UnitMap::new())
            .unwrap();
        let target: UnitMap = [("K".to_string(), "kJ / mol / nm ** 2".to_string())].into();
        let values = dl.get_parameter(2, uid, &target).unwrap();
        assert!((values["K"] - 418.4).abs() < 1e-9);
        assert_eq!(values["R0"], 2.0);
    }

    #[test]
    fn dangling_term_references_are_reported() {
        let mut dl = with_harmonic_bonds();
        dl.add_bonds(&bonds(&[(0, 1, 0), (0, 2, 1)])).unwrap();
        assert_eq!(dl.dangling_term_indices(2).unwrap(), vec![0, 1]);
        dl.add_parameters(2, "harmonic", [1.0, 1.0], Some(1), &UnitMap::new())
            .unwrap();
        assert_eq!(dl.dangling_term_indices(2).unwrap(), vec![0]);
        let count = dl.term_count(2).unwrap();
        assert_eq!(count.total, 2);
        assert_eq!(count.per_uid.len(), 2);
    }

    #[test]
    fn other_tables_are_hidden_from_list_tables() {
        let mut dl = layer();
        let notes = Table::with_range_index(2).with_column("weight", vec![1.0, 2.0]).unwrap();
        dl.add_other("notes", &notes).unwrap();
        dl.add_bonds(&bonds(&[(0, 1, 0)])).unwrap();
        assert_eq!(dl.list_tables(), vec!["term2"]);
        assert_eq!(dl.list_other_tables(), vec!["notes"]);
        assert_eq!(dl.get_other(&["notes"]).unwrap(), notes);
    }

    #[test]
    fn call_routes_commands_and_checks_payloads() {
        let mut dl = layer();
        assert!(dl.call("add_bonds", Payload::Table(bonds(&[(0, 1, 0)]))).unwrap());
        assert_eq!(dl.get_bonds().unwrap().len(), 1);
        assert!(!dl.call("NYI", Payload::Empty).unwrap());
        assert!(matches!(
            dl.call("add_impropers", Payload::Empty),
            Err(DataLayerError::UnknownCommand(_))
        ));
        assert!(matches!(
            dl.call("add_atoms", Payload::Empty),
            Err(DataLayerError::TypeMismatch { .. })
        ));
        let keyed = Payload::Keyed {
            key: "box".into(),
            table: Table::with_range_index(1).with_column("x", vec![1.0]).unwrap(),
        };
        assert!(dl.call("add_other", keyed).unwrap());
        assert_eq!(dl.list_other_tables(), vec!["box"]);
    }

    #[test]
    fn box_size_is_stored() {
        let mut dl = layer();
        assert!(dl.box_size().is_none());
        let bounds = BoxBounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        dl.set_box_size(bounds);
        assert_eq!(dl.box_size(), Some(bounds));
    }

    #[test]
    fn close_is_idempotent_and_blocks_access() {
        let mut dl = layer();
        dl.add_bonds(&bonds(&[(0, 1, 0)])).unwrap();
        dl.close().unwrap();
        dl.close().unwrap();
        assert!(matches!(
            dl.get_bonds(),
            Err(DataLayerError::Store(StoreError::Closed))
        ));
    }

    #[test]
    fn disk_backend_deletes_or_keeps_its_directory() {
        let dir = tempdir().unwrap();
        for persist in [false, true] {
            let name = format!("water_{}", persist);
            let config = DataLayerConfigBuilder::new()
                .name(name.clone())
                .backend(Backend::Disk)
                .store_location(dir.path().to_path_buf())
                .persist(persist)
                .build()
                .unwrap();
            let mut dl = DataLayer::new(config).unwrap();
            dl.add_bonds(&bonds(&[(0, 1, 0)])).unwrap();
            assert_eq!(dl.get_bonds().unwrap().len(), 1);
            dl.close().unwrap();
            assert_eq!(dir.path().join(format!("{}.eex", name)).exists(), persist);
        }
    }
}
