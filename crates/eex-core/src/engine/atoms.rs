use super::config::UnitMap;
use super::error::DataLayerError;
use super::indexer::UniqueValueIndexer;
use crate::core::metadata::{AtomProperty, Catalog};
use crate::core::store::TableStore;
use crate::core::table::{Column, DType, Scalar, Table};
use crate::core::units::UnitConverter;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

pub const ATOM_INDEX: &str = "atom_index";

/// Per-property atom tables.
///
/// Properties flagged `unique` in the catalog are stored raw, one value per
/// atom. Shared properties (mass, charge) are compressed into ids through a
/// [`UniqueValueIndexer`] and stored as a single integer column named after
/// the property.
#[derive(Debug)]
pub struct AtomStore {
    catalog: Arc<Catalog>,
    indexer: UniqueValueIndexer,
}

impl AtomStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            indexer: UniqueValueIndexer::new(),
        }
    }

    fn property(&self, name: &str) -> Result<&AtomProperty, DataLayerError> {
        self.catalog
            .atom_property(&name.to_lowercase())
            .ok_or_else(|| DataLayerError::UnknownProperty(vec![name.to_string()]))
    }

    /// Stores one property from `table`, converting from `source_unit` to the
    /// property's canonical unit when both are known.
    pub fn store_by_value(
        &mut self,
        store: &mut dyn TableStore,
        property: &str,
        table: &Table,
        source_unit: Option<&str>,
        converter: &dyn UnitConverter,
    ) -> Result<bool, DataLayerError> {
        let name = property.to_lowercase();
        let meta = self.property(&name)?.clone();

        let mut data = coerce(table.select(&meta.required_columns)?, &meta)?;
        if let (Some(from), Some(to), DType::Float) = (source_unit, meta.unit.as_deref(), meta.dtype)
        {
            let factor = converter.conversion_factor(from, to)?;
            if factor != 1.0 {
                data.scale(&meta.required_columns, factor)?;
            }
        }

        let stored = if meta.unique {
            data.named_index(ATOM_INDEX)
        } else {
            let ids = self.indexer.index_rows(&name, &data, meta.decimals);
            Table::new(data.index().to_vec())
                .named_index(ATOM_INDEX)
                .with_column(name.clone(), ids)?
        };

        store.add_table(&name, &stored)?;
        debug!(property = %name, rows = stored.len(), "Stored atom property.");
        Ok(true)
    }

    /// Stores one property whose shared values are already given as indexer
    /// ids, in an integer column named after the property.
    ///
    /// Every id must have been registered by an earlier by-value store.
    /// Unique properties have no ids and are stored raw.
    pub fn store_by_index(
        &mut self,
        store: &mut dyn TableStore,
        property: &str,
        table: &Table,
    ) -> Result<bool, DataLayerError> {
        let name = property.to_lowercase();
        let meta = self.property(&name)?.clone();
        if meta.unique {
            let data = coerce(table.select(&meta.required_columns)?, &meta)?;
            store.add_table(&name, &data.named_index(ATOM_INDEX))?;
            return Ok(true);
        }

        let ids = table
            .column(&name)
            .and_then(Column::as_ints)
            .ok_or_else(|| DataLayerError::TypeMismatch {
                expected: format!("integer id column '{}'", name),
                found: "missing or float column".to_string(),
            })?;
        for &id in ids {
            self.indexer.resolve(&name, id)?;
        }

        let stored = Table::new(table.index().to_vec())
            .named_index(ATOM_INDEX)
            .with_column(name.clone(), ids.to_vec())?;
        store.add_table(&name, &stored)?;
        debug!(property = %name, rows = stored.len(), "Stored atom property ids.");
        Ok(true)
    }

    /// Reads one property.
    ///
    /// Shared properties are expanded to their values when `by_value` is set and
    /// returned as raw ids otherwise. Values are converted to `target_unit` when
    /// given; ids are never converted.
    pub fn read(
        &self,
        store: &dyn TableStore,
        property: &str,
        by_value: bool,
        target_unit: Option<&str>,
        converter: &dyn UnitConverter,
    ) -> Result<Table, DataLayerError> {
        let name = property.to_lowercase();
        let meta = self.property(&name)?;
        let stored = store.read_table(&name)?;

        let mut table = if meta.unique || !by_value {
            stored
        } else {
            let ids = stored
                .column(&name)
                .and_then(Column::as_ints)
                .ok_or_else(|| DataLayerError::TypeMismatch {
                    expected: format!("integer id column '{}'", name),
                    found: "missing or float column".to_string(),
                })?;
            let schema: Vec<(String, DType)> = meta
                .required_columns
                .iter()
                .map(|c| (c.clone(), meta.dtype))
                .collect();
            self.indexer
                .expand(&name, stored.index().to_vec(), ids, &schema)?
                .named_index(ATOM_INDEX)
        };

        if meta.unique || by_value {
            if let (Some(to), Some(from), DType::Float) = (target_unit, meta.unit.as_deref(), meta.dtype)
            {
                let factor = converter.conversion_factor(from, to)?;
                if factor != 1.0 {
                    table.scale(&meta.required_columns, factor)?;
                }
            }
        }
        Ok(table)
    }

    /// Stores every catalog property whose columns are all present in `table`.
    ///
    /// Rows are keyed by an `atom_index` column when present, otherwise by the
    /// table's own index. Columns matching no property are ignored. When
    /// `by_value` is false, shared properties are read as ids from a column
    /// named after the property and `units` is not consulted.
    pub fn add_atoms(
        &mut self,
        store: &mut dyn TableStore,
        table: &Table,
        by_value: bool,
        units: &UnitMap,
        converter: &dyn UnitConverter,
    ) -> Result<bool, DataLayerError> {
        let table = if table.column(ATOM_INDEX).is_some() {
            table.clone().set_index(ATOM_INDEX)?
        } else {
            table.clone()
        };

        let matched: Vec<String> = self
            .catalog
            .atom_properties()
            .filter(|(name, meta)| {
                if by_value || meta.unique {
                    table.has_columns(&meta.required_columns)
                } else {
                    table.column(name).is_some()
                }
            })
            .map(|(name, _)| name.to_string())
            .collect();
        if matched.is_empty() {
            return Err(DataLayerError::NoMatchingProperties(
                table.column_names().map(str::to_string).collect(),
            ));
        }

        for name in &matched {
            if by_value {
                let unit = units.get(name).map(String::as_str);
                self.store_by_value(store, name, &table, unit, converter)?;
            } else {
                self.store_by_index(store, name, &table)?;
            }
        }
        debug!(atoms = table.len(), properties = ?matched, by_value, "Added atoms.");
        Ok(true)
    }

    /// Reads several properties joined column-wise by atom index.
    ///
    /// Every unknown property name is reported in a single error.
    pub fn get_atoms<S: AsRef<str>>(
        &self,
        store: &dyn TableStore,
        properties: &[S],
        by_value: bool,
        units: &UnitMap,
        converter: &dyn UnitConverter,
    ) -> Result<Table, DataLayerError> {
        let unknown: Vec<String> = properties
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| self.catalog.atom_property(&p.to_lowercase()).is_none())
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(DataLayerError::UnknownProperty(unknown));
        }

        let mut joined: Option<Table> = None;
        for property in properties {
            let property = property.as_ref();
            let unit = units
                .get(property)
                .or_else(|| units.get(&property.to_lowercase()))
                .map(String::as_str);
            let table = self.read(store, property, by_value, unit, converter)?;
            joined = Some(match joined {
                None => table,
                Some(acc) => acc.join(&table)?,
            });
        }
        joined.ok_or_else(|| DataLayerError::Validation("no atom properties requested".into()))
    }

    /// Number of distinct atom indices across all stored properties.
    pub fn atom_count(&self, store: &dyn TableStore) -> Result<usize, DataLayerError> {
        let mut atoms = BTreeSet::new();
        for (name, _) in self.catalog.atom_properties() {
            if store.contains(name) {
                atoms.extend(store.read_table(name)?.index().iter().copied());
            }
        }
        Ok(atoms.len())
    }

    /// The id to value map of a shared property.
    pub fn uids(&self, property: &str) -> Result<BTreeMap<i64, Vec<Scalar>>, DataLayerError> {
        let meta = self.property(property)?;
        if meta.unique {
            return Err(DataLayerError::Validation(format!(
                "atom property '{}' is stored by value and has no ids",
                property
            )));
        }
        Ok(self.indexer.entries(&property.to_lowercase()))
    }
}

fn coerce(table: Table, meta: &AtomProperty) -> Result<Table, DataLayerError> {
    match meta.dtype {
        DType::Float => Ok(table.into_float()),
        DType::Int => {
            if let Some((name, _)) = table.columns().find(|(_, c)| c.dtype() == DType::Float) {
                return Err(DataLayerError::TypeMismatch {
                    expected: format!("integer values for column '{}'", name),
                    found: "float".to_string(),
                });
            }
            Ok(table)
        }
    }
}
