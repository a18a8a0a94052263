use super::error::DataLayerError;
use crate::core::metadata::TermOrder;
use crate::core::store::TableStore;
use crate::core::table::{DType, Table};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const TERM_INDEX: &str = "term_index";

/// Size of a term table: the number of rows and how many rows use each uid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermCount {
    pub total: usize,
    pub per_uid: BTreeMap<i64, usize>,
}

/// Appends connectivity rows of `order` to its term table.
///
/// The table must carry `atom1`..`atomN` and `term_index` integer columns;
/// other columns are dropped. Row ids continue after the last stored row.
pub fn add_terms(
    store: &mut dyn TableStore,
    order: TermOrder,
    table: &Table,
) -> Result<bool, DataLayerError> {
    let mut columns = order.index_columns();
    let missing: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| table.column(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(DataLayerError::Validation(format!(
            "terms of order {} are missing columns [{}]",
            order,
            missing.join(", ")
        )));
    }
    if table.column(TERM_INDEX).is_none() {
        return Err(DataLayerError::NotImplemented(format!(
            "adding order {} terms without a '{}' column",
            order, TERM_INDEX
        )));
    }
    columns.push(TERM_INDEX.to_string());

    let projected = table.select(&columns)?;
    if let Some((name, _)) = projected.columns().find(|(_, c)| c.dtype() != DType::Int) {
        return Err(DataLayerError::TypeMismatch {
            expected: format!("integer column '{}'", name),
            found: "float".to_string(),
        });
    }

    let name = order.table_name();
    let start = if store.contains(&name) {
        store
            .read_table(&name)?
            .index()
            .iter()
            .max()
            .map_or(0, |m| m + 1)
    } else {
        0
    };
    let mut rows = Table::new((start..start + projected.len() as i64).collect());
    for (column_name, column) in projected.columns() {
        rows.insert_column(column_name, column.clone())?;
    }
    store.add_table(&name, &rows)?;
    debug!(order = %order, rows = rows.len(), "Added terms.");
    Ok(true)
}

/// Returns the stored term table of `order` as is.
pub fn read_terms(store: &dyn TableStore, order: TermOrder) -> Result<Table, DataLayerError> {
    Ok(store.read_table(&order.table_name())?)
}

/// Counts the rows of `order`; a missing table counts as empty.
pub fn term_count(store: &dyn TableStore, order: TermOrder) -> Result<TermCount, DataLayerError> {
    let name = order.table_name();
    if !store.contains(&name) {
        return Ok(TermCount::default());
    }
    let table = store.read_table(&name)?;
    let mut per_uid = BTreeMap::new();
    for &uid in term_uids(&table)? {
        *per_uid.entry(uid).or_insert(0) += 1;
    }
    Ok(TermCount {
        total: table.len(),
        per_uid,
    })
}

/// The `term_index` values of `order` absent from `known`, ascending.
pub fn dangling(
    store: &dyn TableStore,
    order: TermOrder,
    known: &[i64],
) -> Result<Vec<i64>, DataLayerError> {
    let known: BTreeSet<i64> = known.iter().copied().collect();
    let referenced: BTreeSet<i64> = term_count(store, order)?.per_uid.into_keys().collect();
    Ok(referenced.difference(&known).copied().collect())
}

fn term_uids(table: &Table) -> Result<&[i64], DataLayerError> {
    table
        .column(TERM_INDEX)
        .and_then(|c| c.as_ints())
        .ok_or_else(|| DataLayerError::TypeMismatch {
            expected: format!("integer column '{}'", TERM_INDEX),
            found: "missing or float column".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::core::table::Column;

    fn bonds(pairs: &[(i64, i64, i64)]) -> Table {
        Table::with_range_index(pairs.len())
            .with_column("atom1", pairs.iter().map(|p| p.0).collect::<Vec<_>>())
            .unwrap()
            .with_column("atom2", pairs.iter().map(|p| p.1).collect::<Vec<_>>())
            .unwrap()
            .with_column(TERM_INDEX, pairs.iter().map(|p| p.2).collect::<Vec<_>>())
            .unwrap()
    }

    #[test]
    fn rows_are_appended_with_continuing_ids() {
        let mut store = MemoryStore::new();
        add_terms(&mut store, TermOrder::BOND, &bonds(&[(1, 2, 0), (1, 3, 0)])).unwrap();
        add_terms(&mut store, TermOrder::BOND, &bonds(&[(4, 5, 1)])).unwrap();
        let table = read_terms(&store, TermOrder::BOND).unwrap();
        assert_eq!(table.index(), &[0, 1, 2]);
        assert_eq!(table.column("atom2"), Some(&Column::Int(vec![2, 3, 5])));
    }

    #[test]
    fn extra_columns_are_dropped() {
        let mut store = MemoryStore::new();
        let table = bonds(&[(1, 2, 0)]).with_column("note", vec![1.5]).unwrap();
        add_terms(&mut store, TermOrder::BOND, &table).unwrap();
        let stored = read_terms(&store, TermOrder::BOND).unwrap();
        assert_eq!(
            stored.column_names().collect::<Vec<_>>(),
            vec!["atom1", "atom2", TERM_INDEX]
        );
    }

    #[test]
    fn missing_atom_columns_are_named() {
        let mut store = MemoryStore::new();
        match add_terms(&mut store, TermOrder::ANGLE, &bonds(&[(1, 2, 0)])) {
            Err(DataLayerError::Validation(message)) => assert!(message.contains("atom3")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_term_index_is_not_implemented() {
        let mut store = MemoryStore::new();
        let table = bonds(&[(1, 2, 0)]).select(&["atom1", "atom2"]).unwrap();
        assert!(matches!(
            add_terms(&mut store, TermOrder::BOND, &table),
            Err(DataLayerError::NotImplemented(_))
        ));
    }

    #[test]
    fn float_atom_columns_are_a_type_mismatch() {
        let mut store = MemoryStore::new();
        let table = Table::with_range_index(1)
            .with_column("atom1", vec![1.0])
            .unwrap()
            .with_column("atom2", vec![2i64])
            .unwrap()
            .with_column(TERM_INDEX, vec![0i64])
            .unwrap();
        assert!(matches!(
            add_terms(&mut store, TermOrder::BOND, &table),
            Err(DataLayerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn term_count_histograms_uids() {
        let mut store = MemoryStore::new();
        assert_eq!(term_count(&store, TermOrder::BOND).unwrap().total, 0);
        add_terms(&mut store, TermOrder::BOND, &bonds(&[(1, 2, 0), (1, 3, 0), (4, 5, 3)])).unwrap();
        let count = term_count(&store, TermOrder::BOND).unwrap();
        assert_eq!(count.total, 3);
        assert_eq!(count.per_uid, BTreeMap::from([(0, 2), (3, 1)]));
        assert_eq!(dangling(&store, TermOrder::BOND, &[0, 1]).unwrap(), vec![3]);
    }
}
