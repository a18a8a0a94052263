use super::error::DataLayerError;
use crate::core::table::{DType, Scalar, Table};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use tracing::{debug, trace};

/// A value tuple used as a lookup key.
///
/// Floats are compared by their total order and hashed by bit pattern, with
/// `-0.0` folded into `0.0` so rounding never splits a group.
#[derive(Debug, Clone)]
pub struct ValueKey(Vec<Scalar>);

impl ValueKey {
    /// Builds a key, rounding float members to `decimals` places when given.
    pub fn new(values: &[Scalar], decimals: Option<u32>) -> Self {
        Self(
            values
                .iter()
                .map(|v| match *v {
                    Scalar::Float(x) => Scalar::Float(normalize(round(x, decimals))),
                    int => int,
                })
                .collect(),
        )
    }

    pub fn values(&self) -> &[Scalar] {
        &self.0
    }
}

fn round(value: f64, decimals: Option<u32>) -> f64 {
    match decimals {
        Some(d) if value.is_finite() => {
            let scale = 10f64.powi(d as i32);
            let rounded = (value * scale).round() / scale;
            if rounded.is_finite() { rounded } else { value }
        }
        _ => value,
    }
}

fn normalize(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn cmp_scalar(a: &Scalar, b: &Scalar) -> Ordering {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => x.cmp(y),
        (Scalar::Float(x), Scalar::Float(y)) => x.total_cmp(y),
        (Scalar::Int(_), Scalar::Float(_)) => Ordering::Less,
        (Scalar::Float(_), Scalar::Int(_)) => Ordering::Greater,
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ValueKey {}

impl PartialOrd for ValueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            match cmp_scalar(a, b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            match value {
                Scalar::Int(v) => {
                    0u8.hash(state);
                    v.hash(state);
                }
                Scalar::Float(v) => {
                    1u8.hash(state);
                    v.to_bits().hash(state);
                }
            }
        }
    }
}

#[derive(Debug)]
struct PropertyIndex {
    uvals: HashMap<ValueKey, i64>,
    inv_uvals: BTreeMap<i64, ValueKey>,
    counter: i64,
}

impl PropertyIndex {
    fn new() -> Self {
        Self {
            uvals: HashMap::new(),
            inv_uvals: BTreeMap::new(),
            counter: -1,
        }
    }

    fn find_or_register(&mut self, key: ValueKey) -> i64 {
        if let Some(&id) = self.uvals.get(&key) {
            return id;
        }
        self.counter += 1;
        let id = self.counter;
        self.inv_uvals.insert(id, key.clone());
        self.uvals.insert(key, id);
        id
    }
}

/// Per-property bidirectional map between value tuples and integer ids.
///
/// Ids start at 0, grow monotonically and are never reused.
#[derive(Debug, Default)]
pub struct UniqueValueIndexer {
    properties: HashMap<String, PropertyIndex>,
}

impl UniqueValueIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `values`, assigning the next id when unseen.
    pub fn find_or_register(
        &mut self,
        property: &str,
        values: &[Scalar],
        decimals: Option<u32>,
    ) -> i64 {
        let id = self
            .properties
            .entry(property.to_string())
            .or_insert_with(PropertyIndex::new)
            .find_or_register(ValueKey::new(values, decimals));
        trace!(property, id, "Resolved value tuple to id.");
        id
    }

    /// Returns the value tuple stored under `id`.
    pub fn resolve(&self, property: &str, id: i64) -> Result<&[Scalar], DataLayerError> {
        self.properties
            .get(property)
            .and_then(|p| p.inv_uvals.get(&id))
            .map(ValueKey::values)
            .ok_or_else(|| {
                DataLayerError::NotFound(format!("id {} for atom property '{}'", id, property))
            })
    }

    /// Assigns an id to every row of `table`, using all of its columns as the
    /// value tuple. Within one call, previously unseen tuples are numbered in
    /// sorted order so the result does not depend on row order.
    pub fn index_rows(&mut self, property: &str, table: &Table, decimals: Option<u32>) -> Vec<i64> {
        let mut groups: BTreeMap<ValueKey, Vec<usize>> = BTreeMap::new();
        for row in 0..table.len() {
            groups
                .entry(ValueKey::new(&table.row(row), decimals))
                .or_default()
                .push(row);
        }

        let index = self
            .properties
            .entry(property.to_string())
            .or_insert_with(PropertyIndex::new);
        let before = index.counter;
        let mut ids = vec![0; table.len()];
        for (key, rows) in groups {
            let id = index.find_or_register(key);
            for row in rows {
                ids[row] = id;
            }
        }
        if index.counter > before {
            debug!(
                property,
                new_ids = index.counter - before,
                "Registered new unique values."
            );
        }
        ids
    }

    /// Rebuilds a value table from ids, with one column per `schema` entry.
    pub fn expand(
        &self,
        property: &str,
        index: Vec<i64>,
        ids: &[i64],
        schema: &[(String, DType)],
    ) -> Result<Table, DataLayerError> {
        let rows = ids
            .iter()
            .map(|&id| self.resolve(property, id).map(<[Scalar]>::to_vec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Table::from_rows(index, schema, &rows)?)
    }

    /// All `(id, values)` pairs of a property, in id order.
    pub fn entries(&self, property: &str) -> BTreeMap<i64, Vec<Scalar>> {
        self.properties
            .get(property)
            .map(|p| {
                p.inv_uvals
                    .iter()
                    .map(|(&id, key)| (id, key.values().to_vec()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, property: &str) -> usize {
        self.properties.get(property).map_or(0, |p| p.uvals.len())
    }
}
