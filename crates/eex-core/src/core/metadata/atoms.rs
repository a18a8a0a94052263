use crate::core::table::DType;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Describes how one atom property is stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomProperty {
    /// Input columns that together make up the property (e.g. `X`, `Y`, `Z`).
    pub required_columns: Vec<String>,
    pub dtype: DType,
    /// Decimal places kept when hashing float values for deduplication.
    #[serde(default)]
    pub decimals: Option<u32>,
    /// `true` when every atom carries its own value (stored raw);
    /// `false` when values are shared and stored as ids into a value table.
    pub unique: bool,
    /// Canonical unit the property is stored in, if it has one.
    #[serde(default)]
    pub unit: Option<String>,
}

impl AtomProperty {
    fn new(
        columns: &[&str],
        dtype: DType,
        decimals: Option<u32>,
        unique: bool,
        unit: Option<&str>,
    ) -> Self {
        Self {
            required_columns: columns.iter().map(|c| c.to_string()).collect(),
            dtype,
            decimals,
            unique,
            unit: unit.map(str::to_string),
        }
    }
}

pub(super) fn builtin_atom_properties() -> BTreeMap<String, AtomProperty> {
    BTreeMap::from([
        (
            "atom_type".to_string(),
            AtomProperty::new(&["atom_type"], DType::Int, None, true, None),
        ),
        (
            "charge".to_string(),
            AtomProperty::new(
                &["charge"],
                DType::Float,
                Some(10),
                false,
                Some("elementary_charge"),
            ),
        ),
        (
            "mass".to_string(),
            AtomProperty::new(&["mass"], DType::Float, Some(10), false, Some("amu")),
        ),
        (
            "molecule_index".to_string(),
            AtomProperty::new(&["molecule_index"], DType::Int, None, true, None),
        ),
        (
            "xyz".to_string(),
            AtomProperty::new(
                &["X", "Y", "Z"],
                DType::Float,
                None,
                true,
                Some("angstrom"),
            ),
        ),
    ])
}
