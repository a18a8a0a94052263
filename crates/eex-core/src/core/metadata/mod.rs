//! # Metadata Catalogs
//!
//! Immutable descriptions of the atom properties and bonded-term functional forms
//! the data layer understands. A [`Catalog`] is built once (either the built-in
//! default or loaded from a TOML file) and shared by reference with every store.
//!
//! ## TOML layout
//!
//! ```toml
//! [atom_properties.charge]
//! required_columns = ["charge"]
//! dtype = "float"
//! decimals = 10
//! unique = false
//! unit = "elementary_charge"
//!
//! [terms.bonds.harmonic]
//! expression = "K*(r-R0)**2"
//! parameters = ["K", "R0"]
//! units = { K = "kcal / mol / angstrom ** 2", R0 = "angstrom" }
//! ```

pub mod atoms;
pub mod terms;

pub use atoms::AtomProperty;
pub use terms::{FunctionalForm, OrderKey, TermOrder, UnknownOrderError};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid term order in '{path}': {source}")]
    InvalidOrder {
        path: String,
        source: UnknownOrderError,
    },
    #[error("Invalid atom property '{name}' in '{path}': {reason}")]
    InvalidProperty {
        path: String,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default)]
    atom_properties: BTreeMap<String, AtomProperty>,
    #[serde(default)]
    terms: BTreeMap<String, BTreeMap<String, FunctionalForm>>,
}

/// Static metadata about atom properties and built-in functional forms.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    atom_properties: BTreeMap<String, AtomProperty>,
    forms: BTreeMap<TermOrder, BTreeMap<String, FunctionalForm>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            atom_properties: atoms::builtin_atom_properties(),
            forms: terms::builtin_forms(),
        }
    }
}

impl Catalog {
    pub fn new(
        atom_properties: BTreeMap<String, AtomProperty>,
        forms: BTreeMap<TermOrder, BTreeMap<String, FunctionalForm>>,
    ) -> Self {
        Self {
            atom_properties,
            forms,
        }
    }

    pub fn load(path: &Path) -> Result<Self, CatalogLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogLoadError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, path: &str) -> Result<Self, CatalogLoadError> {
        let raw: RawCatalog = toml::from_str(content).map_err(|e| CatalogLoadError::Toml {
            path: path.to_string(),
            source: e,
        })?;

        for (name, property) in &raw.atom_properties {
            if property.required_columns.is_empty() {
                return Err(CatalogLoadError::InvalidProperty {
                    path: path.to_string(),
                    name: name.clone(),
                    reason: "required_columns must not be empty".to_string(),
                });
            }
        }

        let mut forms: BTreeMap<TermOrder, BTreeMap<String, FunctionalForm>> =
            TermOrder::all().map(|o| (o, BTreeMap::new())).collect();
        for (key, named_forms) in raw.terms {
            let order: TermOrder = key.parse().map_err(|e| CatalogLoadError::InvalidOrder {
                path: path.to_string(),
                source: e,
            })?;
            forms.entry(order).or_default().extend(named_forms);
        }

        Ok(Self {
            atom_properties: raw
                .atom_properties
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            forms,
        })
    }

    pub fn atom_property(&self, name: &str) -> Option<&AtomProperty> {
        self.atom_properties.get(name)
    }

    pub fn atom_properties(&self) -> impl Iterator<Item = (&str, &AtomProperty)> {
        self.atom_properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn builtin_form(&self, order: TermOrder, name: &str) -> Option<&FunctionalForm> {
        self.forms.get(&order).and_then(|forms| forms.get(name))
    }

    pub fn builtin_forms(&self, order: TermOrder) -> impl Iterator<Item = (&str, &FunctionalForm)> {
        self.forms
            .get(&order)
            .into_iter()
            .flat_map(|forms| forms.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::DType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn default_catalog_describes_standard_atom_properties() {
        let catalog = Catalog::default();
        let xyz = catalog.atom_property("xyz").unwrap();
        assert_eq!(xyz.required_columns, vec!["X", "Y", "Z"]);
        assert!(xyz.unique);
        let charge = catalog.atom_property("charge").unwrap();
        assert!(!charge.unique);
        assert_eq!(charge.dtype, DType::Float);
        assert!(catalog.atom_property("bogus").is_none());
    }

    #[test]
    fn default_catalog_has_builtin_harmonic_bond() {
        let catalog = Catalog::default();
        let form = catalog.builtin_form(TermOrder::BOND, "harmonic").unwrap();
        assert_eq!(form.parameters, vec!["K", "R0"]);
        assert!(catalog.builtin_form(TermOrder::BOND, "nonexistent").is_none());
        assert_eq!(catalog.builtin_forms(TermOrder::new(6).unwrap()).count(), 0);
    }

    #[test]
    fn load_succeeds_with_valid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        fs::write(
            &path,
            r#"
            [atom_properties.Charge]
            required_columns = ["charge"]
            dtype = "float"
            decimals = 6
            unique = false
            unit = "elementary_charge"

            [terms.bonds.harmonic]
            expression = "K*(r-R0)**2"
            parameters = ["K", "R0"]
            units = { K = "kcal / mol / angstrom ** 2", R0 = "angstrom" }

            [terms.5.custom]
            expression = "0"
            parameters = ["A"]
            "#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.atom_property("charge").unwrap().decimals, Some(6));
        assert!(catalog.builtin_form(TermOrder::BOND, "harmonic").is_some());
        assert!(
            catalog
                .builtin_form(TermOrder::new(5).unwrap(), "custom")
                .is_some()
        );
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = Catalog::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(CatalogLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let result = Catalog::from_toml_str("this is not toml");
        assert!(matches!(result, Err(CatalogLoadError::Toml { .. })));
    }

    #[test]
    fn load_fails_for_unknown_order() {
        let result = Catalog::from_toml_str(
            r#"
            [terms.impropers.harmonic]
            expression = "K"
            parameters = ["K"]
            "#,
        );
        assert!(matches!(result, Err(CatalogLoadError::InvalidOrder { .. })));
    }

    #[test]
    fn load_fails_for_property_without_columns() {
        let result = Catalog::from_toml_str(
            r#"
            [atom_properties.empty]
            required_columns = []
            dtype = "int"
            unique = true
            "#,
        );
        assert!(matches!(
            result,
            Err(CatalogLoadError::InvalidProperty { .. })
        ));
    }
}
