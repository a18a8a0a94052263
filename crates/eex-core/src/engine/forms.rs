use super::config::UnitMap;
use super::error::DataLayerError;
use crate::core::metadata::{Catalog, FunctionalForm, TermOrder};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// How a functional form is supplied at registration.
#[derive(Debug, Clone, PartialEq)]
pub enum FormDefinition {
    /// A complete user-defined form. Each name may be registered this way once.
    Explicit(FunctionalForm),
    /// A built-in form looked up in the catalog, with the units the caller's
    /// parameters will be expressed in. May overwrite an earlier registration.
    Builtin(UnitMap),
}

/// The functional forms in use, per term order.
#[derive(Debug)]
pub struct FormRegistry {
    catalog: Arc<Catalog>,
    forms: BTreeMap<TermOrder, BTreeMap<String, FunctionalForm>>,
}

impl FormRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            forms: BTreeMap::new(),
        }
    }

    pub fn register(
        &mut self,
        order: TermOrder,
        name: &str,
        definition: FormDefinition,
    ) -> Result<(), DataLayerError> {
        let form = match definition {
            FormDefinition::Explicit(form) => {
                if self.is_registered(order, name) {
                    return Err(DataLayerError::AlreadyRegistered {
                        order: order.value(),
                        name: name.to_string(),
                    });
                }
                form
            }
            FormDefinition::Builtin(units) => {
                if units.is_empty() {
                    return Err(DataLayerError::Validation(format!(
                        "functional form '{}' needs either a full definition or parameter units",
                        name
                    )));
                }
                let mut form = self
                    .catalog
                    .builtin_form(order, name)
                    .cloned()
                    .ok_or_else(|| {
                        DataLayerError::NotFound(format!(
                            "built-in functional form '{}' for order {}",
                            name, order
                        ))
                    })?;
                for (parameter, unit) in units {
                    if form.parameter_position(&parameter).is_none() {
                        return Err(DataLayerError::Validation(format!(
                            "functional form '{}' has no parameter '{}'",
                            name, parameter
                        )));
                    }
                    form.units.insert(parameter, unit);
                }
                form
            }
        };

        validate(name, &form)?;
        info!(order = %order, form = name, "Registered functional form.");
        self.forms
            .entry(order)
            .or_default()
            .insert(name.to_string(), form);
        Ok(())
    }

    pub fn get(&self, order: TermOrder, name: &str) -> Result<&FunctionalForm, DataLayerError> {
        self.forms
            .get(&order)
            .and_then(|forms| forms.get(name))
            .ok_or_else(|| DataLayerError::NotRegistered {
                order: order.value(),
                name: name.to_string(),
            })
    }

    pub fn is_registered(&self, order: TermOrder, name: &str) -> bool {
        self.forms
            .get(&order)
            .is_some_and(|forms| forms.contains_key(name))
    }

    pub fn names(&self, order: TermOrder) -> Vec<String> {
        self.forms
            .get(&order)
            .map(|forms| forms.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Structural checks: at least one parameter, no duplicates, and exactly one
/// unit per parameter.
pub fn validate(name: &str, form: &FunctionalForm) -> Result<(), DataLayerError> {
    if form.parameters.is_empty() {
        return Err(DataLayerError::Validation(format!(
            "functional form '{}' declares no parameters",
            name
        )));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = form.parameters.iter().find(|p| !seen.insert(p.as_str())) {
        return Err(DataLayerError::Validation(format!(
            "functional form '{}' repeats parameter '{}'",
            name, dup
        )));
    }
    let declared: HashSet<&str> = form.units.keys().map(String::as_str).collect();
    if declared != seen {
        return Err(DataLayerError::Validation(format!(
            "units of functional form '{}' must name exactly its parameters [{}]",
            name,
            form.parameters.join(", ")
        )));
    }
    Ok(())
}
