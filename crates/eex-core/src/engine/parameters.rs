use super::config::{Tolerance, UnitMap};
use super::error::DataLayerError;
use crate::core::metadata::{FunctionalForm, TermOrder};
use crate::core::units::UnitConverter;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Parameter values as supplied by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValues {
    /// Values in the form's canonical parameter order.
    Positional(Vec<f64>),
    /// Values keyed by parameter name.
    Named(BTreeMap<String, f64>),
}

impl From<Vec<f64>> for ParameterValues {
    fn from(values: Vec<f64>) -> Self {
        ParameterValues::Positional(values)
    }
}

impl From<&[f64]> for ParameterValues {
    fn from(values: &[f64]) -> Self {
        ParameterValues::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for ParameterValues {
    fn from(values: [f64; N]) -> Self {
        ParameterValues::Positional(values.to_vec())
    }
}

impl From<BTreeMap<String, f64>> for ParameterValues {
    fn from(values: BTreeMap<String, f64>) -> Self {
        ParameterValues::Named(values)
    }
}

impl ParameterValues {
    /// Validates the values against `form` and returns them in canonical order.
    pub fn ordered(&self, form_name: &str, form: &FunctionalForm) -> Result<Vec<f64>, DataLayerError> {
        match self {
            ParameterValues::Positional(values) => {
                if values.len() != form.parameters.len() {
                    return Err(DataLayerError::Validation(format!(
                        "functional form '{}' takes {} parameters, got {}",
                        form_name,
                        form.parameters.len(),
                        values.len()
                    )));
                }
                Ok(values.clone())
            }
            ParameterValues::Named(values) => {
                if let Some(extra) = values.keys().find(|k| form.parameter_position(k).is_none()) {
                    return Err(DataLayerError::Validation(format!(
                        "functional form '{}' has no parameter '{}'",
                        form_name, extra
                    )));
                }
                form.parameters
                    .iter()
                    .map(|p| {
                        values.get(p).copied().ok_or_else(|| {
                            DataLayerError::Validation(format!(
                                "functional form '{}' is missing parameter '{}'",
                                form_name, p
                            ))
                        })
                    })
                    .collect()
            }
        }
    }
}

/// One stored parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterEntry {
    pub form: String,
    pub values: Vec<f64>,
}

/// Deduplicated term parameters keyed by uid, per term order.
#[derive(Debug)]
pub struct ParameterStore {
    tolerance: Tolerance,
    entries: BTreeMap<TermOrder, BTreeMap<i64, ParameterEntry>>,
}

impl ParameterStore {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            entries: BTreeMap::new(),
        }
    }

    /// Records a parameter set and returns its uid.
    ///
    /// Without `uid`, an existing set of the same form with close values is
    /// reused, otherwise the smallest unused uid is assigned. With `uid`, a free
    /// uid is taken as given and an occupied one must hold matching values.
    pub fn add(
        &mut self,
        order: TermOrder,
        form_name: &str,
        form: &FunctionalForm,
        values: &ParameterValues,
        uid: Option<i64>,
        units: &UnitMap,
    ) -> Result<i64, DataLayerError> {
        if !units.is_empty() {
            return Err(DataLayerError::NotImplemented(
                "unit conversion of parameters on input".to_string(),
            ));
        }
        let values = values.ordered(form_name, form)?;
        let tolerance = self.tolerance;
        let entries = self.entries.entry(order).or_default();

        let is_match =
            |e: &ParameterEntry| e.form == form_name && tolerance.all_close(&e.values, &values);

        match uid {
            None => {
                if let Some((&existing, _)) = entries.iter().find(|(_, e)| is_match(e)) {
                    debug!(order = %order, uid = existing, "Reusing matching parameters.");
                    return Ok(existing);
                }
                let uid = smallest_unused(entries);
                info!(order = %order, uid, form = form_name, "Stored new term parameters.");
                entries.insert(
                    uid,
                    ParameterEntry {
                        form: form_name.to_string(),
                        values,
                    },
                );
                Ok(uid)
            }
            Some(uid) if uid < 0 => Err(DataLayerError::Validation(format!(
                "uid must be non-negative, got {}",
                uid
            ))),
            Some(uid) => match entries.get(&uid) {
                Some(existing) if is_match(existing) => Ok(uid),
                Some(_) => Err(DataLayerError::UidConflict {
                    order: order.value(),
                    uid,
                }),
                None => {
                    info!(order = %order, uid, form = form_name, "Stored term parameters under explicit uid.");
                    entries.insert(
                        uid,
                        ParameterEntry {
                            form: form_name.to_string(),
                            values,
                        },
                    );
                    Ok(uid)
                }
            },
        }
    }

    pub fn get(&self, order: TermOrder, uid: i64) -> Result<&ParameterEntry, DataLayerError> {
        self.entries
            .get(&order)
            .and_then(|e| e.get(&uid))
            .ok_or_else(|| {
                DataLayerError::NotFound(format!("parameters with uid {} for order {}", uid, order))
            })
    }

    /// Uids in ascending order.
    pub fn uids(&self, order: TermOrder) -> Vec<i64> {
        self.entries
            .get(&order)
            .map(|e| e.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, order: TermOrder) -> usize {
        self.entries.get(&order).map_or(0, BTreeMap::len)
    }

    /// Returns the named values of `uid`, converted from the form's units into
    /// `target_units` where a target is given for a parameter.
    pub fn get_converted(
        &self,
        order: TermOrder,
        uid: i64,
        form: &FunctionalForm,
        target_units: &UnitMap,
        converter: &dyn UnitConverter,
    ) -> Result<BTreeMap<String, f64>, DataLayerError> {
        let entry = self.get(order, uid)?;
        let mut named = BTreeMap::new();
        for (name, &value) in form.parameters.iter().zip(&entry.values) {
            let value = match (form.units.get(name), target_units.get(name)) {
                (Some(from), Some(to)) => value * converter.conversion_factor(from, to)?,
                _ => value,
            };
            named.insert(name.clone(), value);
        }
        Ok(named)
    }
}

fn smallest_unused(entries: &BTreeMap<i64, ParameterEntry>) -> i64 {
    let mut candidate = 0;
    for &uid in entries.keys() {
        if uid != candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}
