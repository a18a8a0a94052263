use crate::core::store::Backend;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Maps a property or parameter name to a unit expression.
pub type UnitMap = HashMap<String, String>;

/// Absolute and relative tolerance used to decide whether two parameter
/// vectors are the same: `|a - b| <= absolute + relative * max(|a|, |b|)`,
/// which does not depend on argument order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub relative: f64,
    pub absolute: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            relative: 1.0e-5,
            absolute: 1.0e-8,
        }
    }
}

impl Tolerance {
    pub fn is_close(&self, a: f64, b: f64) -> bool {
        if a == b {
            return true;
        }
        (a - b).abs() <= self.absolute + self.relative * a.abs().max(b.abs())
    }

    pub fn all_close(&self, a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| self.is_close(x, y))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataLayerConfig {
    pub name: String,
    pub store_location: PathBuf,
    pub persist: bool,
    pub backend: Backend,
    pub tolerance: Tolerance,
}

impl DataLayerConfig {
    /// An in-memory configuration with default tolerances.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_location: std::env::temp_dir(),
            persist: false,
            backend: Backend::Memory,
            tolerance: Tolerance::default(),
        }
    }
}

#[derive(Default)]
pub struct DataLayerConfigBuilder {
    name: Option<String>,
    store_location: Option<PathBuf>,
    persist: Option<bool>,
    backend: Option<Backend>,
    tolerance: Option<Tolerance>,
}

impl DataLayerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn store_location(mut self, path: PathBuf) -> Self {
        self.store_location = Some(path);
        self
    }
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }
    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<DataLayerConfig, ConfigError> {
        let name = self.name.ok_or(ConfigError::MissingParameter("name"))?;
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "name",
                reason: "must not be empty".to_string(),
            });
        }
        let tolerance = self.tolerance.unwrap_or_default();
        if !(tolerance.relative >= 0.0 && tolerance.absolute >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "tolerance",
                reason: "tolerances must be non-negative".to_string(),
            });
        }
        Ok(DataLayerConfig {
            name,
            store_location: self.store_location.unwrap_or_else(std::env::temp_dir),
            persist: self.persist.unwrap_or(false),
            backend: self.backend.unwrap_or_default(),
            tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_a_name() {
        let result = DataLayerConfigBuilder::new().build();
        assert_eq!(result, Err(ConfigError::MissingParameter("name")));
    }

    #[test]
    fn build_fills_defaults() {
        let config = DataLayerConfigBuilder::new().name("water").build().unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert!(!config.persist);
        assert_eq!(config.tolerance, Tolerance::default());
    }

    #[test]
    fn build_rejects_negative_tolerance() {
        let result = DataLayerConfigBuilder::new()
            .name("water")
            .tolerance(Tolerance {
                relative: -1.0,
                absolute: 0.0,
            })
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter {
                name: "tolerance",
                ..
            })
        ));
    }

    #[test]
    fn tolerance_matches_relative_and_absolute_bounds() {
        let tol = Tolerance::default();
        assert!(tol.is_close(1.0, 1.0 + 5.0e-6));
        assert!(!tol.is_close(1.0, 1.0 + 5.0e-5));
        assert!(tol.is_close(0.0, 5.0e-9));
        assert!(!tol.all_close(&[1.0, 2.0], &[1.0]));
    }

    #[test]
    fn closeness_is_symmetric() {
        let tol = Tolerance {
            relative: 0.1,
            absolute: 0.0,
        };
        assert!(tol.is_close(1.0, 0.9));
        assert!(tol.is_close(0.9, 1.0));
        assert!(!tol.is_close(1.0, 0.8));
        assert!(!tol.is_close(0.8, 1.0));
    }
}
