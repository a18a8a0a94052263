use thiserror::Error;

use crate::core::metadata::UnknownOrderError;
use crate::core::store::{StoreError, UnknownBackendError};
use crate::core::table::TableError;
use crate::core::units::UnitError;

#[derive(Debug, Error)]
pub enum DataLayerError {
    #[error(transparent)]
    UnknownBackend(#[from] UnknownBackendError),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Unknown atom propert{}: {}", if .0.len() == 1 { "y" } else { "ies" }, .0.join(", "))]
    UnknownProperty(Vec<String>),

    #[error("Functional form '{name}' is not registered for order {order}")]
    NotRegistered { order: u8, name: String },

    #[error("Functional form '{name}' is already registered for order {order}")]
    AlreadyRegistered { order: u8, name: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Uid {uid} of order {order} already holds different parameters")]
    UidConflict { order: u8, uid: i64 },

    #[error("Not yet implemented: {0}")]
    NotImplemented(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    UnknownOrder(#[from] UnknownOrderError),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("No atom property matches the supplied columns [{}]", .0.join(", "))]
    NoMatchingProperties(Vec<String>),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Unit conversion failed: {0}")]
    Units(#[from] UnitError),

    #[error("Table operation failed: {0}")]
    Table(#[from] TableError),
}
