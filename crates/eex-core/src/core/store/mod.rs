//! # Table Stores
//!
//! The data layer delegates all raw table I/O to a [`TableStore`]. Two backends
//! are provided:
//!
//! - [`memory::MemoryStore`] keeps tables in process memory.
//! - [`disk::DiskStore`] writes one CSV file per table into a store directory,
//!   which is deleted on [`TableStore::close`] unless the store was opened with
//!   `persist = true`.
//!
//! Re-adding a table under an existing name merges rows by index (existing rows
//! are overwritten, new rows appended) provided the column layout is identical.

pub mod disk;
pub mod memory;

use crate::core::table::{Table, TableError};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub use disk::DiskStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Table '{0}' not found in store")]
    MissingTable(String),
    #[error("Table '{name}' already exists with a different layout: {source}")]
    DuplicateTable { name: String, source: TableError },
    #[error("Store has already been closed")]
    Closed,
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Malformed table file '{path}': {message}")]
    Format { path: String, message: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// The raw table I/O contract the data layer relies on.
pub trait TableStore: fmt::Debug {
    /// Adds a table, merging by index when the name already exists.
    fn add_table(&mut self, name: &str, table: &Table) -> Result<(), StoreError>;

    /// Reads a full table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingTable`] when no table has that name.
    fn read_table(&self, name: &str) -> Result<Table, StoreError>;

    /// Lists table names in insertion order.
    fn list_tables(&self) -> Vec<String>;

    /// Releases backend resources. Calling it more than once is a no-op.
    fn close(&mut self) -> Result<(), StoreError>;

    fn contains(&self, name: &str) -> bool {
        self.list_tables().iter().any(|t| t == name)
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Backend of type '{0}' not recognized")]
pub struct UnknownBackendError(pub String);

/// Selects which [`TableStore`] implementation a data layer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Memory,
    Disk,
}

impl FromStr for Backend {
    type Err = UnknownBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "disk" | "csv" => Ok(Backend::Disk),
            _ => Err(UnknownBackendError(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Memory => write!(f, "memory"),
            Backend::Disk => write!(f, "disk"),
        }
    }
}

/// Opens a store of the requested backend.
pub fn open(
    backend: Backend,
    name: &str,
    location: &Path,
    persist: bool,
) -> Result<Box<dyn TableStore>, StoreError> {
    match backend {
        Backend::Memory => Ok(Box::new(MemoryStore::new())),
        Backend::Disk => Ok(Box::new(DiskStore::open(name, location, persist)?)),
    }
}
