use super::{StoreError, TableStore};
use crate::core::table::Table;
use std::collections::HashMap;

/// Keeps every table in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    order: Vec<String>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl TableStore for MemoryStore {
    fn add_table(&mut self, name: &str, table: &Table) -> Result<(), StoreError> {
        self.ensure_open()?;
        match self.tables.get_mut(name) {
            Some(existing) => existing
                .upsert(table)
                .map_err(|source| StoreError::DuplicateTable {
                    name: name.to_string(),
                    source,
                }),
            None => {
                self.tables.insert(name.to_string(), table.clone());
                self.order.push(name.to_string());
                Ok(())
            }
        }
    }

    fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        self.ensure_open()?;
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))
    }

    fn list_tables(&self) -> Vec<String> {
        self.order.clone()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.tables.clear();
        self.order.clear();
        self.closed = true;
        Ok(())
    }
}
