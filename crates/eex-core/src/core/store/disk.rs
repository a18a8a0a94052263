use super::{StoreError, TableStore};
use crate::core::table::{Column, DType, Scalar, Table};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_FILE: &str = "manifest.txt";

/// Stores each table as a CSV file inside `<location>/<name>.eex/`.
///
/// The first CSV column holds the row index (header `@<index name>`); the
/// remaining headers carry their type as a suffix, `name:i` or `name:f`.
/// A manifest file records the insertion order of table names alongside
/// the CSV files of a persisted store.
#[derive(Debug)]
pub struct DiskStore {
    directory: PathBuf,
    order: Vec<String>,
    persist: bool,
    closed: bool,
}

impl DiskStore {
    /// Opens an empty store at `<location>/<name>.eex/`.
    ///
    /// A directory left behind by an earlier persisted store of the same name
    /// is removed first; its tables were written against indexer and parameter
    /// state that a new data layer does not have.
    pub fn open(name: &str, location: &Path, persist: bool) -> Result<Self, StoreError> {
        let directory = location.join(format!("{}.eex", name));
        match fs::remove_dir_all(&directory) {
            Ok(()) => warn!("Replaced existing store directory {:?}.", directory),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&directory, e)),
        }
        fs::create_dir_all(&directory).map_err(|e| io_error(&directory, e))?;
        debug!("Opened disk store at {:?}.", directory);

        Ok(Self {
            directory,
            order: Vec::new(),
            persist,
            closed: false,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn table_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == MANIFEST_FILE {
            return Err(StoreError::Format {
                path: self.directory.to_string_lossy().to_string(),
                message: format!("'{}' is not a valid table name", name),
            });
        }
        Ok(self.directory.join(format!("{}.csv", name)))
    }

    fn write_manifest(&self) -> Result<(), StoreError> {
        let path = self.directory.join(MANIFEST_FILE);
        fs::write(&path, self.order.join("\n")).map_err(|e| io_error(&path, e))
    }

    fn write_csv(path: &Path, table: &Table) -> Result<(), StoreError> {
        let csv_error = |source| StoreError::Csv {
            path: path.to_string_lossy().to_string(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

        let mut header = vec![format!("@{}", table.index_name().unwrap_or(""))];
        header.extend(table.columns().map(|(name, column)| {
            let suffix = match column.dtype() {
                DType::Int => "i",
                DType::Float => "f",
            };
            format!("{}:{}", name, suffix)
        }));
        writer.write_record(&header).map_err(csv_error)?;

        for (row, idx) in table.index().iter().enumerate() {
            let mut record = vec![idx.to_string()];
            record.extend(table.row(row).iter().map(Scalar::to_string));
            writer.write_record(&record).map_err(csv_error)?;
        }
        writer.flush().map_err(|e| io_error(path, e))
    }

    fn read_csv(path: &Path) -> Result<Table, StoreError> {
        let path_str = path.to_string_lossy().to_string();
        let csv_error = |source| StoreError::Csv {
            path: path_str.clone(),
            source,
        };
        let format_error = |message: String| StoreError::Format {
            path: path_str.clone(),
            message,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
        let headers = reader.headers().map_err(csv_error)?.clone();

        let index_name = headers
            .get(0)
            .and_then(|h| h.strip_prefix('@'))
            .ok_or_else(|| format_error("first header must name the index".to_string()))?;

        let mut schema = Vec::with_capacity(headers.len().saturating_sub(1));
        for header in headers.iter().skip(1) {
            let (name, kind) = header
                .rsplit_once(':')
                .ok_or_else(|| format_error(format!("header '{}' lacks a type", header)))?;
            let dtype = match kind {
                "i" => DType::Int,
                "f" => DType::Float,
                other => return Err(format_error(format!("unknown column type '{}'", other))),
            };
            schema.push((name.to_string(), dtype));
        }

        let mut index = Vec::new();
        let mut columns: Vec<Column> = schema.iter().map(|(_, d)| Column::empty(*d)).collect();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let idx = record
                .get(0)
                .and_then(|v| v.parse::<i64>().ok())
                .ok_or_else(|| format_error(format!("invalid index on data row {}", line + 1)))?;
            index.push(idx);
            for (column, field) in columns.iter_mut().zip(record.iter().skip(1)) {
                let ok = match column {
                    Column::Int(values) => field.parse().map(|v| values.push(v)).is_ok(),
                    Column::Float(values) => field.parse().map(|v| values.push(v)).is_ok(),
                };
                if !ok {
                    return Err(format_error(format!(
                        "invalid value '{}' on data row {}",
                        field,
                        line + 1
                    )));
                }
            }
        }

        let mut table = Table::new(index);
        if !index_name.is_empty() {
            table = table.named_index(index_name);
        }
        for ((name, _), column) in schema.into_iter().zip(columns) {
            table.insert_column(name, column)?;
        }
        Ok(table)
    }
}

impl TableStore for DiskStore {
    fn add_table(&mut self, name: &str, table: &Table) -> Result<(), StoreError> {
        self.ensure_open()?;
        let path = self.table_path(name)?;
        if self.order.iter().any(|t| t == name) {
            let mut existing = Self::read_csv(&path)?;
            existing
                .upsert(table)
                .map_err(|source| StoreError::DuplicateTable {
                    name: name.to_string(),
                    source,
                })?;
            Self::write_csv(&path, &existing)
        } else {
            Self::write_csv(&path, table)?;
            self.order.push(name.to_string());
            self.write_manifest()
        }
    }

    fn read_table(&self, name: &str) -> Result<Table, StoreError> {
        self.ensure_open()?;
        if !self.order.iter().any(|t| t == name) {
            return Err(StoreError::MissingTable(name.to_string()));
        }
        Self::read_csv(&self.table_path(name)?)
    }

    fn list_tables(&self) -> Vec<String> {
        self.order.clone()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.order.clear();
        if self.persist {
            debug!("Closing disk store, keeping {:?}.", self.directory);
            return Ok(());
        }
        debug!("Closing disk store, removing {:?}.", self.directory);
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.directory, e)),
        }
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to clean up disk store {:?}: {}", self.directory, e);
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}
