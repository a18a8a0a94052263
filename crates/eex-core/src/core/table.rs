use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The element type stored in a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int,
    Float,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Int => write!(f, "int"),
            DType::Float => write!(f, "float"),
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Int(v) => Some(v),
            Scalar::Float(_) => None,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Int(_) => DType::Int,
            Scalar::Float(_) => DType::Float,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A homogeneously typed column of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Column {
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Int => Column::Int(Vec::new()),
            DType::Float => Column::Float(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Column::Int(_) => DType::Int,
            Column::Float(_) => DType::Float,
        }
    }

    pub fn get(&self, row: usize) -> Option<Scalar> {
        match self {
            Column::Int(v) => v.get(row).copied().map(Scalar::Int),
            Column::Float(v) => v.get(row).copied().map(Scalar::Float),
        }
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            Column::Float(_) => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            Column::Int(_) => None,
        }
    }

    /// Returns the values widened to `f64`, whatever the stored type.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Column::Int(v) => v.iter().map(|&x| x as f64).collect(),
            Column::Float(v) => v.clone(),
        }
    }

    /// Pushes a value, widening integers into float columns.
    ///
    /// Returns `false` when a float is pushed into an integer column.
    fn push(&mut self, value: Scalar) -> bool {
        match (self, value) {
            (Column::Int(v), Scalar::Int(x)) => v.push(x),
            (Column::Float(v), Scalar::Float(x)) => v.push(x),
            (Column::Float(v), Scalar::Int(x)) => v.push(x as f64),
            (Column::Int(_), Scalar::Float(_)) => return false,
        }
        true
    }

    fn set(&mut self, row: usize, value: Scalar) -> bool {
        match (self, value) {
            (Column::Int(v), Scalar::Int(x)) => v[row] = x,
            (Column::Float(v), Scalar::Float(x)) => v[row] = x,
            (Column::Float(v), Scalar::Int(x)) => v[row] = x as f64,
            (Column::Int(_), Scalar::Float(_)) => return false,
        }
        true
    }
}

impl From<Vec<i64>> for Column {
    fn from(values: Vec<i64>) -> Self {
        Column::Int(values)
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Float(values)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("Column '{column}' has {found} rows but the table index has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("Column '{column}' must hold {expected} values, found {found}")]
    WrongType {
        column: String,
        expected: DType,
        found: DType,
    },
    #[error("Index value {0} not found")]
    MissingIndex(i64),
    #[error("Column layout does not match: expected [{expected}], found [{found}]")]
    SchemaMismatch { expected: String, found: String },
}

/// An indexed table of named, typed columns.
///
/// Every row is keyed by an integer index value (for atom tables this is the
/// atom index). The index does not have to be contiguous or sorted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index_name: Option<String>,
    index: Vec<i64>,
    columns: Vec<(String, Column)>,
}

impl Table {
    /// Creates an empty-column table over the given index values.
    pub fn new(index: Vec<i64>) -> Self {
        Self {
            index_name: None,
            index,
            columns: Vec::new(),
        }
    }

    /// Creates a table indexed by `0..len`.
    pub fn with_range_index(len: usize) -> Self {
        Self::new((0..len as i64).collect())
    }

    pub fn named_index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn with_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<Column>,
    ) -> Result<Self, TableError> {
        self.insert_column(name, column)?;
        Ok(self)
    }

    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        column: impl Into<Column>,
    ) -> Result<(), TableError> {
        let name = name.into();
        let column = column.into();
        if self.column(&name).is_some() {
            return Err(TableError::DuplicateColumn(name));
        }
        if column.len() != self.index.len() {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.index.len(),
                found: column.len(),
            });
        }
        self.columns.push((name, column));
        Ok(())
    }

    /// Promotes an integer column to be the table index.
    pub fn set_index(mut self, name: &str) -> Result<Self, TableError> {
        let position = self
            .columns
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        let (column_name, column) = self.columns.remove(position);
        match column {
            Column::Int(values) => {
                self.index = values;
                self.index_name = Some(column_name);
                Ok(self)
            }
            Column::Float(_) => Err(TableError::WrongType {
                column: column_name,
                expected: DType::Int,
                found: DType::Float,
            }),
        }
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn has_columns<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|n| self.column(n.as_ref()).is_some())
    }

    /// Returns a table with only the named columns, in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, TableError> {
        let mut selected = Table {
            index_name: self.index_name.clone(),
            index: self.index.clone(),
            columns: Vec::with_capacity(names.len()),
        };
        for name in names {
            let name = name.as_ref();
            let column = self
                .column(name)
                .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
            selected.columns.push((name.to_string(), column.clone()));
        }
        Ok(selected)
    }

    /// Converts every integer column to floats.
    pub fn into_float(mut self) -> Self {
        for (_, column) in &mut self.columns {
            if let Column::Int(values) = column {
                *column = Column::Float(values.iter().map(|&v| v as f64).collect());
            }
        }
        self
    }

    /// Multiplies the named columns by `factor`, widening integer columns to floats.
    pub fn scale<S: AsRef<str>>(&mut self, names: &[S], factor: f64) -> Result<(), TableError> {
        for name in names {
            let name = name.as_ref();
            let column = self
                .columns
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, c)| c)
                .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
            let scaled = column.to_f64_vec().into_iter().map(|v| v * factor).collect();
            *column = Column::Float(scaled);
        }
        Ok(())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<Scalar> {
        self.column(column).and_then(|c| c.get(row))
    }

    /// Returns the values of one row across all columns.
    pub fn row(&self, row: usize) -> Vec<Scalar> {
        self.columns.iter().filter_map(|(_, c)| c.get(row)).collect()
    }

    /// Appends the columns of `other`, aligned to this table's index.
    pub fn join(&self, other: &Table) -> Result<Table, TableError> {
        let positions: HashMap<i64, usize> = other
            .index
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (idx, pos))
            .collect();
        let rows = self
            .index
            .iter()
            .map(|idx| {
                positions
                    .get(idx)
                    .copied()
                    .ok_or(TableError::MissingIndex(*idx))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut joined = self.clone();
        for (name, column) in &other.columns {
            let aligned = match column {
                Column::Int(v) => Column::Int(rows.iter().map(|&r| v[r]).collect()),
                Column::Float(v) => Column::Float(rows.iter().map(|&r| v[r]).collect()),
            };
            joined.insert_column(name.clone(), aligned)?;
        }
        Ok(joined)
    }

    /// Merges the rows of `other` into this table.
    ///
    /// Rows whose index already exists are overwritten, the rest are appended.
    /// Both tables must have the same column names and types in the same order.
    pub fn upsert(&mut self, other: &Table) -> Result<(), TableError> {
        if self.schema() != other.schema() {
            return Err(TableError::SchemaMismatch {
                expected: self.schema_string(),
                found: other.schema_string(),
            });
        }
        let mut positions: HashMap<i64, usize> = self
            .index
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (idx, pos))
            .collect();

        for (row, &idx) in other.index.iter().enumerate() {
            match positions.get(&idx).copied() {
                Some(target) => {
                    for ((_, dst), (name, src)) in self.columns.iter_mut().zip(&other.columns) {
                        let value = src.get(row).ok_or(TableError::MissingIndex(idx))?;
                        if !dst.set(target, value) {
                            return Err(Self::type_error(name, dst.dtype(), value.dtype()));
                        }
                    }
                }
                None => {
                    positions.insert(idx, self.index.len());
                    self.index.push(idx);
                    for ((_, dst), (name, src)) in self.columns.iter_mut().zip(&other.columns) {
                        let value = src.get(row).ok_or(TableError::MissingIndex(idx))?;
                        if !dst.push(value) {
                            return Err(Self::type_error(name, dst.dtype(), value.dtype()));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds a table column by column from row-major values.
    pub fn from_rows(
        index: Vec<i64>,
        schema: &[(String, DType)],
        rows: &[Vec<Scalar>],
    ) -> Result<Table, TableError> {
        let mut columns: Vec<(String, Column)> = schema
            .iter()
            .map(|(name, dtype)| (name.clone(), Column::empty(*dtype)))
            .collect();
        for row in rows {
            for ((name, column), value) in columns.iter_mut().zip(row) {
                if !column.push(*value) {
                    return Err(Self::type_error(name, column.dtype(), value.dtype()));
                }
            }
        }
        let mut table = Table::new(index);
        for (name, column) in columns {
            table.insert_column(name, column)?;
        }
        Ok(table)
    }

    pub fn schema(&self) -> Vec<(String, DType)> {
        self.columns
            .iter()
            .map(|(n, c)| (n.clone(), c.dtype()))
            .collect()
    }

    fn schema_string(&self) -> String {
        self.columns
            .iter()
            .map(|(n, c)| format!("{}:{}", n, c.dtype()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn type_error(column: &str, expected: DType, found: DType) -> TableError {
        TableError::WrongType {
            column: column.to_string(),
            expected,
            found,
        }
    }
}
