#![forbid(unsafe_code)]

use crate::column::{Column, ColumnBuilder};
use crate::error::{TableError, TableResult};
use crate::types::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// An immutable, ordered collection of equally long, uniquely named columns.
///
/// Columns are reference counted so derived tables share untouched columns with
/// their source.
#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Vec<Arc<Column>>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<Column>) -> TableResult<Table> {
        Self::from_shared(columns.into_iter().map(Arc::new).collect())
    }

    pub(crate) fn from_shared(columns: Vec<Arc<Column>>) -> TableResult<Table> {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if index.insert(column.name().to_owned(), idx).is_some() {
                return Err(TableError::DuplicateColumn {
                    column: column.name().to_owned(),
                });
            }
            if column.len() != rows {
                return Err(TableError::LengthMismatch {
                    column: column.name().to_owned(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Table {
            columns,
            index,
            rows,
        })
    }

    /// Lay out row-major scalars over the named columns.
    ///
    /// The value count must be a non-zero multiple of the column count. Each
    /// column's type is unified from its values (see [`Column::infer`]).
    pub fn from_values<S: Into<String>>(names: Vec<S>, values: Vec<Value>) -> TableResult<Table> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(TableError::EmptyValues { columns: names });
        }
        if names.is_empty() || values.len() % names.len() != 0 {
            return Err(TableError::ValueCount {
                columns: names.len(),
                values: values.len(),
            });
        }

        let width = names.len();
        let mut per_column: Vec<Vec<Value>> = (0..width)
            .map(|_| Vec::with_capacity(values.len() / width))
            .collect();
        for (idx, value) in values.into_iter().enumerate() {
            per_column[idx % width].push(value);
        }

        let columns = names
            .into_iter()
            .zip(per_column)
            .map(|(name, values)| Column::infer(name, values))
            .collect();
        Table::new(columns)
    }

    /// Build from rows of values. Short rows are padded with `Na`; rows longer than
    /// the column list are an error.
    pub fn from_rows<S: Into<String>>(names: Vec<S>, rows: Vec<Vec<Value>>) -> TableResult<Table> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let width = names.len();
        let mut per_column: Vec<Vec<Value>> =
            (0..width).map(|_| Vec::with_capacity(rows.len())).collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(TableError::RowWidth {
                    row: row_idx + 1,
                    expected: width,
                    actual: row.len(),
                });
            }
            let supplied = row.len();
            for (col, value) in row.into_iter().enumerate() {
                per_column[col].push(value);
            }
            for column in per_column.iter_mut().skip(supplied) {
                column.push(Value::Na);
            }
        }

        let columns = names
            .into_iter()
            .zip(per_column)
            .map(|(name, values)| Column::infer(name, values))
            .collect();
        Table::new(columns)
    }

    /// Wrap columns already known to be uniquely named and equally long.
    pub(crate) fn from_checked(columns: Vec<Arc<Column>>) -> Table {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        debug_assert!(columns.iter().all(|c| c.len() == rows));
        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name().to_owned(), idx))
            .collect();
        Table {
            columns,
            index,
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn schema(&self) -> Vec<ColumnSchema> {
        self.columns.iter().map(|c| c.schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column_index(&self, name: &str) -> TableResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TableError::UnknownColumn {
                column: name.to_owned(),
            })
    }

    pub fn column(&self, name: &str) -> TableResult<&Column> {
        let idx = self.column_index(name)?;
        Ok(&self.columns[idx])
    }

    pub fn column_at(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx).map(|c| c.as_ref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().map(|c| c.as_ref())
    }

    pub(crate) fn shared_column(&self, idx: usize) -> Arc<Column> {
        self.columns[idx].clone()
    }

    /// Read a cell by row and column name. Unknown names and out-of-range rows read as `Na`.
    pub fn get(&self, row: usize, name: &str) -> Value {
        match self.index.get(name) {
            Some(&idx) => self.columns[idx].get(row),
            None => Value::Na,
        }
    }

    pub fn row(&self, row: usize) -> Option<Vec<Value>> {
        if row >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c.get(row)).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.rows).map(move |row| RowView { table: self, row })
    }

    /// Row-major copy of every cell.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        self.rows().map(|r| r.to_vec()).collect()
    }
}

/// Borrowed view of one table row, handed to row predicates and derivations.
#[derive(Clone, Copy, Debug)]
pub struct RowView<'a> {
    table: &'a Table,
    row: usize,
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.row
    }

    /// Cell in the named column; unknown names read as `Na`.
    pub fn get(&self, name: &str) -> Value {
        self.table.get(self.row, name)
    }

    pub fn get_at(&self, column: usize) -> Value {
        self.table
            .columns
            .get(column)
            .map(|c| c.get(self.row))
            .unwrap_or(Value::Na)
    }

    pub fn is_na(&self, name: &str) -> bool {
        self.get(name).is_na()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.table.columns.iter().map(|c| c.get(self.row)).collect()
    }
}

/// Row-at-a-time builder over a fixed schema.
#[derive(Debug)]
pub struct TableBuilder {
    builders: Vec<ColumnBuilder>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(schema: &[ColumnSchema]) -> TableResult<Self> {
        Self::with_capacity(schema, 0)
    }

    pub fn with_capacity(schema: &[ColumnSchema], rows: usize) -> TableResult<Self> {
        let mut seen = std::collections::HashSet::with_capacity(schema.len());
        for col in schema {
            if !seen.insert(col.name.as_str()) {
                return Err(TableError::DuplicateColumn {
                    column: col.name.clone(),
                });
            }
        }
        let builders = schema
            .iter()
            .map(|col| ColumnBuilder::with_capacity(&col.name, col.column_type, rows))
            .collect();
        Ok(Self { builders, rows: 0 })
    }

    pub fn column_count(&self) -> usize {
        self.builders.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn append_row(&mut self, row: &[Value]) -> TableResult<()> {
        if row.len() != self.builders.len() {
            return Err(TableError::RowWidth {
                row: self.rows + 1,
                expected: self.builders.len(),
                actual: row.len(),
            });
        }
        for (builder, value) in self.builders.iter_mut().zip(row) {
            builder.push(value)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Finalize into an immutable table, checking that every column reached the
    /// same length.
    pub fn finish(self) -> TableResult<Table> {
        let expected = self.rows;
        let mut columns = Vec::with_capacity(self.builders.len());
        for builder in self.builders {
            if builder.len() != expected {
                return Err(TableError::LengthMismatch {
                    column: builder.name().to_owned(),
                    expected,
                    actual: builder.len(),
                });
            }
            columns.push(builder.finish());
        }
        Table::new(columns)
    }
}
