use serde::{Deserialize, Serialize};
use tabula_columnar::{ColumnSchema, ColumnType, Table, Value};

use crate::assemble::RowAssembler;
use crate::error::IngestResult;
use crate::options::ParseOptions;

/// Column type tag reported by a database driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    Varchar,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Boolean,
    Date,
    Timestamp,
}

impl NativeType {
    pub fn column_type(self) -> ColumnType {
        match self {
            NativeType::Varchar => ColumnType::String,
            NativeType::SmallInt | NativeType::Integer => ColumnType::Int,
            NativeType::BigInt => ColumnType::Long,
            NativeType::Real | NativeType::Double => ColumnType::Double,
            NativeType::Boolean => ColumnType::Boolean,
            NativeType::Date | NativeType::Timestamp => ColumnType::DateTime,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlColumn {
    pub name: String,
    pub native_type: NativeType,
}

impl SqlColumn {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
        }
    }
}

/// A forward-only cursor over query results.
///
/// Rows carry native values; SQL `NULL` is [`Value::Na`]. Driver failures are
/// reported as [`IngestError::ResultSet`](crate::IngestError::ResultSet).
pub trait ResultSet {
    fn columns(&self) -> &[SqlColumn];

    fn next_row(&mut self) -> IngestResult<Option<Vec<Value>>>;

    /// Release the cursor. Called exactly once by [`read_result_set`].
    fn close(&mut self);
}

struct CloseOnDrop<'a, S: ResultSet + ?Sized>(&'a mut S);

impl<S: ResultSet + ?Sized> Drop for CloseOnDrop<'_, S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Drain a result set into a [`Table`].
///
/// Column types come straight from the native type tags. The result set is
/// closed before this returns, whether or not assembly succeeded.
pub fn read_result_set<S: ResultSet + ?Sized>(
    results: &mut S,
    options: &ParseOptions,
) -> IngestResult<Table> {
    let mut guard = CloseOnDrop(results);
    let schema: Vec<ColumnSchema> = guard
        .0
        .columns()
        .iter()
        .map(|c| ColumnSchema::new(&c.name, c.native_type.column_type()))
        .collect();

    let mut assembler = RowAssembler::new(&schema, options)?;
    let mut row = 0;
    while let Some(values) = guard.0.next_row()? {
        row += 1;
        assembler.push_values(row, values)?;
    }
    drop(guard);
    log::debug!("drained {row} rows from result set");
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Rows {
        columns: Vec<SqlColumn>,
        rows: std::vec::IntoIter<Vec<Value>>,
        closed: usize,
    }

    impl ResultSet for Rows {
        fn columns(&self) -> &[SqlColumn] {
            &self.columns
        }

        fn next_row(&mut self) -> IngestResult<Option<Vec<Value>>> {
            Ok(self.rows.next())
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    #[test]
    fn native_types_drive_column_types() {
        let mut rows = Rows {
            columns: vec![
                SqlColumn::new("id", NativeType::BigInt),
                SqlColumn::new("qty", NativeType::SmallInt),
                SqlColumn::new("label", NativeType::Varchar),
            ],
            rows: vec![
                vec![Value::Long(1), Value::Int(3), Value::from("a")],
                vec![Value::Long(2), Value::Na, Value::Na],
            ]
            .into_iter(),
            closed: 0,
        };
        let table = read_result_set(&mut rows, &ParseOptions::default()).unwrap();
        assert_eq!(
            table.schema(),
            vec![
                ColumnSchema::new("id", ColumnType::Long),
                ColumnSchema::new("qty", ColumnType::Int),
                ColumnSchema::new("label", ColumnType::String),
            ]
        );
        assert_eq!(table.get(1, "qty"), Value::Na);
        assert_eq!(rows.closed, 1);
    }
}
