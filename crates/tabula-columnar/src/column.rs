#![forbid(unsafe_code)]

use crate::bitmap::BitVec;
use crate::error::{TableError, TableResult};
use crate::stats::ColumnStats;
use crate::table::ColumnSchema;
use crate::types::{ColumnType, Value};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// Typed slot storage. Slots marked missing in the validity bitmap hold the
/// type's default value and are never read back.
#[derive(Clone, Debug)]
enum ColumnData {
    String(Vec<Arc<str>>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    Boolean(BitVec),
    DateTime(Vec<NaiveDateTime>),
}

impl ColumnData {
    fn with_capacity(column_type: ColumnType, rows: usize) -> Self {
        match column_type {
            ColumnType::String => ColumnData::String(Vec::with_capacity(rows)),
            ColumnType::Int => ColumnData::Int(Vec::with_capacity(rows)),
            ColumnType::Long => ColumnData::Long(Vec::with_capacity(rows)),
            ColumnType::Double => ColumnData::Double(Vec::with_capacity(rows)),
            ColumnType::Boolean => ColumnData::Boolean(BitVec::with_capacity_bits(rows)),
            ColumnType::DateTime => ColumnData::DateTime(Vec::with_capacity(rows)),
        }
    }

    fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::String(_) => ColumnType::String,
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Long(_) => ColumnType::Long,
            ColumnData::Double(_) => ColumnType::Double,
            ColumnData::Boolean(_) => ColumnType::Boolean,
            ColumnData::DateTime(_) => ColumnType::DateTime,
        }
    }

    fn push_placeholder(&mut self) {
        match self {
            ColumnData::String(v) => v.push(Arc::from("")),
            ColumnData::Int(v) => v.push(0),
            ColumnData::Long(v) => v.push(0),
            ColumnData::Double(v) => v.push(0.0),
            ColumnData::Boolean(v) => v.push(false),
            ColumnData::DateTime(v) => v.push(NaiveDateTime::default()),
        }
    }

    /// Store `value`, widening integers where the column is wider. Returns
    /// `false` without storing anything when the value does not fit.
    fn push(&mut self, value: &Value) -> bool {
        match (self, value) {
            (ColumnData::String(v), Value::String(s)) => v.push(s.clone()),
            (ColumnData::Int(v), Value::Int(x)) => v.push(*x),
            (ColumnData::Long(v), Value::Int(x)) => v.push(i64::from(*x)),
            (ColumnData::Long(v), Value::Long(x)) => v.push(*x),
            (ColumnData::Double(v), other) => match other.as_f64() {
                Some(x) => v.push(x),
                None => return false,
            },
            (ColumnData::Boolean(v), Value::Boolean(b)) => v.push(*b),
            (ColumnData::DateTime(v), Value::DateTime(d)) => v.push(*d),
            _ => return false,
        }
        true
    }

    fn get(&self, row: usize) -> Value {
        match self {
            ColumnData::String(v) => Value::String(v[row].clone()),
            ColumnData::Int(v) => Value::Int(v[row]),
            ColumnData::Long(v) => Value::Long(v[row]),
            ColumnData::Double(v) => Value::Double(v[row]),
            ColumnData::Boolean(v) => Value::Boolean(v.get(row)),
            ColumnData::DateTime(v) => Value::DateTime(v[row]),
        }
    }
}

/// An immutable, named, single-typed sequence of cells.
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    data: ColumnData,
    validity: BitVec,
}

/// Columns compare cell by cell under [`Value`] equality, so `NaN` equals
/// `NaN` and the filler behind missing slots is ignored.
impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.column_type() == other.column_type()
            && self.len() == other.len()
            && self.iter().eq(other.iter())
    }
}

impl Column {
    /// Build a column of a declared type. Integers widen into wider numeric
    /// columns; any other mismatch is an error.
    pub fn from_values(
        name: impl Into<String>,
        column_type: ColumnType,
        values: impl IntoIterator<Item = Value>,
    ) -> TableResult<Column> {
        let values = values.into_iter();
        let mut builder = ColumnBuilder::with_capacity(name, column_type, values.size_hint().0);
        for value in values {
            builder.push(&value)?;
        }
        Ok(builder.finish())
    }

    /// Build a column whose type is the unification of the values' own types.
    ///
    /// Columns with nothing but `Na` are typed `String`.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Column {
        let column_type = unify_value_types(&values).unwrap_or(ColumnType::String);
        let mut builder = ColumnBuilder::with_capacity(name, column_type, values.len());
        for value in &values {
            let cast = value.cast(column_type).unwrap_or(Value::Na);
            builder.push_unchecked(&cast);
        }
        builder.finish()
    }

    /// A column of `rows` missing cells.
    pub fn na(name: impl Into<String>, column_type: ColumnType, rows: usize) -> Column {
        let mut builder = ColumnBuilder::with_capacity(name, column_type, rows);
        for _ in 0..rows {
            builder.push_na();
        }
        builder.finish()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    pub fn schema(&self) -> ColumnSchema {
        ColumnSchema {
            name: self.name.clone(),
            column_type: self.column_type(),
        }
    }

    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    /// Read a cell. Rows past the end read as `Na`.
    pub fn get(&self, row: usize) -> Value {
        if !self.validity.get(row) {
            return Value::Na;
        }
        self.data.get(row)
    }

    pub fn is_na(&self, row: usize) -> bool {
        !self.validity.get(row)
    }

    pub fn na_count(&self) -> usize {
        self.validity.count_zeros()
    }

    /// Set bits mark present cells.
    pub fn validity(&self) -> &BitVec {
        &self.validity
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(move |row| self.get(row))
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.iter().collect()
    }

    pub fn renamed(&self, name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            data: self.data.clone(),
            validity: self.validity.clone(),
        }
    }

    /// Gather rows by index. Out-of-range indices produce `Na`.
    pub fn take(&self, rows: &[usize]) -> Column {
        let mut builder = ColumnBuilder::with_capacity(&self.name, self.column_type(), rows.len());
        for &row in rows {
            builder.push_unchecked(&self.get(row));
        }
        builder.finish()
    }

    /// Gather rows where `None` produces `Na`.
    pub(crate) fn take_opt(&self, rows: &[Option<usize>]) -> Column {
        let mut builder = ColumnBuilder::with_capacity(&self.name, self.column_type(), rows.len());
        for row in rows {
            match row {
                Some(row) => builder.push_unchecked(&self.get(*row)),
                None => builder.push_na(),
            }
        }
        builder.finish()
    }

    /// Convert every cell to `target` (see [`Value::cast`]).
    pub fn cast(&self, target: ColumnType) -> TableResult<Column> {
        if target == self.column_type() {
            return Ok(self.clone());
        }
        let mut builder = ColumnBuilder::with_capacity(&self.name, target, self.len());
        for value in self.iter() {
            match value.cast(target) {
                Some(cast) => builder.push_unchecked(&cast),
                None => {
                    return Err(TableError::TypeMismatch {
                        column: self.name.clone(),
                        expected: target,
                        actual: self.column_type(),
                    })
                }
            }
        }
        Ok(builder.finish())
    }

    pub fn stats(&self) -> ColumnStats {
        ColumnStats::compute(self)
    }
}

/// Unification of the types of all non-missing values, `None` when every value is `Na`.
pub fn unify_value_types<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<ColumnType> {
    values
        .into_iter()
        .filter_map(Value::column_type)
        .reduce(ColumnType::unify)
}

/// Growable single-column builder, consumed into an immutable [`Column`].
#[derive(Debug)]
pub struct ColumnBuilder {
    name: String,
    data: ColumnData,
    validity: BitVec,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self::with_capacity(name, column_type, 0)
    }

    pub fn with_capacity(name: impl Into<String>, column_type: ColumnType, rows: usize) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::with_capacity(column_type, rows),
            validity: BitVec::with_capacity_bits(rows),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }

    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    pub fn push_na(&mut self) {
        self.data.push_placeholder();
        self.validity.push(false);
    }

    pub fn push(&mut self, value: &Value) -> TableResult<()> {
        let Some(actual) = value.column_type() else {
            self.push_na();
            return Ok(());
        };
        if !self.data.push(value) {
            return Err(TableError::TypeMismatch {
                column: self.name.clone(),
                expected: self.data.column_type(),
                actual,
            });
        }
        self.validity.push(true);
        Ok(())
    }

    /// Push a value already known to fit; a mismatch degrades to `Na`.
    pub(crate) fn push_unchecked(&mut self, value: &Value) {
        if self.push(value).is_err() {
            self.push_na();
        }
    }

    pub fn finish(self) -> Column {
        Column {
            name: self.name,
            data: self.data,
            validity: self.validity,
        }
    }
}
