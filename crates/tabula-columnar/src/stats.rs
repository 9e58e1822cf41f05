#![forbid(unsafe_code)]

use crate::column::Column;
use crate::types::{ColumnType, Value};
use std::collections::HashSet;

/// Summary statistics over the present (non-NA) cells of a column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnStats {
    pub column_type: ColumnType,
    pub rows: usize,
    pub na_count: usize,
    pub distinct_count: usize,
    pub min: Option<Value>,
    pub max: Option<Value>,
    /// Numeric columns sum their values; boolean columns count `true` cells.
    pub sum: Option<f64>,
    pub mean: Option<f64>,
    /// Average byte length of string cells.
    pub avg_length: Option<f64>,
}

impl ColumnStats {
    pub(crate) fn compute(column: &Column) -> Self {
        let column_type = column.column_type();
        let mut distinct: HashSet<Value> = HashSet::new();
        let mut min: Option<Value> = None;
        let mut max: Option<Value> = None;
        let mut sum = 0f64;
        let mut total_len = 0usize;

        for value in column.iter().filter(|v| !v.is_na()) {
            match &value {
                Value::Boolean(true) => sum += 1.0,
                Value::String(s) => total_len += s.len(),
                other => sum += other.as_f64().unwrap_or(0.0),
            }
            if min.as_ref().map_or(true, |m| value < *m) {
                min = Some(value.clone());
            }
            if max.as_ref().map_or(true, |m| value > *m) {
                max = Some(value.clone());
            }
            distinct.insert(value);
        }

        let present = column.len() - column.na_count();
        let summable = column_type.is_numeric() || column_type == ColumnType::Boolean;
        let sum = summable.then_some(sum);
        let mean = sum.filter(|_| present > 0).map(|s| s / present as f64);
        let avg_length = (column_type == ColumnType::String && present > 0)
            .then(|| total_len as f64 / present as f64);

        Self {
            column_type,
            rows: column.len(),
            na_count: column.na_count(),
            distinct_count: distinct.len(),
            min,
            max,
            sum,
            mean,
            avg_length,
        }
    }
}
