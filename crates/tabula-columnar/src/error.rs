use crate::types::ColumnType;
use thiserror::Error;

pub type TableResult<T> = Result<T, TableError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TableError {
    #[error("duplicate column: {column}")]
    DuplicateColumn { column: String },

    #[error("unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("column {column} has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("{values} values cannot be laid out over {columns} columns")]
    ValueCount { columns: usize, values: usize },

    #[error("no values supplied for declared columns {columns:?}")]
    EmptyValues { columns: Vec<String> },

    /// `row` counts from 1.
    #[error("row {row} supplies {actual} values for {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column {column} holds {expected} values, got {actual}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("mask has {actual} bits for a table of {expected} rows")]
    MaskLength { expected: usize, actual: usize },

    #[error("join key {column} is {left} on the left and {right} on the right")]
    JoinKeyType {
        column: String,
        left: ColumnType,
        right: ColumnType,
    },

    #[error("{aggregation} is not defined for {column_type} column {column}")]
    UnsupportedAggregation {
        aggregation: &'static str,
        column: String,
        column_type: ColumnType,
    },
}
