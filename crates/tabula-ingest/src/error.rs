use std::io;

use tabula_columnar::{ColumnType, TableError};
use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

/// Coarse classification of an [`IngestError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input does not have the declared shape (ragged rows, duplicate names,
    /// malformed documents). Always fatal.
    Structural,
    /// A value does not fit its column's resolved type.
    Coercion,
    /// A column type specification does not match the input's columns. Always fatal.
    Schema,
    /// The underlying source failed to open or read.
    Resource,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("row {row}: expected {expected} fields, found {actual}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("duplicate column name `{column}`")]
    DuplicateColumn { column: String },
    #[error("row {row}, column `{column}`: cannot coerce `{token}` to {column_type}")]
    Coercion {
        row: usize,
        column: String,
        token: String,
        column_type: ColumnType,
    },
    #[error("column type spec names unknown column `{column}`")]
    UnknownSpecColumn { column: String },
    #[error("compact column spec has {codes} codes but the source has {columns} columns")]
    SpecLength { codes: usize, columns: usize },
    #[error("unknown column type code `{code}` at position {position}")]
    UnknownTypeCode { code: char, position: usize },
    #[error("unknown column type `{name}`")]
    UnknownTypeName { name: String },
    #[error("invalid fixed-width column `{entry}`, expected `name:width`")]
    InvalidWidth { entry: String },
    #[error("csv parse error at line {line}, field {field}: {reason}")]
    Csv {
        line: u64,
        field: u64,
        reason: String,
    },
    #[error("json path `{path}` not found")]
    JsonPath { path: String },
    #[error("unsupported json document: {reason}")]
    UnsupportedJson { reason: String },
    #[error("result set: {message}")]
    ResultSet { message: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

impl IngestError {
    /// Wrap a database driver failure.
    pub fn result_set(message: impl Into<String>) -> Self {
        IngestError::ResultSet {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::RaggedRow { .. }
            | IngestError::DuplicateColumn { .. }
            | IngestError::Csv { .. }
            | IngestError::JsonPath { .. }
            | IngestError::UnsupportedJson { .. } => ErrorKind::Structural,
            IngestError::Coercion { .. } => ErrorKind::Coercion,
            IngestError::UnknownSpecColumn { .. }
            | IngestError::SpecLength { .. }
            | IngestError::UnknownTypeCode { .. }
            | IngestError::UnknownTypeName { .. }
            | IngestError::InvalidWidth { .. } => ErrorKind::Schema,
            IngestError::ResultSet { .. } | IngestError::Io(_) => ErrorKind::Resource,
            IngestError::Json(err) if err.is_io() => ErrorKind::Resource,
            IngestError::Json(_) => ErrorKind::Structural,
            IngestError::Table(err) => match err {
                TableError::TypeMismatch { .. } => ErrorKind::Coercion,
                TableError::UnknownColumn { .. } => ErrorKind::Schema,
                _ => ErrorKind::Structural,
            },
        }
    }
}

/// Map a csv error. Lines the csv reader reports are shifted by `line_offset`,
/// the lines consumed before it took over the input.
pub(crate) fn map_csv_error(err: csv::Error, fallback_line: u64, line_offset: u64) -> IngestError {
    let reason = err.to_string();
    let pos = err.position().cloned();

    match err.into_kind() {
        csv::ErrorKind::Io(e) => IngestError::Io(e),
        _ => {
            let line = pos
                .map(|p| p.line())
                .filter(|l| *l > 0)
                .map_or(fallback_line, |l| l + line_offset);
            IngestError::Csv {
                line,
                field: 0,
                reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_error_families() {
        let ragged = IngestError::RaggedRow {
            row: 3,
            expected: 2,
            actual: 1,
        };
        assert_eq!(ragged.kind(), ErrorKind::Structural);
        assert_eq!(ragged.to_string(), "row 3: expected 2 fields, found 1");

        let spec = IngestError::SpecLength {
            codes: 2,
            columns: 3,
        };
        assert_eq!(spec.kind(), ErrorKind::Schema);

        let io = IngestError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::Resource);

        let table = IngestError::from(TableError::ValueCount {
            columns: 2,
            values: 3,
        });
        assert_eq!(table.kind(), ErrorKind::Structural);
    }

    #[test]
    fn csv_positions_count_lines_skipped_upstream() {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&b"a,b\n1\n"[..]);
        let err = reader
            .records()
            .find_map(Result::err)
            .expect("unequal record lengths");

        match map_csv_error(err, 1, 3) {
            IngestError::Csv { line, .. } => assert_eq!(line, 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
