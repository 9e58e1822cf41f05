use std::collections::HashMap;
use tabula_columnar::{ColumnBuilder, ColumnSchema, ColumnType, Table, Value};

use crate::error::{IngestError, IngestResult};
use crate::infer::parse_token;
use crate::options::{CoercionPolicy, ParseOptions};

/// Builds a [`Table`] row by row against a resolved schema.
///
/// Row numbers passed to the `push_*` methods are the 1-based positions in the
/// source and only appear in errors. A failed push leaves the assembler
/// unusable; drop it and report the error.
#[derive(Debug)]
pub struct RowAssembler {
    builders: Vec<ColumnBuilder>,
    index: HashMap<String, usize>,
    options: ParseOptions,
    rows: usize,
}

impl RowAssembler {
    pub fn new(schema: &[ColumnSchema], options: &ParseOptions) -> IngestResult<Self> {
        Self::with_capacity(schema, 0, options)
    }

    pub fn with_capacity(
        schema: &[ColumnSchema],
        rows: usize,
        options: &ParseOptions,
    ) -> IngestResult<Self> {
        let mut index = HashMap::with_capacity(schema.len());
        for (idx, column) in schema.iter().enumerate() {
            if index.insert(column.name.clone(), idx).is_some() {
                return Err(IngestError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
        }
        let builders = schema
            .iter()
            .map(|c| ColumnBuilder::with_capacity(&c.name, c.column_type, rows))
            .collect();
        Ok(Self {
            builders,
            index,
            options: options.clone(),
            rows: 0,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Append one row of raw text tokens, one per column.
    pub fn push_tokens(&mut self, row: usize, tokens: &[&str]) -> IngestResult<()> {
        self.check_width(row, tokens.len())?;
        let policy = self.options.coercion;
        for (builder, token) in self.builders.iter_mut().zip(tokens) {
            match parse_token(token, builder.column_type(), &self.options) {
                Some(value) => builder.push(&value)?,
                None => reject(policy, builder, row, token)?,
            }
        }
        self.rows += 1;
        Ok(())
    }

    /// Append one row of typed values, one per column.
    pub fn push_values(&mut self, row: usize, values: Vec<Value>) -> IngestResult<()> {
        self.check_width(row, values.len())?;
        let policy = self.options.coercion;
        for (builder, value) in self.builders.iter_mut().zip(values) {
            push_coerced(builder, value, row, policy, &self.options)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Append one record. Columns the record lacks are NA; fields that are not
    /// columns are ignored.
    pub fn push_record(&mut self, row: usize, record: &[(String, Value)]) -> IngestResult<()> {
        let mut slots: Vec<Option<&Value>> = vec![None; self.builders.len()];
        for (name, value) in record {
            if let Some(&idx) = self.index.get(name) {
                slots[idx] = Some(value);
            }
        }
        let policy = self.options.coercion;
        for (builder, slot) in self.builders.iter_mut().zip(slots) {
            match slot {
                Some(value) => push_coerced(builder, value.clone(), row, policy, &self.options)?,
                None => builder.push_na(),
            }
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> IngestResult<Table> {
        let rows = self.rows;
        let columns: Vec<_> = self.builders.into_iter().map(ColumnBuilder::finish).collect();
        debug_assert!(columns.iter().all(|c| c.len() == rows));
        let table = Table::new(columns)?;
        log::debug!(
            "assembled table with {} rows and {} columns",
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }

    fn check_width(&self, row: usize, actual: usize) -> IngestResult<()> {
        if actual != self.builders.len() {
            return Err(IngestError::RaggedRow {
                row,
                expected: self.builders.len(),
                actual,
            });
        }
        Ok(())
    }
}

fn push_coerced(
    builder: &mut ColumnBuilder,
    value: Value,
    row: usize,
    policy: CoercionPolicy,
    options: &ParseOptions,
) -> IngestResult<()> {
    match coerce_value(value.clone(), builder.column_type(), options) {
        Some(coerced) => Ok(builder.push(&coerced)?),
        None => {
            let token = value.to_text().unwrap_or_default();
            reject(policy, builder, row, &token)
        }
    }
}

fn reject(
    policy: CoercionPolicy,
    builder: &mut ColumnBuilder,
    row: usize,
    token: &str,
) -> IngestResult<()> {
    match policy {
        CoercionPolicy::Fail => Err(IngestError::Coercion {
            row,
            column: builder.name().to_owned(),
            token: token.to_owned(),
            column_type: builder.column_type(),
        }),
        CoercionPolicy::NaOnError => {
            log::warn!(
                "row {row}, column `{}`: `{token}` is not a valid {}, storing NA",
                builder.name(),
                builder.column_type()
            );
            builder.push_na();
            Ok(())
        }
    }
}

/// Convert a typed value for storage in a column of type `target`.
///
/// Numeric values widen, any value converts to `String` through its text form,
/// strings parse as `target`, and longs narrow to ints when they fit. Returns
/// `None` when none of these apply.
pub fn coerce_value(value: Value, target: ColumnType, options: &ParseOptions) -> Option<Value> {
    let Some(actual) = value.column_type() else {
        return Some(Value::Na);
    };
    if target.accepts(actual) || target == ColumnType::String {
        return value.cast(target);
    }
    match (value, target) {
        (Value::String(s), _) => parse_token(&s, target, options),
        (Value::Long(v), ColumnType::Int) => i32::try_from(v).ok().map(Value::Int),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("id", ColumnType::Int),
            ColumnSchema::new("score", ColumnType::Double),
        ]
    }

    #[test]
    fn tokens_are_parsed_under_the_schema() {
        let options = ParseOptions::default();
        let mut assembler = RowAssembler::new(&schema(), &options).unwrap();
        assembler.push_tokens(2, &["1", "2"]).unwrap();
        assembler.push_tokens(3, &["NA", "2.5"]).unwrap();
        let table = assembler.finish().unwrap();
        assert_eq!(
            table.to_rows(),
            vec![
                vec![Value::Int(1), Value::Double(2.0)],
                vec![Value::Na, Value::Double(2.5)],
            ]
        );
    }

    #[test]
    fn unparsable_tokens_fail_by_default() {
        let options = ParseOptions::default();
        let mut assembler = RowAssembler::new(&schema(), &options).unwrap();
        let err = assembler.push_tokens(7, &["x", "1"]).unwrap_err();
        match err {
            IngestError::Coercion {
                row,
                column,
                token,
                column_type,
            } => {
                assert_eq!(row, 7);
                assert_eq!(column, "id");
                assert_eq!(token, "x");
                assert_eq!(column_type, ColumnType::Int);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn permissive_policy_substitutes_na() {
        let options = ParseOptions {
            coercion: CoercionPolicy::NaOnError,
            ..ParseOptions::default()
        };
        let mut assembler = RowAssembler::new(&schema(), &options).unwrap();
        assembler.push_tokens(2, &["x", "1"]).unwrap();
        let table = assembler.finish().unwrap();
        assert_eq!(table.get(0, "id"), Value::Na);
        assert_eq!(table.get(0, "score"), Value::Double(1.0));
    }

    #[test]
    fn permissive_policy_never_covers_ragged_rows() {
        let options = ParseOptions {
            coercion: CoercionPolicy::NaOnError,
            ..ParseOptions::default()
        };
        let mut assembler = RowAssembler::new(&schema(), &options).unwrap();
        assert!(matches!(
            assembler.push_tokens(4, &["1", "2", "3"]),
            Err(IngestError::RaggedRow { row: 4, .. })
        ));
        assert!(matches!(
            assembler.push_values(5, vec![Value::Int(1)]),
            Err(IngestError::RaggedRow { row: 5, .. })
        ));
    }

    #[test]
    fn records_fill_missing_columns_with_na() {
        let options = ParseOptions::default();
        let mut assembler = RowAssembler::new(&schema(), &options).unwrap();
        assembler
            .push_record(
                1,
                &[
                    ("score".to_owned(), Value::Int(3)),
                    ("ignored".to_owned(), Value::from("x")),
                ],
            )
            .unwrap();
        let table = assembler.finish().unwrap();
        assert_eq!(table.to_rows(), vec![vec![Value::Na, Value::Double(3.0)]]);
    }

    #[test]
    fn value_coercion_rules() {
        let options = ParseOptions::default();
        assert_eq!(
            coerce_value(Value::Int(3), ColumnType::Long, &options),
            Some(Value::Long(3))
        );
        assert_eq!(
            coerce_value(Value::Boolean(true), ColumnType::String, &options),
            Some(Value::from("true"))
        );
        assert_eq!(
            coerce_value(Value::from("12"), ColumnType::Int, &options),
            Some(Value::Int(12))
        );
        assert_eq!(
            coerce_value(Value::Long(i64::MAX), ColumnType::Int, &options),
            None
        );
        assert_eq!(
            coerce_value(Value::Double(1.5), ColumnType::Int, &options),
            None
        );
        assert_eq!(
            coerce_value(Value::Boolean(true), ColumnType::Int, &options),
            None
        );
    }
}
