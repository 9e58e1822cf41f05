//! Build tables from in-memory collections of Rust values.
//!
//! Column types come from the values themselves rather than from text: the
//! first non-missing value of a column fixes its type, narrower numeric values
//! later in the column widen into it, and any other mismatch is a coercion
//! error. A column with no values at all is a `String` column of `NA`s.

use std::collections::HashMap;
use std::fmt;

use tabula_columnar::{ColumnBuilder, ColumnType, Table, TableError, Value};

use crate::error::{IngestError, IngestResult};

/// A named accessor pulling one column's value out of an item.
pub struct Extractor<T> {
    pub name: String,
    pub extract: Box<dyn Fn(&T) -> Value>,
}

impl<T> Extractor<T> {
    pub fn new(name: impl Into<String>, extract: impl Fn(&T) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            extract: Box::new(extract),
        }
    }
}

impl<T> fmt::Debug for Extractor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extractor").field("name", &self.name).finish()
    }
}

/// Deparse items through a mapping function returning named values.
///
/// Columns are the union of the returned names in first-seen order; a name an
/// item does not return is `NA` for that item's row.
pub fn deparse_with<T, F>(items: &[T], mut fields: F) -> IngestResult<Table>
where
    F: FnMut(&T) -> Vec<(String, Value)>,
{
    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut columns: Vec<Vec<Value>> = Vec::new();

    for (row, item) in items.iter().enumerate() {
        for (name, value) in fields(item) {
            let idx = match index.get(&name) {
                Some(&idx) => idx,
                None => {
                    let idx = names.len();
                    index.insert(name.clone(), idx);
                    names.push(name);
                    columns.push(vec![Value::Na; row]);
                    idx
                }
            };
            let column = &mut columns[idx];
            if column.len() > row {
                return Err(IngestError::DuplicateColumn {
                    column: names[idx].clone(),
                });
            }
            column.push(value);
        }
        for column in &mut columns {
            column.resize(row + 1, Value::Na);
        }
    }

    build(names, columns)
}

/// Deparse items through one extractor per column. Each extractor runs exactly
/// once per item, in declaration order.
pub fn deparse_columns<T>(items: &[T], extractors: &[Extractor<T>]) -> IngestResult<Table> {
    let mut seen = HashMap::with_capacity(extractors.len());
    for extractor in extractors {
        if seen.insert(extractor.name.as_str(), ()).is_some() {
            return Err(IngestError::DuplicateColumn {
                column: extractor.name.clone(),
            });
        }
    }

    let mut columns: Vec<Vec<Value>> = extractors
        .iter()
        .map(|_| Vec::with_capacity(items.len()))
        .collect();
    for item in items {
        for (column, extractor) in columns.iter_mut().zip(extractors) {
            column.push((extractor.extract)(item));
        }
    }

    let names = extractors.iter().map(|e| e.name.clone()).collect();
    build(names, columns)
}

fn build(names: Vec<String>, columns: Vec<Vec<Value>>) -> IngestResult<Table> {
    let built = names
        .into_iter()
        .zip(columns)
        .map(|(name, values)| build_column(name, values))
        .collect::<IngestResult<Vec<_>>>()?;
    Ok(Table::new(built)?)
}

fn build_column(name: String, values: Vec<Value>) -> IngestResult<tabula_columnar::Column> {
    let column_type = values
        .iter()
        .find_map(Value::column_type)
        .unwrap_or(ColumnType::String);
    let mut builder = ColumnBuilder::with_capacity(name, column_type, values.len());
    for (row, value) in values.iter().enumerate() {
        builder.push(value).map_err(|err| match err {
            TableError::TypeMismatch {
                column, expected, ..
            } => IngestError::Coercion {
                row: row + 1,
                column,
                token: value.to_text().unwrap_or_default(),
                column_type: expected,
            },
            other => IngestError::Table(other),
        })?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;
    use tabula_columnar::ColumnSchema;

    struct Car {
        model: &'static str,
        doors: Option<i32>,
        price: f64,
    }

    fn cars() -> Vec<Car> {
        vec![
            Car {
                model: "Sentra",
                doors: Some(4),
                price: 19.5,
            },
            Car {
                model: "Roadster",
                doors: None,
                price: 88.0,
            },
        ]
    }

    #[test]
    fn extractors_run_once_per_item() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let extractors = vec![
            Extractor::new("model", |c: &Car| Value::from(c.model)),
            Extractor::new("doors", move |c: &Car| {
                counter.set(counter.get() + 1);
                c.doors.map_or(Value::Na, Value::from)
            }),
            Extractor::new("price", |c: &Car| Value::from(c.price)),
        ];
        let table = deparse_columns(&cars(), &extractors).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(
            table.schema(),
            vec![
                ColumnSchema::new("model", ColumnType::String),
                ColumnSchema::new("doors", ColumnType::Int),
                ColumnSchema::new("price", ColumnType::Double),
            ]
        );
        assert_eq!(table.get(1, "doors"), Value::Na);
    }

    #[test]
    fn mapped_names_are_unioned() {
        let table = deparse_with(&cars(), |c| {
            let mut fields = vec![("model".to_owned(), Value::from(c.model))];
            if let Some(doors) = c.doors {
                fields.push(("doors".to_owned(), Value::from(doors)));
            } else {
                fields.push(("convertible".to_owned(), Value::from(true)));
            }
            fields
        })
        .unwrap();
        assert_eq!(table.names(), vec!["model", "doors", "convertible"]);
        assert_eq!(
            table.to_rows(),
            vec![
                vec![Value::from("Sentra"), Value::Int(4), Value::Na],
                vec![Value::from("Roadster"), Value::Na, Value::Boolean(true)],
            ]
        );
    }

    #[test]
    fn first_value_fixes_the_type() {
        let items = [Value::Long(1), Value::Int(2), Value::Na];
        let table = deparse_with(&items, |v| vec![("n".to_owned(), v.clone())]).unwrap();
        assert_eq!(table.column("n").unwrap().column_type(), ColumnType::Long);

        let items = [Value::Int(1), Value::from("two")];
        let err = deparse_with(&items, |v| vec![("n".to_owned(), v.clone())]).unwrap_err();
        assert!(matches!(
            err,
            IngestError::Coercion { row: 2, ref token, column_type: ColumnType::Int, .. }
                if token == "two"
        ));
    }

    #[test]
    fn all_missing_column_is_string() {
        let items = [(), ()];
        let table = deparse_with(&items, |_| vec![("x".to_owned(), Value::Na)]).unwrap();
        assert_eq!(table.column("x").unwrap().column_type(), ColumnType::String);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    #[should_panic(expected = "bad item")]
    fn extractor_panics_propagate() {
        let extractors = vec![Extractor::new("x", |_: &i32| -> Value { panic!("bad item") })];
        let _ = deparse_columns(&[1], &extractors);
    }
}
