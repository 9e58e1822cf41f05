//! Semi-structured records and their flattening into rectangular rows.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;
use tabula_columnar::{ColumnSchema, ColumnType, Table, Value, DATETIME_FORMAT};

use crate::assemble::RowAssembler;
use crate::error::IngestResult;
use crate::options::RecordOptions;
use crate::schema::resolve_with;

/// An untyped field value of a semi-structured record.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordValue {
    Null,
    String(String),
    Int(i64),
    Double(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Map(Vec<(String, RecordValue)>),
    Seq(Vec<RecordValue>),
}

impl RecordValue {
    /// Scalar cell value. Integers that fit in 32 bits become `Int`; nested
    /// values become their JSON text.
    pub fn to_value(&self) -> Value {
        match self {
            RecordValue::Null => Value::Na,
            RecordValue::String(s) => Value::String(Arc::from(s.as_str())),
            RecordValue::Int(v) => match i32::try_from(*v) {
                Ok(small) => Value::Int(small),
                Err(_) => Value::Long(*v),
            },
            RecordValue::Double(v) => Value::Double(*v),
            RecordValue::Boolean(v) => Value::Boolean(*v),
            RecordValue::Timestamp(v) => Value::DateTime(*v),
            RecordValue::Map(_) | RecordValue::Seq(_) => {
                Value::String(Arc::from(self.to_json().to_string()))
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            RecordValue::Null => Json::Null,
            RecordValue::String(s) => Json::String(s.clone()),
            RecordValue::Int(v) => Json::from(*v),
            RecordValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            RecordValue::Boolean(v) => Json::Bool(*v),
            RecordValue::Timestamp(v) => Json::String(v.format(DATETIME_FORMAT).to_string()),
            RecordValue::Map(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            RecordValue::Seq(items) => Json::Array(items.iter().map(RecordValue::to_json).collect()),
        }
    }
}

impl From<&str> for RecordValue {
    fn from(value: &str) -> Self {
        RecordValue::String(value.to_owned())
    }
}

impl From<i64> for RecordValue {
    fn from(value: i64) -> Self {
        RecordValue::Int(value)
    }
}

impl From<f64> for RecordValue {
    fn from(value: f64) -> Self {
        RecordValue::Double(value)
    }
}

impl From<bool> for RecordValue {
    fn from(value: bool) -> Self {
        RecordValue::Boolean(value)
    }
}

/// Ordered field list of one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RecordValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<RecordValue>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, RecordValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RecordValue)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (K, RecordValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordSource {
    /// A flat sequence of records.
    Flat(Vec<RawRecord>),
    /// Named groups of records; rows carry their group name in a synthetic id column.
    Grouped(Vec<(String, Vec<RawRecord>)>),
}

impl RecordSource {
    pub fn record_count(&self) -> usize {
        match self {
            RecordSource::Flat(records) => records.len(),
            RecordSource::Grouped(groups) => groups.iter().map(|(_, r)| r.len()).sum(),
        }
    }
}

/// Records flattened to scalar cells, plus the union of their column names in
/// first-seen order and the unified type of each column.
struct Flattened {
    names: Vec<String>,
    types: Vec<Option<ColumnType>>,
    rows: Vec<Vec<(String, Value)>>,
}

impl Flattened {
    fn collect(source: &RecordSource, options: &RecordOptions) -> Self {
        let mut flat = Flattened {
            names: Vec::new(),
            types: Vec::new(),
            rows: Vec::with_capacity(source.record_count()),
        };
        let mut index: HashMap<String, usize> = HashMap::new();

        match source {
            RecordSource::Flat(records) => {
                for record in records {
                    flat.add(record, None, options, &mut index);
                }
            }
            RecordSource::Grouped(groups) => {
                flat.observe(&options.id_column, ColumnType::String.into(), &mut index);
                for (group, records) in groups {
                    for record in records {
                        flat.add(record, Some(group.as_str()), options, &mut index);
                    }
                }
            }
        }
        flat
    }

    fn add(
        &mut self,
        record: &RawRecord,
        group: Option<&str>,
        options: &RecordOptions,
        index: &mut HashMap<String, usize>,
    ) {
        let separator = options.nested_separator.as_deref();
        let mut cells = Vec::with_capacity(record.len() + 1);
        for (name, value) in record.fields() {
            flatten_into(name.clone(), value, separator, &mut cells);
        }
        cells.retain(|(name, _)| !is_excluded(name, options));
        if let Some(group) = group {
            // The group name wins over a record field of the same name.
            cells.retain(|(name, _)| name != &options.id_column);
            cells.push((options.id_column.clone(), Value::from(group)));
        }
        for (name, value) in &cells {
            self.observe(name, value.column_type(), index);
        }
        self.rows.push(cells);
    }

    fn observe(
        &mut self,
        name: &str,
        column_type: Option<ColumnType>,
        index: &mut HashMap<String, usize>,
    ) {
        let idx = match index.get(name) {
            Some(&idx) => idx,
            None => {
                index.insert(name.to_owned(), self.names.len());
                self.names.push(name.to_owned());
                self.types.push(None);
                self.names.len() - 1
            }
        };
        if let Some(ty) = column_type {
            let slot = &mut self.types[idx];
            *slot = Some(slot.map_or(ty, |current| current.unify(ty)));
        }
    }

    fn schema(&self, options: &RecordOptions) -> IngestResult<Vec<ColumnSchema>> {
        resolve_with(&self.names, options.column_types.as_ref(), |idx| {
            Ok(self.types[idx].unwrap_or(ColumnType::String))
        })
    }
}

fn flatten_into(
    name: String,
    value: &RecordValue,
    separator: Option<&str>,
    out: &mut Vec<(String, Value)>,
) {
    match (value, separator) {
        (RecordValue::Map(fields), Some(sep)) => {
            for (key, child) in fields {
                flatten_into(format!("{name}{sep}{key}"), child, separator, out);
            }
        }
        _ => out.push((name, value.to_value())),
    }
}

fn is_excluded(name: &str, options: &RecordOptions) -> bool {
    options.exclude.iter().any(|excluded| {
        name == excluded
            || options.nested_separator.as_deref().is_some_and(|sep| {
                name.strip_prefix(excluded.as_str())
                    .is_some_and(|rest| rest.starts_with(sep))
            })
    })
}

/// Resolve the column schema of a record source.
///
/// Columns are the union of flattened field names in first-seen order, led by
/// the synthetic id column for grouped sources. Each column's type unifies the
/// types of its present values, and a user spec in `options` applies on top.
pub fn resolve_record_schema(
    source: &RecordSource,
    options: &RecordOptions,
) -> IngestResult<Vec<ColumnSchema>> {
    Flattened::collect(source, options).schema(options)
}

pub fn read_records(source: &RecordSource, options: &RecordOptions) -> IngestResult<Table> {
    let flat = Flattened::collect(source, options);
    let schema = flat.schema(options)?;
    let mut assembler = RowAssembler::with_capacity(&schema, flat.rows.len(), &options.parse)?;
    for (idx, row) in flat.rows.iter().enumerate() {
        assembler.push_record(idx + 1, row)?;
    }
    assembler.finish()
}
