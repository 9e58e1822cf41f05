//! JSON documents as record sources.
//!
//! - a top-level array is a flat sequence of records;
//! - an object whose values are all arrays or objects is a map of named groups;
//! - any other object is a single record.
//!
//! A lone record whose fields are all nested (`{"engine": {..}, "tags": [..]}`)
//! therefore reads as groups keyed `_id`. Wrap it in an array to read it as
//! one record.

use serde_json::Value as Json;
use std::io::Read;
use tabula_columnar::Table;

use crate::error::{IngestError, IngestResult};
use crate::options::JsonOptions;
use crate::record::{read_records, RawRecord, RecordSource, RecordValue};

pub fn read_json<R: Read>(reader: R, options: &JsonOptions) -> IngestResult<Table> {
    let document: Json = serde_json::from_reader(reader)?;
    let source = json_to_records(document, &options.path)?;
    read_records(&source, &options.records)
}

pub fn read_json_str(text: &str, options: &JsonOptions) -> IngestResult<Table> {
    read_json(text.as_bytes(), options)
}

/// Descend `path` and classify the node found there as a record source.
///
/// An array is a flat record list. A non-empty object whose values are all
/// arrays or objects is grouped, even when it was meant as a single record
/// with only nested fields; any other object is one record.
pub fn json_to_records(document: Json, path: &[String]) -> IngestResult<RecordSource> {
    let mut node = document;
    for (depth, key) in path.iter().enumerate() {
        node = match node {
            Json::Object(mut fields) => fields.remove(key),
            _ => None,
        }
        .ok_or_else(|| IngestError::JsonPath {
            path: path[..=depth].join("."),
        })?;
    }

    match node {
        Json::Array(items) => items
            .into_iter()
            .map(into_record)
            .collect::<IngestResult<Vec<_>>>()
            .map(RecordSource::Flat),
        Json::Object(fields)
            if !fields.is_empty()
                && fields.values().all(|v| v.is_array() || v.is_object()) =>
        {
            let mut groups = Vec::with_capacity(fields.len());
            for (name, group) in fields {
                let records = match group {
                    Json::Array(items) => items
                        .into_iter()
                        .map(into_record)
                        .collect::<IngestResult<Vec<_>>>()?,
                    other => vec![into_record(other)?],
                };
                groups.push((name, records));
            }
            Ok(RecordSource::Grouped(groups))
        }
        Json::Object(fields) => Ok(RecordSource::Flat(vec![into_record(Json::Object(fields))?])),
        other => Err(IngestError::UnsupportedJson {
            reason: format!("expected an array or object, found {}", kind_name(&other)),
        }),
    }
}

fn into_record(node: Json) -> IngestResult<RawRecord> {
    match node {
        Json::Object(fields) => Ok(fields
            .into_iter()
            .map(|(k, v)| (k, RecordValue::from(v)))
            .collect()),
        other => Err(IngestError::UnsupportedJson {
            reason: format!("expected a record object, found {}", kind_name(&other)),
        }),
    }
}

fn kind_name(node: &Json) -> &'static str {
    match node {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

impl From<Json> for RecordValue {
    fn from(value: Json) -> Self {
        match value {
            Json::Null => RecordValue::Null,
            Json::Bool(b) => RecordValue::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => RecordValue::Int(i),
                None => RecordValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => RecordValue::String(s),
            Json::Array(items) => RecordValue::Seq(items.into_iter().map(RecordValue::from).collect()),
            Json::Object(fields) => RecordValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, RecordValue::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn path_descends_before_classifying() {
        let doc = json!({"data": {"cars": [{"model": "Sentra"}]}});
        let source =
            json_to_records(doc, &["data".to_owned(), "cars".to_owned()]).unwrap();
        assert_eq!(
            source,
            RecordSource::Flat(vec![RawRecord::new().with("model", "Sentra")])
        );
    }

    #[test]
    fn missing_path_reports_prefix() {
        let doc = json!({"data": {}});
        let err = json_to_records(doc, &["data".to_owned(), "cars".to_owned()]).unwrap_err();
        assert!(matches!(err, IngestError::JsonPath { path } if path == "data.cars"));
    }

    #[test]
    fn scalar_object_is_one_record() {
        let source = json_to_records(json!({"a": 1, "b": [1, 2]}), &[]).unwrap();
        assert!(matches!(source, RecordSource::Flat(ref r) if r.len() == 1));
    }

    #[test]
    fn all_nested_object_reads_as_groups() {
        let doc = json!({"engine": {"hp": 130}, "tags": [{"name": "eco"}]});
        let source = json_to_records(doc.clone(), &[]).unwrap();
        assert_eq!(
            source,
            RecordSource::Grouped(vec![
                ("engine".to_owned(), vec![RawRecord::new().with("hp", 130_i64)]),
                ("tags".to_owned(), vec![RawRecord::new().with("name", "eco")]),
            ])
        );

        let wrapped = json_to_records(json!([doc]), &[]).unwrap();
        assert!(matches!(wrapped, RecordSource::Flat(ref r) if r.len() == 1));
    }

    #[test]
    fn scalars_are_not_documents() {
        let err = json_to_records(json!(3), &[]).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedJson { .. }));
        let err = json_to_records(json!([1, 2]), &[]).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedJson { .. }));
    }
}
