//! Resolution of user column type specifications against a source's columns.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tabula_columnar::{ColumnSchema, ColumnType};

use crate::error::{IngestError, IngestResult};
use crate::infer::infer_column_type;
use crate::options::ParseOptions;

/// Map key that carries the fallback type for unmapped columns.
pub const DEFAULT_KEY: &str = ".default";

/// Type requested for one column: a concrete type, or inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeHint {
    Infer,
    Declared(ColumnType),
}

impl TypeHint {
    pub fn code(self) -> char {
        match self {
            TypeHint::Infer => '?',
            TypeHint::Declared(ty) => ty.code(),
        }
    }
}

impl From<ColumnType> for TypeHint {
    fn from(value: ColumnType) -> Self {
        TypeHint::Declared(value)
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::Infer => f.write_str("?"),
            TypeHint::Declared(ty) => write!(f, "{}", ty.to_string().to_ascii_lowercase()),
        }
    }
}

/// Accepts `?`, a single type code (`i`, `d`, ...) or a type name (`int`, `datetime`, ...).
impl FromStr for TypeHint {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "?" {
            return Ok(TypeHint::Infer);
        }
        let mut chars = s.chars();
        if let (Some(code), None) = (chars.next(), chars.next()) {
            if let Some(ty) = ColumnType::from_code(code) {
                return Ok(TypeHint::Declared(ty));
            }
        }
        ColumnType::ALL
            .into_iter()
            .find(|ty| ty.to_string().eq_ignore_ascii_case(s))
            .map(TypeHint::Declared)
            .ok_or_else(|| IngestError::UnknownTypeName { name: s.to_owned() })
    }
}

/// User-declared column types for one ingest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SpecRepr", into = "SpecRepr")]
pub enum ColumnTypeSpec {
    /// Types by column name; unmapped columns are inferred.
    PerName(BTreeMap<String, TypeHint>),
    /// One hint per column, in source column order.
    Positional(Vec<TypeHint>),
    /// Types by name plus a fallback for every unmapped column. A `None` or
    /// `Infer` fallback leaves unmapped columns to inference.
    Mixed {
        names: BTreeMap<String, TypeHint>,
        default: Option<TypeHint>,
    },
}

impl ColumnTypeSpec {
    /// Parse a compact positional spec such as `"sid?b"`.
    pub fn compact(codes: &str) -> IngestResult<Self> {
        codes
            .chars()
            .enumerate()
            .map(|(position, code)| match code {
                '?' => Ok(TypeHint::Infer),
                _ => ColumnType::from_code(code)
                    .map(TypeHint::Declared)
                    .ok_or(IngestError::UnknownTypeCode { code, position }),
            })
            .collect::<IngestResult<Vec<_>>>()
            .map(ColumnTypeSpec::Positional)
    }

    /// Build from a name map. A [`DEFAULT_KEY`] entry turns the map into
    /// [`ColumnTypeSpec::Mixed`].
    pub fn from_map<K: Into<String>>(entries: impl IntoIterator<Item = (K, TypeHint)>) -> Self {
        let mut names: BTreeMap<String, TypeHint> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        match names.remove(DEFAULT_KEY) {
            Some(default) => ColumnTypeSpec::Mixed {
                names,
                default: Some(default),
            },
            None => ColumnTypeSpec::PerName(names),
        }
    }

    fn explicit_names(&self) -> Option<&BTreeMap<String, TypeHint>> {
        match self {
            ColumnTypeSpec::PerName(names) | ColumnTypeSpec::Mixed { names, .. } => Some(names),
            ColumnTypeSpec::Positional(_) => None,
        }
    }

    /// One hint per column, validating these types against `names`.
    pub fn hints(&self, names: &[String]) -> IngestResult<Vec<TypeHint>> {
        if let Some(explicit) = self.explicit_names() {
            if let Some(unknown) = explicit.keys().find(|k| !names.contains(*k)) {
                return Err(IngestError::UnknownSpecColumn {
                    column: unknown.clone(),
                });
            }
        }
        match self {
            ColumnTypeSpec::Positional(codes) => {
                if codes.len() != names.len() {
                    return Err(IngestError::SpecLength {
                        codes: codes.len(),
                        columns: names.len(),
                    });
                }
                Ok(codes.clone())
            }
            ColumnTypeSpec::PerName(explicit) => Ok(names
                .iter()
                .map(|n| explicit.get(n).copied().unwrap_or(TypeHint::Infer))
                .collect()),
            ColumnTypeSpec::Mixed { names: explicit, default } => {
                let fallback = default.unwrap_or(TypeHint::Infer);
                Ok(names
                    .iter()
                    .map(|n| explicit.get(n).copied().unwrap_or(fallback))
                    .collect())
            }
        }
    }
}

/// Wire form: a compact code string or a name map (with optional `.default`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum SpecRepr {
    Compact(String),
    Map(BTreeMap<String, String>),
}

impl TryFrom<SpecRepr> for ColumnTypeSpec {
    type Error = IngestError;

    fn try_from(value: SpecRepr) -> Result<Self, Self::Error> {
        match value {
            SpecRepr::Compact(codes) => ColumnTypeSpec::compact(&codes),
            SpecRepr::Map(map) => {
                let entries = map
                    .into_iter()
                    .map(|(name, ty)| Ok((name, ty.parse::<TypeHint>()?)))
                    .collect::<IngestResult<Vec<_>>>()?;
                Ok(ColumnTypeSpec::from_map(entries))
            }
        }
    }
}

impl From<ColumnTypeSpec> for SpecRepr {
    fn from(value: ColumnTypeSpec) -> Self {
        let render = |names: BTreeMap<String, TypeHint>| -> BTreeMap<String, String> {
            names.into_iter().map(|(k, v)| (k, v.to_string())).collect()
        };
        match value {
            ColumnTypeSpec::Positional(codes) => {
                SpecRepr::Compact(codes.into_iter().map(TypeHint::code).collect())
            }
            ColumnTypeSpec::PerName(names) => SpecRepr::Map(render(names)),
            ColumnTypeSpec::Mixed { names, default } => {
                let mut map = render(names);
                if let Some(default) = default {
                    map.insert(DEFAULT_KEY.to_owned(), default.to_string());
                }
                SpecRepr::Map(map)
            }
        }
    }
}

/// Access to buffered raw tokens, per column, for type inference.
pub trait SampleSource {
    fn tokens(&self, column: usize) -> Box<dyn Iterator<Item = &str> + '_>;
}

/// Column-major token lists.
impl<S: AsRef<str>> SampleSource for [Vec<S>] {
    fn tokens(&self, column: usize) -> Box<dyn Iterator<Item = &str> + '_> {
        match self.get(column) {
            Some(tokens) => Box::new(tokens.iter().map(|t| t.as_ref())),
            None => Box::new(std::iter::empty()),
        }
    }
}

/// Resolve the ordered column schema of a rectangular text source.
///
/// Declared types are used as given; every other column is inferred from
/// `samples`.
pub fn resolve_schema<S: SampleSource + ?Sized>(
    header: &[String],
    spec: Option<&ColumnTypeSpec>,
    samples: &S,
    options: &ParseOptions,
) -> IngestResult<Vec<ColumnSchema>> {
    resolve_with(header, spec, |idx| {
        Ok(infer_column_type(samples.tokens(idx), options.max_peek, options))
    })
}

/// Shared resolution: validate names and declared types, then fill inferred columns
/// through `infer`.
pub(crate) fn resolve_with(
    header: &[String],
    spec: Option<&ColumnTypeSpec>,
    mut infer: impl FnMut(usize) -> IngestResult<ColumnType>,
) -> IngestResult<Vec<ColumnSchema>> {
    let mut seen = HashSet::with_capacity(header.len());
    for name in header {
        if !seen.insert(name.as_str()) {
            return Err(IngestError::DuplicateColumn {
                column: name.clone(),
            });
        }
    }

    let hints = match spec {
        Some(spec) => spec.hints(header)?,
        None => vec![TypeHint::Infer; header.len()],
    };

    header
        .iter()
        .zip(hints)
        .enumerate()
        .map(|(idx, (name, hint))| {
            let column_type = match hint {
                TypeHint::Declared(ty) => ty,
                TypeHint::Infer => {
                    let ty = infer(idx)?;
                    log::debug!("inferred column `{name}` as {ty}");
                    ty
                }
            };
            Ok(ColumnSchema::new(name.clone(), column_type))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    fn samples() -> Vec<Vec<&'static str>> {
        vec![vec!["1", "2"], vec!["x", "y"], vec!["1.5", "NA"]]
    }

    #[test]
    fn absent_spec_infers_everything() {
        let schema = resolve_schema(
            &header(&["a", "b", "c"]),
            None,
            samples().as_slice(),
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(
            schema,
            vec![
                ColumnSchema::new("a", ColumnType::Int),
                ColumnSchema::new("b", ColumnType::String),
                ColumnSchema::new("c", ColumnType::Double),
            ]
        );
    }

    #[test]
    fn mixed_default_applies_only_to_unmapped_names() {
        let spec = ColumnTypeSpec::from_map([
            ("a", TypeHint::Declared(ColumnType::Double)),
            (DEFAULT_KEY, TypeHint::Declared(ColumnType::String)),
        ]);
        assert!(matches!(spec, ColumnTypeSpec::Mixed { .. }));

        let schema = resolve_schema(
            &header(&["a", "b", "c"]),
            Some(&spec),
            samples().as_slice(),
            &ParseOptions::default(),
        )
        .unwrap();
        let types: Vec<ColumnType> = schema.iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::Double, ColumnType::String, ColumnType::String]
        );
    }

    #[test]
    fn compact_codes_map_by_position() {
        let spec = ColumnTypeSpec::compact("l?s").unwrap();
        let schema = resolve_schema(
            &header(&["a", "b", "c"]),
            Some(&spec),
            samples().as_slice(),
            &ParseOptions::default(),
        )
        .unwrap();
        let types: Vec<ColumnType> = schema.iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![ColumnType::Long, ColumnType::String, ColumnType::String]
        );

        assert!(matches!(
            ColumnTypeSpec::compact("ix"),
            Err(IngestError::UnknownTypeCode {
                code: 'x',
                position: 1
            })
        ));
    }

    #[test]
    fn spec_mismatches_are_schema_errors() {
        let short = ColumnTypeSpec::compact("ii").unwrap();
        let err = resolve_schema(
            &header(&["a", "b", "c"]),
            Some(&short),
            samples().as_slice(),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::SpecLength {
                codes: 2,
                columns: 3
            }
        ));

        let unknown = ColumnTypeSpec::from_map([("zzz", TypeHint::Declared(ColumnType::Int))]);
        let err = resolve_schema(
            &header(&["a"]),
            Some(&unknown),
            samples().as_slice(),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::UnknownSpecColumn { column } if column == "zzz"));
    }

    #[test]
    fn duplicate_header_names_are_structural() {
        let err = resolve_schema(
            &header(&["a", "a"]),
            None,
            samples().as_slice(),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::DuplicateColumn { .. }));
    }

    #[test]
    fn specs_load_from_json() {
        let spec: ColumnTypeSpec =
            serde_json::from_str(r#"{"price": "d", "when": "datetime", ".default": "?"}"#).unwrap();
        assert_eq!(
            spec,
            ColumnTypeSpec::Mixed {
                names: BTreeMap::from([
                    ("price".to_owned(), TypeHint::Declared(ColumnType::Double)),
                    ("when".to_owned(), TypeHint::Declared(ColumnType::DateTime)),
                ]),
                default: Some(TypeHint::Infer),
            }
        );

        let compact: ColumnTypeSpec = serde_json::from_str(r#""ib?""#).unwrap();
        assert_eq!(serde_json::to_string(&compact).unwrap(), r#""ib?""#);
    }
}
