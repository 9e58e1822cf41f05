#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Logical type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int,
    Long,
    Double,
    Boolean,
    DateTime,
}

impl ColumnType {
    pub const ALL: [ColumnType; 6] = [
        ColumnType::String,
        ColumnType::Int,
        ColumnType::Long,
        ColumnType::Double,
        ColumnType::Boolean,
        ColumnType::DateTime,
    ];

    /// Single-character code used by compact column specs.
    pub fn code(self) -> char {
        match self {
            ColumnType::String => 's',
            ColumnType::Int => 'i',
            ColumnType::Long => 'l',
            ColumnType::Double => 'd',
            ColumnType::Boolean => 'b',
            ColumnType::DateTime => 't',
        }
    }

    /// Inverse of [`ColumnType::code`]. `c` is accepted as an alias for strings.
    pub fn from_code(code: char) -> Option<ColumnType> {
        match code.to_ascii_lowercase() {
            's' | 'c' => Some(ColumnType::String),
            'i' => Some(ColumnType::Int),
            'l' => Some(ColumnType::Long),
            'd' => Some(ColumnType::Double),
            'b' => Some(ColumnType::Boolean),
            't' => Some(ColumnType::DateTime),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int | ColumnType::Long | ColumnType::Double)
    }

    /// Next type in the widening chain `Boolean < Int < Long < Double < String`.
    ///
    /// `DateTime` sits outside the chain and widens straight to `String`.
    pub fn next_wider(self) -> Option<ColumnType> {
        match self {
            ColumnType::Boolean => Some(ColumnType::Int),
            ColumnType::Int => Some(ColumnType::Long),
            ColumnType::Long => Some(ColumnType::Double),
            ColumnType::Double | ColumnType::DateTime => Some(ColumnType::String),
            ColumnType::String => None,
        }
    }

    fn numeric_rank(self) -> Option<u8> {
        match self {
            ColumnType::Int => Some(0),
            ColumnType::Long => Some(1),
            ColumnType::Double => Some(2),
            _ => None,
        }
    }

    /// Whether a value of type `value_type` can be stored in a column of this type
    /// without going through its text form.
    pub fn accepts(self, value_type: ColumnType) -> bool {
        if self == value_type {
            return true;
        }
        match (self.numeric_rank(), value_type.numeric_rank()) {
            (Some(column), Some(value)) => value <= column,
            _ => false,
        }
    }

    /// Smallest type able to hold values of both `self` and `other`.
    ///
    /// Numeric types widen among themselves; any other mix falls back to `String`.
    pub fn unify(self, other: ColumnType) -> ColumnType {
        if self == other {
            return self;
        }
        match (self.numeric_rank(), other.numeric_rank()) {
            (Some(a), Some(b)) => {
                if a >= b {
                    self
                } else {
                    other
                }
            }
            _ => ColumnType::String,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "String",
            ColumnType::Int => "Int",
            ColumnType::Long => "Long",
            ColumnType::Double => "Double",
            ColumnType::Boolean => "Boolean",
            ColumnType::DateTime => "DateTime",
        };
        f.write_str(name)
    }
}

/// Canonical text layout for date-times written by tabula.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single cell.
///
/// `Na` is the missing marker shared by every column type.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Na,
    String(Arc<str>),
    Int(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_na(&self) -> bool {
        matches!(self, Value::Na)
    }

    /// Type of the value, `None` for `Na`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Na => None,
            Value::String(_) => Some(ColumnType::String),
            Value::Int(_) => Some(ColumnType::Int),
            Value::Long(_) => Some(ColumnType::Long),
            Value::Double(_) => Some(ColumnType::Double),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::DateTime(_) => Some(ColumnType::DateTime),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }

    /// Text form used when a value lands in a `String` column or is exported.
    ///
    /// Returns `None` for `Na`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Na => None,
            Value::String(s) => Some(s.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Long(v) => Some(v.to_string()),
            Value::Double(v) => Some(format_f64(*v)),
            Value::Boolean(v) => Some(v.to_string()),
            Value::DateTime(v) => Some(v.format(DATETIME_FORMAT).to_string()),
        }
    }

    /// Convert the value so it fits a column of type `target`.
    ///
    /// Numeric values widen, anything converts to `String` through [`Value::to_text`],
    /// and `Na` stays `Na`. Returns `None` when no lossless conversion exists.
    pub fn cast(&self, target: ColumnType) -> Option<Value> {
        let Some(own) = self.column_type() else {
            return Some(Value::Na);
        };
        if own == target {
            return Some(self.clone());
        }
        match target {
            ColumnType::String => self.to_text().map(|s| Value::String(Arc::from(s))),
            ColumnType::Long => match self {
                Value::Int(v) => Some(Value::Long(i64::from(*v))),
                _ => None,
            },
            ColumnType::Double => match self {
                Value::Int(v) => Some(Value::Double(f64::from(*v))),
                Value::Long(v) => Some(Value::Double(*v as f64)),
                _ => None,
            },
            _ => None,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Int(_) => 1,
            Value::Long(_) => 2,
            Value::Double(_) => 3,
            Value::DateTime(_) => 4,
            Value::String(_) => 5,
            Value::Na => 6,
        }
    }
}

/// Format a double so that integral values keep a decimal point and every other
/// value uses the shortest representation that parses back to the same bits.
pub fn format_f64(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Na, Value::Na) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            Value::Na => {}
            Value::String(s) => s.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Double(v) => OrderedFloat(*v).hash(state),
            Value::Boolean(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: values of one type compare naturally, numbers compare across
/// widths, and `Na` sorts after everything else.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => OrderedFloat(x)
                    .cmp(&OrderedFloat(y))
                    .then_with(|| a.variant_rank().cmp(&b.variant_rank())),
                _ => a.variant_rank().cmp(&b.variant_rank()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NA"),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Na)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_widens_numbers_and_falls_back_to_string() {
        assert_eq!(ColumnType::Int.unify(ColumnType::Long), ColumnType::Long);
        assert_eq!(ColumnType::Double.unify(ColumnType::Int), ColumnType::Double);
        assert_eq!(ColumnType::Boolean.unify(ColumnType::Int), ColumnType::String);
        assert_eq!(
            ColumnType::DateTime.unify(ColumnType::DateTime),
            ColumnType::DateTime
        );
    }

    #[test]
    fn codes_roundtrip() {
        for ty in ColumnType::ALL {
            assert_eq!(ColumnType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ColumnType::from_code('c'), Some(ColumnType::String));
        assert_eq!(ColumnType::from_code('x'), None);
    }

    #[test]
    fn na_sorts_last_and_numbers_compare_across_widths() {
        let mut values = vec![
            Value::Na,
            Value::Double(2.5),
            Value::Int(3),
            Value::Long(1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Long(1),
                Value::Double(2.5),
                Value::Int(3),
                Value::Na
            ]
        );
    }

    #[test]
    fn cast_widens_and_stringifies() {
        assert_eq!(Value::Int(4).cast(ColumnType::Double), Some(Value::Double(4.0)));
        assert_eq!(Value::Double(4.5).cast(ColumnType::Int), None);
        assert_eq!(
            Value::Boolean(true).cast(ColumnType::String),
            Some(Value::from("true"))
        );
        assert_eq!(Value::Na.cast(ColumnType::Boolean), Some(Value::Na));
    }

    #[test]
    fn doubles_keep_a_decimal_point() {
        assert_eq!(format_f64(3.0), "3.0");
        assert_eq!(format_f64(-0.25), "-0.25");
        assert_eq!(format_f64(0.1 + 0.2), "0.30000000000000004");
    }
}
