//! Column type inference over raw text tokens.
//!
//! A column's type is the narrowest type in the chain
//! `Boolean < Int < Long < Double < String` under which every examined token
//! parses. Tokens that look like date-times start a `DateTime` column instead;
//! anything else mixed into such a column widens it to `String`.

use chrono::{NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::sync::Arc;
use tabula_columnar::{ColumnType, Value};

use crate::options::ParseOptions;

/// Infer the narrowest type that fits the first `max_peek` non-missing tokens.
///
/// Missing tokens are skipped without counting towards `max_peek`. A column
/// with no present tokens is typed `String`.
pub fn infer_column_type<'a>(
    tokens: impl IntoIterator<Item = &'a str>,
    max_peek: usize,
    options: &ParseOptions,
) -> ColumnType {
    let peeked: Vec<&str> = tokens
        .into_iter()
        .filter(|t| !options.is_na(t))
        .take(max_peek)
        .collect();

    let mut running: Option<ColumnType> = None;
    for token in &peeked {
        let start = running.unwrap_or_else(|| {
            if parses(token, ColumnType::DateTime, options) {
                ColumnType::DateTime
            } else {
                ColumnType::Boolean
            }
        });
        running = Some(narrowest_from(token, start, options));
    }

    let Some(mut settled) = running else {
        return ColumnType::String;
    };

    // A token accepted early can be rejected by a type chosen later, e.g.
    // `true` followed by `1` settles on Int, which cannot hold `true`.
    while !peeked.iter().all(|t| parses(t, settled, options)) {
        match settled.next_wider() {
            Some(wider) => settled = wider,
            None => break,
        }
    }
    settled
}

fn narrowest_from(token: &str, start: ColumnType, options: &ParseOptions) -> ColumnType {
    let mut candidate = start;
    loop {
        if parses(token, candidate, options) {
            return candidate;
        }
        match candidate.next_wider() {
            Some(wider) => candidate = wider,
            None => return ColumnType::String,
        }
    }
}

fn parses(token: &str, column_type: ColumnType, options: &ParseOptions) -> bool {
    // `NaN` and `inf` load into declared Double columns but never make a
    // column numeric.
    if column_type == ColumnType::Double && parse_non_finite(token.trim()).is_some() {
        return false;
    }
    matches!(parse_token(token, column_type, options), Some(v) if !v.is_na())
}

/// Parse one raw token as `column_type`.
///
/// Missing tokens (the NA string, and blank tokens when `empty_as_na` is set)
/// yield `Some(Value::Na)`; tokens that do not parse yield `None`. Doubles
/// also accept `NaN`, `inf` and `-inf` as written by [`format_f64`].
///
/// [`format_f64`]: tabula_columnar::format_f64
pub fn parse_token(token: &str, column_type: ColumnType, options: &ParseOptions) -> Option<Value> {
    if options.is_na(token) {
        return Some(Value::Na);
    }
    let v = token.trim();
    match column_type {
        ColumnType::String => Some(Value::String(Arc::from(token))),
        ColumnType::Boolean => parse_bool(v).map(Value::Boolean),
        ColumnType::Int => parse_integer(v).and_then(|x| i32::try_from(x).ok()).map(Value::Int),
        ColumnType::Long => parse_integer(v).map(Value::Long),
        ColumnType::Double => parse_double(v, options.decimal_separator)
            .or_else(|| parse_non_finite(v))
            .map(Value::Double),
        ColumnType::DateTime => parse_datetime(v, options).map(Value::DateTime),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    if v.eq_ignore_ascii_case("true") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_integer(v: &str) -> Option<i64> {
    let digits = v.strip_prefix(['+', '-']).unwrap_or(v);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    v.parse().ok()
}

fn parse_double(v: &str, decimal_separator: char) -> Option<f64> {
    let normalized: Cow<'_, str> = if decimal_separator == '.' {
        Cow::Borrowed(v)
    } else {
        if v.contains('.') {
            return None;
        }
        Cow::Owned(v.replace(decimal_separator, "."))
    };

    // `f64::from_str` also accepts `inf` and `NaN`; only plain decimal and
    // exponent literals count as numbers here.
    let mut saw_digit = false;
    for ch in normalized.chars() {
        match ch {
            '0'..='9' => saw_digit = true,
            '+' | '-' | '.' | 'e' | 'E' => {}
            _ => return None,
        }
    }
    if !saw_digit {
        return None;
    }
    normalized.parse().ok()
}

fn parse_non_finite(v: &str) -> Option<f64> {
    let (negative, magnitude) = match v.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, v.strip_prefix('+').unwrap_or(v)),
    };
    let value = if magnitude.eq_ignore_ascii_case("inf") || magnitude.eq_ignore_ascii_case("infinity") {
        f64::INFINITY
    } else if magnitude.eq_ignore_ascii_case("nan") {
        f64::NAN
    } else {
        return None;
    };
    Some(if negative { -value } else { value })
}

fn parse_datetime(v: &str, options: &ParseOptions) -> Option<NaiveDateTime> {
    for format in &options.datetime_formats {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(v, format) {
            return Some(parsed);
        }
    }
    for format in &options.date_formats {
        if let Ok(parsed) = NaiveDate::parse_from_str(v, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn infer(tokens: &[&str]) -> ColumnType {
        let options = ParseOptions::default();
        infer_column_type(tokens.iter().copied(), options.max_peek, &options)
    }

    #[test]
    fn widening_follows_the_narrowest_fit() {
        assert_eq!(infer(&["1", "2", "3.5"]), ColumnType::Double);
        assert_eq!(infer(&["1", "2", "3"]), ColumnType::Int);
        assert_eq!(infer(&["true", "false"]), ColumnType::Boolean);
        assert_eq!(infer(&["1", "NA", "2"]), ColumnType::Int);
        assert_eq!(infer(&["1", "3000000000"]), ColumnType::Long);
        assert_eq!(infer(&["1", "x"]), ColumnType::String);
    }

    #[test]
    fn earlier_tokens_are_rechecked_under_the_settled_type() {
        assert_eq!(infer(&["true", "1"]), ColumnType::String);
        assert_eq!(infer(&["1", "true"]), ColumnType::String);
    }

    #[test]
    fn missing_runs_are_skipped() {
        assert_eq!(infer(&[]), ColumnType::String);
        assert_eq!(infer(&["NA", "", "  "]), ColumnType::String);
        assert_eq!(infer(&["NA", "NA", "NA", "4.5"]), ColumnType::Double);
    }

    #[test]
    fn peek_counts_only_present_tokens() {
        let options = ParseOptions::default();
        let tokens = ["NA", "NA", "1", "x"];
        assert_eq!(
            infer_column_type(tokens.iter().copied(), 1, &options),
            ColumnType::Int
        );
        assert_eq!(
            infer_column_type(tokens.iter().copied(), 2, &options),
            ColumnType::String
        );
    }

    #[test]
    fn dates_infer_as_datetime_unless_mixed() {
        assert_eq!(
            infer(&["2024-01-02", "2024-01-03T04:05:06"]),
            ColumnType::DateTime
        );
        assert_eq!(infer(&["2024-01-02", "7"]), ColumnType::String);
        assert_eq!(infer(&["7", "2024-01-02"]), ColumnType::String);
    }

    #[test]
    fn parse_token_respects_types_and_na() {
        let options = ParseOptions::default();
        assert_eq!(
            parse_token(" 42 ", ColumnType::Int, &options),
            Some(Value::Int(42))
        );
        assert_eq!(parse_token("NA", ColumnType::Int, &options), Some(Value::Na));
        assert_eq!(parse_token("", ColumnType::String, &options), Some(Value::Na));
        assert_eq!(parse_token("4.2", ColumnType::Int, &options), None);
        assert_eq!(parse_token("inf", ColumnType::Int, &options), None);
        assert_eq!(
            parse_token("1e3", ColumnType::Double, &options),
            Some(Value::Double(1000.0))
        );
        assert_eq!(
            parse_token("TRUE", ColumnType::Boolean, &options),
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn non_finite_doubles_load_but_never_infer() {
        let options = ParseOptions::default();
        assert_eq!(
            parse_token("NaN", ColumnType::Double, &options),
            Some(Value::Double(f64::NAN))
        );
        assert_eq!(
            parse_token("inf", ColumnType::Double, &options),
            Some(Value::Double(f64::INFINITY))
        );
        assert_eq!(
            parse_token("-inf", ColumnType::Double, &options),
            Some(Value::Double(f64::NEG_INFINITY))
        );
        assert_eq!(parse_token("-nan-", ColumnType::Double, &options), None);

        assert_eq!(infer(&["NaN"]), ColumnType::String);
        assert_eq!(infer(&["1.5", "inf"]), ColumnType::String);
    }

    #[test]
    fn decimal_comma_is_honoured() {
        let options = ParseOptions {
            decimal_separator: ',',
            ..ParseOptions::default()
        };
        assert_eq!(
            parse_token("3,25", ColumnType::Double, &options),
            Some(Value::Double(3.25))
        );
        assert_eq!(parse_token("3.25", ColumnType::Double, &options), None);
    }

    #[test]
    fn empty_tokens_are_values_when_configured() {
        let options = ParseOptions {
            empty_as_na: false,
            ..ParseOptions::default()
        };
        assert_eq!(
            parse_token("", ColumnType::String, &options),
            Some(Value::from(""))
        );
        assert_eq!(parse_token("", ColumnType::Int, &options), None);
    }
}
