use crate::schema::ColumnTypeSpec;

/// Default layouts tried, in order, when parsing `DateTime` tokens.
pub const DEFAULT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Default date-only layouts; parsed values land at midnight.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

/// What to do with a token that does not parse under its column's resolved type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoercionPolicy {
    /// Abort the build with a coercion error.
    #[default]
    Fail,
    /// Store NA in the cell and keep going.
    NaOnError,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// Attempt to decode as UTF-8; if a field contains invalid UTF-8, fall back to Windows-1252.
    #[default]
    Auto,
    /// Decode as UTF-8 and reject invalid byte sequences.
    Utf8,
    /// Decode as Windows-1252 (aka CP-1252).
    Windows1252,
}

/// Token-level parsing rules shared by every reader.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Token that stands for a missing value.
    pub na_string: String,
    /// Treat empty and whitespace-only tokens as missing.
    pub empty_as_na: bool,
    /// Number of non-missing tokens per column examined during inference.
    pub max_peek: usize,
    /// Decimal separator used when parsing doubles.
    ///
    /// `.` matches inputs like `1234.56`. `,` matches inputs like `1234,56`.
    pub decimal_separator: char,
    /// `chrono` layouts for date-time tokens.
    pub datetime_formats: Vec<String>,
    /// `chrono` layouts for date-only tokens.
    pub date_formats: Vec<String>,
    pub coercion: CoercionPolicy,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            na_string: "NA".to_owned(),
            empty_as_na: true,
            max_peek: 100,
            decimal_separator: '.',
            datetime_formats: DEFAULT_DATETIME_FORMATS
                .iter()
                .map(|f| (*f).to_owned())
                .collect(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| (*f).to_owned()).collect(),
            coercion: CoercionPolicy::default(),
        }
    }
}

impl ParseOptions {
    pub fn is_na(&self, token: &str) -> bool {
        let trimmed = token.trim();
        trimmed == self.na_string || (self.empty_as_na && trimmed.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct DelimitedOptions {
    pub delimiter: u8,
    pub quote: u8,
    /// Escape byte inside quoted fields; `None` means quotes are escaped by doubling.
    pub escape: Option<u8>,
    /// Lines starting with this byte are ignored.
    pub comment: Option<u8>,
    pub has_header: bool,
    /// Raw lines discarded before the header is read.
    pub skip: usize,
    /// Strip surrounding whitespace from every field.
    pub trim: bool,
    pub encoding: TextEncoding,
    pub column_types: Option<ColumnTypeSpec>,
    pub parse: ParseOptions,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: None,
            comment: None,
            has_header: true,
            skip: 0,
            trim: false,
            encoding: TextEncoding::default(),
            column_types: None,
            parse: ParseOptions::default(),
        }
    }
}

impl DelimitedOptions {
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FixedWidthOptions {
    /// Raw lines discarded before the first data line.
    pub skip: usize,
    pub encoding: TextEncoding,
    pub column_types: Option<ColumnTypeSpec>,
    pub parse: ParseOptions,
}

/// Shaping rules for semi-structured record sources.
#[derive(Clone, Debug)]
pub struct RecordOptions {
    /// Name of the synthetic column holding the group name of grouped sources.
    pub id_column: String,
    /// Joiner for flattened nested map keys (`parent.child`). `None` keeps nested
    /// maps as JSON text.
    pub nested_separator: Option<String>,
    /// Field names dropped from the schema. Excluding a map also drops its
    /// flattened children.
    pub exclude: Vec<String>,
    pub column_types: Option<ColumnTypeSpec>,
    pub parse: ParseOptions,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            id_column: "_id".to_owned(),
            nested_separator: Some(".".to_owned()),
            exclude: Vec::new(),
            column_types: None,
            parse: ParseOptions::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct JsonOptions {
    /// Object keys descended into before records are extracted.
    pub path: Vec<String>,
    pub records: RecordOptions,
}

#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub delimiter: u8,
    /// Written for missing cells. A present cell whose text equals this token
    /// is written unchanged and reads back as missing, so pick a token the
    /// data cannot contain; the writer logs a warning on the first collision.
    pub na_string: String,
    pub header: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            na_string: "NA".to_owned(),
            header: true,
        }
    }
}
