//! Ingestion of external data into typed [`tabula_columnar::Table`]s.
//!
//! Every source goes through the same pipeline:
//! - raw cells are collected (text tokens, JSON nodes, driver values);
//! - a column type is resolved per column from an optional
//!   [`ColumnTypeSpec`] and, where the spec leaves it open, from the data;
//! - a [`RowAssembler`] coerces each cell into its column, with `NA` for
//!   missing cells.
//!
//! No partial table is returned on error.

#![forbid(unsafe_code)]

mod assemble;
mod cache;
mod decode;
mod delimited;
mod deparse;
mod error;
mod export;
mod fixed_width;
mod fs;
mod infer;
mod json;
mod options;
mod raw;
mod record;
mod relational;
mod schema;

pub use crate::assemble::{coerce_value, RowAssembler};
pub use crate::cache::DatasetCache;
pub use crate::delimited::{buffer_delimited, read_delimited};
pub use crate::deparse::{deparse_columns, deparse_with, Extractor};
pub use crate::error::{ErrorKind, IngestError, IngestResult};
pub use crate::export::{write_delimited, write_delimited_file};
pub use crate::fixed_width::{parse_widths, read_fixed_width, FixedWidthColumn};
pub use crate::infer::{infer_column_type, parse_token};
pub use crate::json::{json_to_records, read_json, read_json_str};
pub use crate::options::{
    CoercionPolicy, DelimitedOptions, FixedWidthOptions, JsonOptions, ParseOptions,
    RecordOptions, TextEncoding, WriteOptions, DEFAULT_DATETIME_FORMATS, DEFAULT_DATE_FORMATS,
};
pub use crate::raw::RawColumns;
pub use crate::record::{read_records, resolve_record_schema, RawRecord, RecordSource, RecordValue};
pub use crate::relational::{read_result_set, NativeType, ResultSet, SqlColumn};
pub use crate::schema::{resolve_schema, ColumnTypeSpec, SampleSource, TypeHint, DEFAULT_KEY};
