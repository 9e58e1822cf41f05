//! Command-line front end for tabula: inspect a source's resolved schema,
//! preview rows, and convert sources to delimited text.

pub mod cli;
mod source;

pub use source::{load_table, parse_type_spec, Format, SourceArgs};
