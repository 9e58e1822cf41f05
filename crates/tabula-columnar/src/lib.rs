//! Typed in-memory columnar tables.
//!
//! This crate focuses on:
//! - Fixed-type column storage with a uniform missing-value (`NA`) marker.
//! - Immutable tables built row-at-a-time or from in-memory values.
//! - Selection, derivation, filtering, sorting, grouping and joining that
//!   produce new tables sharing unchanged columns with their source.

#![forbid(unsafe_code)]

mod bitmap;
mod column;
mod error;
mod query;
mod stats;
mod table;
mod types;

pub use crate::bitmap::BitVec;
pub use crate::column::{unify_value_types, Column, ColumnBuilder};
pub use crate::error::{TableError, TableResult};
pub use crate::query::{AggKind, AggSpec, GroupedTable, JoinKind, SortKey};
pub use crate::stats::ColumnStats;
pub use crate::table::{ColumnSchema, RowView, Table, TableBuilder};
pub use crate::types::{format_f64, ColumnType, Value, DATETIME_FORMAT};
