#![forbid(unsafe_code)]

//! Row selection, ordering, grouping and joining over [`Table`].
//!
//! Every operation returns a new table. Columns that pass through unchanged are
//! shared with the source rather than copied.

use crate::bitmap::BitVec;
use crate::column::{Column, ColumnBuilder};
use crate::error::{TableError, TableResult};
use crate::table::{RowView, Table};
use crate::types::{ColumnType, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Rows whose keys match on both sides.
    Inner,
    /// Every left row; unmatched rows get `Na` for right columns.
    Left,
    /// Every row from both sides.
    Outer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggKind {
    CountRows,
    CountNonNull,
    Sum,
    Mean,
    Min,
    Max,
    NDistinct,
}

impl AggKind {
    fn label(self) -> &'static str {
        match self {
            AggKind::CountRows => "n",
            AggKind::CountNonNull => "count",
            AggKind::Sum => "sum",
            AggKind::Mean => "mean",
            AggKind::Min => "min",
            AggKind::Max => "max",
            AggKind::NDistinct => "n_distinct",
        }
    }
}

/// One output column of [`GroupedTable::summarize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggSpec {
    pub kind: AggKind,
    pub column: Option<String>,
    pub name: Option<String>,
}

impl AggSpec {
    fn on(kind: AggKind, column: impl Into<String>) -> Self {
        Self {
            kind,
            column: Some(column.into()),
            name: None,
        }
    }

    pub fn count_rows() -> Self {
        Self {
            kind: AggKind::CountRows,
            column: None,
            name: None,
        }
    }

    pub fn count_non_null(column: impl Into<String>) -> Self {
        Self::on(AggKind::CountNonNull, column)
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Self::on(AggKind::Sum, column)
    }

    pub fn mean(column: impl Into<String>) -> Self {
        Self::on(AggKind::Mean, column)
    }

    pub fn min(column: impl Into<String>) -> Self {
        Self::on(AggKind::Min, column)
    }

    pub fn max(column: impl Into<String>) -> Self {
        Self::on(AggKind::Max, column)
    }

    pub fn n_distinct(column: impl Into<String>) -> Self {
        Self::on(AggKind::NDistinct, column)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, else `n` for row counts and `<column>_<agg>` otherwise.
    pub fn output_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.column {
            Some(column) => format!("{column}_{}", self.kind.label()),
            None => self.kind.label().to_owned(),
        }
    }
}

impl Table {
    pub fn select(&self, names: &[&str]) -> TableResult<Table> {
        let columns = names
            .iter()
            .map(|name| Ok(self.shared_column(self.column_index(name)?)))
            .collect::<TableResult<Vec<_>>>()?;
        Table::from_shared(columns)
    }

    pub fn remove(&self, names: &[&str]) -> TableResult<Table> {
        let mut removed = HashSet::with_capacity(names.len());
        for name in names {
            removed.insert(self.column_index(name)?);
        }
        let columns = (0..self.column_count())
            .filter(|idx| !removed.contains(idx))
            .map(|idx| self.shared_column(idx))
            .collect();
        Ok(Table::from_checked(columns))
    }

    pub fn rename(&self, from: &str, to: &str) -> TableResult<Table> {
        let idx = self.column_index(from)?;
        if from != to && self.contains(to) {
            return Err(TableError::DuplicateColumn {
                column: to.to_owned(),
            });
        }
        let columns = (0..self.column_count())
            .map(|i| {
                let column = self.shared_column(i);
                if i == idx {
                    Arc::new(column.renamed(to))
                } else {
                    column
                }
            })
            .collect();
        Ok(Table::from_checked(columns))
    }

    /// Append `column`, or replace the existing column of the same name in place.
    pub fn with_column(&self, column: Column) -> TableResult<Table> {
        if self.column_count() > 0 && column.len() != self.row_count() {
            return Err(TableError::LengthMismatch {
                column: column.name().to_owned(),
                expected: self.row_count(),
                actual: column.len(),
            });
        }
        let mut columns: Vec<Arc<Column>> =
            (0..self.column_count()).map(|i| self.shared_column(i)).collect();
        match self.column_index(column.name()) {
            Ok(idx) => columns[idx] = Arc::new(column),
            Err(_) => columns.push(Arc::new(column)),
        }
        Ok(Table::from_checked(columns))
    }

    /// Add (or replace) a column computed from each row. The column type is unified
    /// from the produced values.
    pub fn derive(
        &self,
        name: impl Into<String>,
        f: impl Fn(&RowView<'_>) -> Value,
    ) -> TableResult<Table> {
        let values: Vec<Value> = self.rows().map(|row| f(&row)).collect();
        self.with_column(Column::infer(name, values))
    }

    pub fn filter(&self, predicate: impl Fn(&RowView<'_>) -> bool) -> Table {
        let rows: Vec<usize> = self
            .rows()
            .filter(|row| predicate(row))
            .map(|row| row.index())
            .collect();
        self.take(&rows)
    }

    /// Keep the rows whose bit is set.
    pub fn filter_mask(&self, mask: &BitVec) -> TableResult<Table> {
        if mask.len() != self.row_count() {
            return Err(TableError::MaskLength {
                expected: self.row_count(),
                actual: mask.len(),
            });
        }
        let rows: Vec<usize> = mask.iter_ones().collect();
        Ok(self.take(&rows))
    }

    /// Gather rows by index, in the given order. Out-of-range indices produce `Na` rows.
    pub fn take(&self, rows: &[usize]) -> Table {
        let columns = self.columns().map(|c| Arc::new(c.take(rows))).collect();
        Table::from_checked(columns)
    }

    pub fn slice(&self, range: Range<usize>) -> Table {
        let end = range.end.min(self.row_count());
        let start = range.start.min(end);
        let rows: Vec<usize> = (start..end).collect();
        self.take(&rows)
    }

    pub fn head(&self, n: usize) -> Table {
        self.slice(0..n)
    }

    pub fn tail(&self, n: usize) -> Table {
        let rows = self.row_count();
        self.slice(rows.saturating_sub(n)..rows)
    }

    /// Stable multi-key sort. Missing values sort last regardless of direction.
    pub fn sort_by(&self, keys: &[SortKey]) -> TableResult<Table> {
        let columns = keys
            .iter()
            .map(|k| Ok((self.column(&k.column)?, k.descending)))
            .collect::<TableResult<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..self.row_count()).collect();
        order.sort_by(|&a, &b| {
            for (column, descending) in &columns {
                let (va, vb) = (column.get(a), column.get(b));
                let ord = match (va.is_na(), vb.is_na()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) if *descending => vb.cmp(&va),
                    (false, false) => va.cmp(&vb),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        Ok(self.take(&order))
    }

    /// Partition rows by the values of `keys`, in first-seen order. Missing key
    /// values form their own group.
    pub fn group_by(&self, keys: &[&str]) -> TableResult<GroupedTable<'_>> {
        let key_idx = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<TableResult<Vec<_>>>()?;

        let mut groups: Vec<Vec<usize>> = Vec::new();
        if key_idx.is_empty() {
            groups.push((0..self.row_count()).collect());
        } else {
            let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();
            for row in 0..self.row_count() {
                let key: Vec<Value> = key_idx
                    .iter()
                    .map(|&idx| self.column_at(idx).map_or(Value::Na, |c| c.get(row)))
                    .collect();
                let group = *lookup.entry(key).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[group].push(row);
            }
        }

        Ok(GroupedTable {
            table: self,
            keys: key_idx,
            groups,
        })
    }

    /// Aggregate the whole table into a single row.
    pub fn summarize(&self, aggs: &[AggSpec]) -> TableResult<Table> {
        self.group_by(&[])?.summarize(aggs)
    }

    /// Join on equally named key columns. Numeric keys of different widths are
    /// compared after widening; missing keys never match. Non-key columns present on
    /// both sides get `.x` (left) and `.y` (right) suffixes.
    pub fn join(&self, other: &Table, on: &[&str], kind: JoinKind) -> TableResult<Table> {
        let mut key_types = Vec::with_capacity(on.len());
        for name in on {
            let left = self.column(name)?.column_type();
            let right = other.column(name)?.column_type();
            let unified = if left == right {
                left
            } else if left.is_numeric() && right.is_numeric() {
                left.unify(right)
            } else {
                return Err(TableError::JoinKeyType {
                    column: (*name).to_owned(),
                    left,
                    right,
                });
            };
            key_types.push(unified);
        }

        let key_of = |table: &Table, row: usize| -> Option<Vec<Value>> {
            on.iter()
                .zip(&key_types)
                .map(|(name, ty)| table.get(row, name).cast(*ty).filter(|v| !v.is_na()))
                .collect()
        };

        let mut right_index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
        for row in 0..other.row_count() {
            if let Some(key) = key_of(other, row) {
                right_index.entry(key).or_default().push(row);
            }
        }

        let mut left_rows: Vec<Option<usize>> = Vec::new();
        let mut right_rows: Vec<Option<usize>> = Vec::new();
        let mut right_matched = vec![false; other.row_count()];
        for row in 0..self.row_count() {
            match key_of(self, row).and_then(|k| right_index.get(&k)) {
                Some(matches) => {
                    for &r in matches {
                        left_rows.push(Some(row));
                        right_rows.push(Some(r));
                        right_matched[r] = true;
                    }
                }
                None if kind != JoinKind::Inner => {
                    left_rows.push(Some(row));
                    right_rows.push(None);
                }
                None => {}
            }
        }
        if kind == JoinKind::Outer {
            for (r, matched) in right_matched.iter().enumerate() {
                if !matched {
                    left_rows.push(None);
                    right_rows.push(Some(r));
                }
            }
        }

        let key_names: HashSet<&str> = on.iter().copied().collect();
        let left_rest: Vec<&Column> = self
            .columns()
            .filter(|c| !key_names.contains(c.name()))
            .collect();
        let right_rest: Vec<&Column> = other
            .columns()
            .filter(|c| !key_names.contains(c.name()))
            .collect();
        let left_names: HashSet<&str> = left_rest.iter().copied().map(Column::name).collect();
        let right_names: HashSet<&str> = right_rest.iter().copied().map(Column::name).collect();

        let mut columns: Vec<Column> = Vec::with_capacity(on.len() + left_rest.len() + right_rest.len());
        for (name, ty) in on.iter().zip(&key_types) {
            let mut builder = ColumnBuilder::with_capacity(*name, *ty, left_rows.len());
            for (l, r) in left_rows.iter().zip(&right_rows) {
                let value = match (l, r) {
                    (Some(l), _) => self.get(*l, name),
                    (None, Some(r)) => other.get(*r, name),
                    (None, None) => Value::Na,
                };
                builder.push_unchecked(&value.cast(*ty).unwrap_or(Value::Na));
            }
            columns.push(builder.finish());
        }
        for column in left_rest {
            let taken = column.take_opt(&left_rows);
            columns.push(if right_names.contains(column.name()) {
                taken.renamed(format!("{}.x", column.name()))
            } else {
                taken
            });
        }
        for column in right_rest {
            let taken = column.take_opt(&right_rows);
            columns.push(if left_names.contains(column.name()) {
                taken.renamed(format!("{}.y", column.name()))
            } else {
                taken
            });
        }
        log::debug!(
            "{kind:?} join on {on:?}: {} x {} rows -> {} rows",
            self.row_count(),
            other.row_count(),
            left_rows.len()
        );
        Table::new(columns)
    }

    /// Stack tables vertically. Columns are matched by name, the result holds the
    /// union of names in first-seen order, column types are unified and absent
    /// columns are filled with `Na`.
    pub fn bind_rows(tables: &[Table]) -> TableResult<Table> {
        let mut order: Vec<String> = Vec::new();
        let mut types: HashMap<String, ColumnType> = HashMap::new();
        for table in tables {
            for column in table.columns() {
                match types.get_mut(column.name()) {
                    Some(ty) => *ty = ty.unify(column.column_type()),
                    None => {
                        order.push(column.name().to_owned());
                        types.insert(column.name().to_owned(), column.column_type());
                    }
                }
            }
        }

        let total: usize = tables.iter().map(Table::row_count).sum();
        let mut columns = Vec::with_capacity(order.len());
        for name in order {
            let ty = types[&name];
            let mut builder = ColumnBuilder::with_capacity(&name, ty, total);
            for table in tables {
                match table.column(&name) {
                    Ok(column) => {
                        for value in column.iter() {
                            builder.push_unchecked(&value.cast(ty).unwrap_or(Value::Na));
                        }
                    }
                    Err(_) => (0..table.row_count()).for_each(|_| builder.push_na()),
                }
            }
            columns.push(builder.finish());
        }
        Table::new(columns)
    }
}

/// Rows of a table partitioned by key columns.
#[derive(Clone, Debug)]
pub struct GroupedTable<'a> {
    table: &'a Table,
    keys: Vec<usize>,
    groups: Vec<Vec<usize>>,
}

impl<'a> GroupedTable<'a> {
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Row indices of each group, in first-seen order.
    pub fn group_rows(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Each group materialized as its own table.
    pub fn tables(&self) -> Vec<Table> {
        self.groups.iter().map(|rows| self.table.take(rows)).collect()
    }

    /// One row per group: the key columns followed by one column per aggregation.
    pub fn summarize(&self, aggs: &[AggSpec]) -> TableResult<Table> {
        let first_rows: Vec<usize> = self
            .groups
            .iter()
            .map(|rows| rows.first().copied().unwrap_or(usize::MAX))
            .collect();

        let mut columns: Vec<Column> = self
            .keys
            .iter()
            .map(|&idx| self.table.shared_column(idx).take(&first_rows))
            .collect();
        for spec in aggs {
            columns.push(self.aggregate(spec)?);
        }
        Table::new(columns)
    }

    fn aggregate(&self, spec: &AggSpec) -> TableResult<Column> {
        let name = spec.output_name();
        let Some(column_name) = &spec.column else {
            let counts = self.groups.iter().map(|g| Value::Long(g.len() as i64));
            return Column::from_values(name, ColumnType::Long, counts);
        };
        let column = self.table.column(column_name)?;
        let ty = column.column_type();
        let present = |rows: &Vec<usize>| -> Vec<Value> {
            rows.iter()
                .map(|&r| column.get(r))
                .filter(|v| !v.is_na())
                .collect()
        };
        let unsupported = || TableError::UnsupportedAggregation {
            aggregation: spec.kind.label(),
            column: column_name.clone(),
            column_type: ty,
        };

        match spec.kind {
            AggKind::CountRows => {
                let counts = self.groups.iter().map(|g| Value::Long(g.len() as i64));
                Column::from_values(name, ColumnType::Long, counts)
            }
            AggKind::CountNonNull => {
                let counts = self
                    .groups
                    .iter()
                    .map(|g| Value::Long(present(g).len() as i64));
                Column::from_values(name, ColumnType::Long, counts)
            }
            AggKind::NDistinct => {
                let counts = self.groups.iter().map(|g| {
                    let distinct: HashSet<Value> = present(g).into_iter().collect();
                    Value::Long(distinct.len() as i64)
                });
                Column::from_values(name, ColumnType::Long, counts)
            }
            AggKind::Sum => match ty {
                ColumnType::Int | ColumnType::Long | ColumnType::Boolean => {
                    let sums = self.groups.iter().map(|g| {
                        let total = present(g).iter().fold(0i64, |acc, v| {
                            let x = match v {
                                Value::Boolean(b) => i64::from(*b),
                                other => other.as_i64().unwrap_or(0),
                            };
                            acc.saturating_add(x)
                        });
                        Value::Long(total)
                    });
                    Column::from_values(name, ColumnType::Long, sums)
                }
                ColumnType::Double => {
                    let sums = self.groups.iter().map(|g| {
                        Value::Double(present(g).iter().filter_map(Value::as_f64).sum())
                    });
                    Column::from_values(name, ColumnType::Double, sums)
                }
                _ => Err(unsupported()),
            },
            AggKind::Mean => {
                if !(ty.is_numeric() || ty == ColumnType::Boolean) {
                    return Err(unsupported());
                }
                let means = self.groups.iter().map(|g| {
                    let values: Vec<f64> = present(g)
                        .iter()
                        .map(|v| match v {
                            Value::Boolean(b) => f64::from(u8::from(*b)),
                            other => other.as_f64().unwrap_or(0.0),
                        })
                        .collect();
                    if values.is_empty() {
                        Value::Na
                    } else {
                        Value::Double(values.iter().sum::<f64>() / values.len() as f64)
                    }
                });
                Column::from_values(name, ColumnType::Double, means)
            }
            AggKind::Min | AggKind::Max => {
                let pick_max = spec.kind == AggKind::Max;
                let extremes = self.groups.iter().map(|g| {
                    let values = present(g).into_iter();
                    let picked = if pick_max { values.max() } else { values.min() };
                    picked.unwrap_or(Value::Na)
                });
                Column::from_values(name, ty, extremes)
            }
        }
    }
}
