//! Grouping and reduction of row-level frames into [`AggregateTable`]s.

use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::period::{weekday_name, Granularity, PeriodBin};
use crate::presentation::ValueKind;
use crate::tables::columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    /// Number of non-missing values
    Count,
    /// Number of distinct non-missing values
    CountDistinct,
}

/// One output column of an aggregation: `reduction` applied to `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub name: String,
    pub source: String,
    pub reduction: Reduction,
    pub kind: ValueKind,
}

impl Measure {
    pub fn new(name: impl Into<String>, source: impl Into<String>, reduction: Reduction) -> Self {
        let kind = match reduction {
            Reduction::Count | Reduction::CountDistinct => ValueKind::Count,
            Reduction::Sum | Reduction::Mean => ValueKind::Raw,
        };
        Self {
            name: name.into(),
            source: source.into(),
            reduction,
            kind,
        }
    }

    pub fn sum(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(name, source, Reduction::Sum)
    }

    pub fn mean(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(name, source, Reduction::Mean)
    }

    pub fn count(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(name, source, Reduction::Count)
    }

    pub fn count_distinct(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(name, source, Reduction::CountDistinct)
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    fn expr(&self) -> Expr {
        let c = col(self.source.as_str());
        match self.reduction {
            Reduction::Sum => c.cast(DataType::Float64).sum(),
            Reduction::Mean => c.cast(DataType::Float64).mean(),
            Reduction::Count => c.count().cast(DataType::Float64),
            Reduction::CountDistinct => c.drop_nulls().n_unique().cast(DataType::Float64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Text,
    Integer,
    /// Epoch-microsecond bin starts produced by [`crate::period::annotate`]
    Period(Granularity),
    /// Monday = 0
    Weekday,
    Hour,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey {
    pub column: String,
    pub kind: KeyKind,
}

impl GroupKey {
    pub fn text(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            kind: KeyKind::Text,
        }
    }

    pub fn integer(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            kind: KeyKind::Integer,
        }
    }

    pub fn period(granularity: Granularity) -> Self {
        Self {
            column: columns::PERIOD_START.to_string(),
            kind: KeyKind::Period(granularity),
        }
    }

    pub fn weekday() -> Self {
        Self {
            column: columns::WEEKDAY.to_string(),
            kind: KeyKind::Weekday,
        }
    }

    pub fn hour() -> Self {
        Self {
            column: columns::HOUR.to_string(),
            kind: KeyKind::Hour,
        }
    }
}

/// A group-key value. Missing keys order after every present one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Text(String),
    Integer(i64),
    Period(PeriodBin),
    Weekday(i64),
    Missing,
}

impl KeyValue {
    pub fn label(&self) -> String {
        match self {
            KeyValue::Text(s) => s.clone(),
            KeyValue::Integer(i) => i.to_string(),
            KeyValue::Period(b) => b.label(),
            KeyValue::Weekday(d) => weekday_name(*d).to_string(),
            KeyValue::Missing => String::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_period(&self) -> Option<&PeriodBin> {
        match self {
            KeyValue::Period(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ValueKind,
    /// `None` for columns derived after aggregation
    pub reduction: Option<Reduction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<KeyValue>,
    pub values: Vec<Option<f64>>,
}

/// Read access to one row by column name.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a AggregateTable,
    row: &'a AggregateRow,
}

impl<'a> RowRef<'a> {
    pub fn value(&self, name: &str) -> Option<f64> {
        let idx = self.table.columns.iter().position(|c| c.name == name)?;
        self.row.values.get(idx).copied().flatten()
    }

    pub fn value_at(&self, idx: usize) -> Option<f64> {
        self.row.values.get(idx).copied().flatten()
    }

    pub fn key(&self, column: &str) -> Option<&'a KeyValue> {
        let idx = self.table.keys.iter().position(|k| k.column == column)?;
        self.row.keys.get(idx)
    }

    pub fn keys(&self) -> &'a [KeyValue] {
        &self.row.keys
    }
}

/// How [`AggregateTable::densify`] fills rows it adds for empty groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapFill {
    /// Sums and counts become zero; means and derived columns stay undefined.
    Additive,
    /// Every value becomes zero.
    Zero,
}

/// Aggregated rows keyed by one or more group keys.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    keys: Vec<GroupKey>,
    columns: Vec<ColumnSpec>,
    rows: Vec<AggregateRow>,
}

fn compare_rows(a: &AggregateRow, b: &AggregateRow) -> Ordering {
    a.keys.cmp(&b.keys)
}

impl AggregateTable {
    pub fn new(keys: Vec<GroupKey>, columns: Vec<ColumnSpec>, mut rows: Vec<AggregateRow>) -> Self {
        rows.sort_by(compare_rows);
        Self { keys, columns, rows }
    }

    pub fn keys(&self) -> &[GroupKey] {
        &self.keys
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<AggregateRow> {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |row| RowRef { table: self, row })
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| DashboardError::MissingColumn {
                table: "aggregate".to_string(),
                column: name.to_string(),
            })
    }

    pub fn key_index(&self, column: &str) -> Result<usize> {
        self.keys
            .iter()
            .position(|k| k.column == column)
            .ok_or_else(|| DashboardError::MissingColumn {
                table: "aggregate".to_string(),
                column: column.to_string(),
            })
    }

    pub fn values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Sum of the defined values of `name`.
    pub fn total(&self, name: &str) -> Result<f64> {
        Ok(self.values(name)?.into_iter().flatten().sum())
    }

    /// Append a column computed from each row.
    pub fn with_derived<F>(mut self, name: impl Into<String>, kind: ValueKind, f: F) -> Self
    where
        F: Fn(RowRef<'_>) -> Option<f64>,
    {
        let computed: Vec<Option<f64>> = self.iter().map(&f).collect();
        self.columns.push(ColumnSpec {
            name: name.into(),
            kind,
            reduction: None,
        });
        for (row, value) in self.rows.iter_mut().zip(computed) {
            row.values.push(value);
        }
        self
    }

    /// Append a column from precomputed values, one per row in current order.
    pub fn with_column_values(
        mut self,
        name: impl Into<String>,
        kind: ValueKind,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(DashboardError::invalid_parameter(
                name,
                format!("expected {} values, got {}", self.rows.len(), values.len()),
            ));
        }
        self.columns.push(ColumnSpec {
            name,
            kind,
            reduction: None,
        });
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.push(value);
        }
        Ok(self)
    }

    pub fn retain<F>(mut self, f: F) -> Self
    where
        F: Fn(RowRef<'_>) -> bool,
    {
        let keep: Vec<bool> = self.iter().map(&f).collect();
        let mut flags = keep.into_iter();
        self.rows.retain(|_| flags.next().unwrap_or(false));
        self
    }

    pub fn sort_by_keys(mut self) -> Self {
        self.rows.sort_by(compare_rows);
        self
    }

    /// Add a row for every key tuple in `expected` that has no row yet, then restore key order.
    pub fn densify(mut self, expected: &[Vec<KeyValue>], fill: GapFill) -> Self {
        let present: BTreeSet<Vec<KeyValue>> = self.rows.iter().map(|r| r.keys.clone()).collect();
        let template: Vec<Option<f64>> = self
            .columns
            .iter()
            .map(|c| match (fill, c.reduction) {
                (GapFill::Zero, _) => Some(0.0),
                (GapFill::Additive, Some(Reduction::Sum | Reduction::Count | Reduction::CountDistinct)) => {
                    Some(0.0)
                }
                (GapFill::Additive, _) => None,
            })
            .collect();

        let mut added = 0usize;
        for keys in expected {
            if !present.contains(keys) {
                self.rows.push(AggregateRow {
                    keys: keys.clone(),
                    values: template.clone(),
                });
                added += 1;
            }
        }
        debug!(added, rows = self.rows.len(), "densified");
        self.sort_by_keys()
    }
}

fn key_values(df: &DataFrame, key: &GroupKey) -> Result<Vec<KeyValue>> {
    let column = df.column(&key.column)?;
    let values = match key.kind {
        KeyKind::Text => {
            let text = column.cast(&DataType::String)?;
            text.str()?
                .into_iter()
                .map(|v| v.map_or(KeyValue::Missing, |s| KeyValue::Text(s.to_string())))
                .collect()
        }
        kind => {
            let ints = column.cast(&DataType::Int64)?;
            ints.i64()?
                .into_iter()
                .map(|v| match (v, kind) {
                    (None, _) => KeyValue::Missing,
                    (Some(us), KeyKind::Period(g)) => PeriodBin::from_start_micros(us, g)
                        .map_or(KeyValue::Missing, KeyValue::Period),
                    (Some(d), KeyKind::Weekday) => KeyValue::Weekday(d),
                    (Some(i), _) => KeyValue::Integer(i),
                })
                .collect()
        }
    };
    Ok(values)
}

/// Group `df` by `keys` and reduce each measure per group.
///
/// Only groups with at least one row are emitted; see [`AggregateTable::densify`] for empty
/// groups. Rows come back in ascending key order.
pub fn aggregate(df: &DataFrame, keys: &[GroupKey], measures: &[Measure]) -> Result<AggregateTable> {
    let names = df.get_column_names();
    let required = keys
        .iter()
        .map(|k| k.column.as_str())
        .chain(measures.iter().map(|m| m.source.as_str()));
    for column in required {
        if !names.iter().any(|n| n.as_str() == column) {
            return Err(DashboardError::MissingColumn {
                table: "aggregation input".to_string(),
                column: column.to_string(),
            });
        }
    }

    let specs: Vec<ColumnSpec> = measures
        .iter()
        .map(|m| ColumnSpec {
            name: m.name.clone(),
            kind: m.kind,
            reduction: Some(m.reduction),
        })
        .collect();

    if df.height() == 0 {
        return Ok(AggregateTable::new(keys.to_vec(), specs, Vec::new()));
    }

    let aliases: Vec<String> = (0..measures.len()).map(|i| format!("__m{}", i)).collect();
    let aggs: Vec<Expr> = measures
        .iter()
        .zip(&aliases)
        .map(|(m, alias)| m.expr().alias(alias.as_str()))
        .collect();
    let by: Vec<Expr> = keys.iter().map(|k| col(k.column.as_str())).collect();

    let grouped = if keys.is_empty() {
        df.clone().lazy().select(aggs).collect()?
    } else {
        df.clone().lazy().group_by(by).agg(aggs).collect()?
    };

    let key_columns: Vec<Vec<KeyValue>> = keys
        .iter()
        .map(|k| key_values(&grouped, k))
        .collect::<Result<_>>()?;
    let mut value_columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(aliases.len());
    for alias in &aliases {
        let values = grouped.column(alias)?.cast(&DataType::Float64)?;
        value_columns.push(values.f64()?.into_iter().collect());
    }

    let rows = (0..grouped.height())
        .map(|i| AggregateRow {
            keys: key_columns.iter().map(|c| c[i].clone()).collect(),
            values: value_columns.iter().map(|c| c[i]).collect(),
        })
        .collect();

    let table = AggregateTable::new(keys.to_vec(), specs, rows);
    debug!(input = df.height(), groups = table.len(), "aggregated");
    Ok(table)
}
