//! The output boundary: sorting, truncation, rounding and conversion of aggregate tables
//! for display and export.
//!
//! Nothing upstream rounds. Values keep full precision until [`finalize`].

use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::aggregate::{AggregateRow, AggregateTable, KeyKind, KeyValue};
use crate::config::PresentationConfig;
use crate::error::{DashboardError, Result};

/// What a numeric column holds, which decides how it is rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Currency,
    Percent,
    Count,
    /// Unitless statistics such as correlations or average counts
    Score,
    /// Never rounded (coordinates)
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingPolicy {
    pub currency_decimals: u32,
    pub percent_decimals: u32,
    pub score_decimals: u32,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self::from(&PresentationConfig::default())
    }
}

impl From<&PresentationConfig> for RoundingPolicy {
    fn from(config: &PresentationConfig) -> Self {
        Self {
            currency_decimals: config.currency_decimals,
            percent_decimals: config.percent_decimals,
            score_decimals: config.score_decimals,
        }
    }
}

impl RoundingPolicy {
    pub fn decimals(&self, kind: ValueKind) -> Option<u32> {
        match kind {
            ValueKind::Currency => Some(self.currency_decimals),
            ValueKind::Percent => Some(self.percent_decimals),
            ValueKind::Count => Some(0),
            ValueKind::Score => Some(self.score_decimals),
            ValueKind::Raw => None,
        }
    }

    pub fn apply(&self, kind: ValueKind, value: f64) -> f64 {
        match self.decimals(kind) {
            Some(d) => round_to(value, d),
            None => value,
        }
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Measure(String),
    /// Group-key order, e.g. chronological for periods
    Keys,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOptions {
    pub sort: SortKey,
    pub ascending: bool,
    pub top_n: Option<usize>,
}

impl FinalizeOptions {
    /// Largest first
    pub fn by_measure(name: impl Into<String>) -> Self {
        Self {
            sort: SortKey::Measure(name.into()),
            ascending: false,
            top_n: None,
        }
    }

    pub fn by_keys() -> Self {
        Self {
            sort: SortKey::Keys,
            ascending: true,
            top_n: None,
        }
    }

    pub fn ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    pub fn top_n(mut self, n: Option<usize>) -> Self {
        self.top_n = n;
        self
    }
}

fn compare_measure(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let o = x.total_cmp(&y);
            if ascending {
                o
            } else {
                o.reverse()
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order rows without truncating or rounding. Undefined values sort last in either
/// direction and ties fall back to ascending keys.
pub fn sort_rows(table: &mut AggregateTable, sort: &SortKey, ascending: bool) -> Result<()> {
    match sort {
        SortKey::Measure(name) => {
            let idx = table.column_index(name)?;
            table.rows_mut().sort_by(|a: &AggregateRow, b: &AggregateRow| {
                compare_measure(a.values[idx], b.values[idx], ascending).then_with(|| a.keys.cmp(&b.keys))
            });
        }
        SortKey::Keys => {
            table.rows_mut().sort_by(|a, b| {
                let o = a.keys.cmp(&b.keys);
                if ascending {
                    o
                } else {
                    o.reverse()
                }
            });
        }
    }
    Ok(())
}

/// Sort and keep the first `top_n` rows, at full precision.
pub fn select_top(mut table: AggregateTable, options: &FinalizeOptions) -> Result<AggregateTable> {
    sort_rows(&mut table, &options.sort, options.ascending)?;
    if let Some(n) = options.top_n {
        table.rows_mut().truncate(n);
    }
    Ok(table)
}

pub fn round_values(table: &mut AggregateTable, policy: &RoundingPolicy) {
    let kinds: Vec<ValueKind> = table.columns().iter().map(|c| c.kind).collect();
    for row in table.rows_mut() {
        for (value, kind) in row.values.iter_mut().zip(&kinds) {
            *value = value.map(|v| policy.apply(*kind, v));
        }
    }
}

/// [`select_top`], then round every value by its column kind.
///
/// Values are never recomputed here, so shares computed against the full population keep
/// their value after truncation.
pub fn finalize(table: AggregateTable, options: &FinalizeOptions, policy: &RoundingPolicy) -> Result<AggregateTable> {
    let mut table = select_top(table, options)?;
    round_values(&mut table, policy);
    Ok(table)
}

/// Keys as text (integer keys stay numeric), count columns as integers, others as floats.
pub fn to_dataframe(table: &AggregateTable) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(table.keys().len() + table.columns().len());

    for (i, key) in table.keys().iter().enumerate() {
        let name: PlSmallStr = key.column.as_str().into();
        let series = match key.kind {
            KeyKind::Integer | KeyKind::Hour => {
                let values: Vec<Option<i64>> = table
                    .rows()
                    .iter()
                    .map(|r| match &r.keys[i] {
                        KeyValue::Integer(v) => Some(*v),
                        _ => None,
                    })
                    .collect();
                Series::new(name, values)
            }
            _ => {
                let values: Vec<Option<String>> = table
                    .rows()
                    .iter()
                    .map(|r| match &r.keys[i] {
                        KeyValue::Missing => None,
                        other => Some(other.label()),
                    })
                    .collect();
                Series::new(name, values)
            }
        };
        columns.push(series.into());
    }

    for (i, spec) in table.columns().iter().enumerate() {
        let name: PlSmallStr = spec.name.as_str().into();
        let series = if spec.kind == ValueKind::Count {
            let values: Vec<Option<i64>> = table
                .rows()
                .iter()
                .map(|r| r.values[i].map(|v| v.round() as i64))
                .collect();
            Series::new(name, values)
        } else {
            let values: Vec<Option<f64>> = table.rows().iter().map(|r| r.values[i]).collect();
            Series::new(name, values)
        };
        columns.push(series.into());
    }

    Ok(DataFrame::new(columns)?)
}

/// Write a finalized table as CSV with a header row. Undefined values are empty cells.
pub fn export_csv(table: &AggregateTable, path: &Path) -> Result<()> {
    let mut df = to_dataframe(table)?;
    let failed = |source: PolarsError| DashboardError::Export {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(|e| failed(e.into()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)
        .map_err(failed)?;
    info!(path = %path.display(), rows = df.height(), "exported table");
    Ok(())
}

/// A finalized table ready to print or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    #[serde(skip)]
    decimals: Vec<Option<u32>>,
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl TableView {
    pub fn new(name: impl Into<String>, table: &AggregateTable, policy: &RoundingPolicy) -> Self {
        let mut columns: Vec<String> = table.keys().iter().map(|k| k.column.clone()).collect();
        columns.extend(table.columns().iter().map(|c| c.name.clone()));

        let mut decimals: Vec<Option<u32>> = vec![None; table.keys().len()];
        decimals.extend(table.columns().iter().map(|c| policy.decimals(c.kind)));

        let rows = table
            .rows()
            .iter()
            .map(|r| {
                let keys = r.keys.iter().map(|k| match k {
                    KeyValue::Missing => Value::Null,
                    KeyValue::Integer(i) => Value::from(*i),
                    other => Value::String(other.label()),
                });
                let values = r
                    .values
                    .iter()
                    .zip(table.columns())
                    .map(|(v, spec)| match v {
                        None => Value::Null,
                        Some(x) if spec.kind == ValueKind::Count => Value::from(x.round() as i64),
                        Some(x) => number(*x),
                    });
                keys.chain(values).collect()
            })
            .collect();

        Self {
            name: name.into(),
            columns,
            rows,
            decimals,
        }
    }

    fn cell_text(&self, col: usize, value: &Value) -> String {
        match (value, self.decimals.get(col).copied().flatten()) {
            (Value::Null, _) => "-".to_string(),
            (Value::String(s), _) => s.clone(),
            (Value::Number(n), Some(d)) if d > 0 => match n.as_f64() {
                Some(f) => format!("{:.*}", d as usize, f),
                None => n.to_string(),
            },
            (other, _) => other.to_string(),
        }
    }

    /// Column-aligned plain text, text left-aligned and numbers right-aligned.
    pub fn to_text(&self) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().enumerate().map(|(i, v)| self.cell_text(i, v)).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        let numeric: Vec<bool> = (0..self.columns.len())
            .map(|i| self.rows.iter().any(|r| matches!(r.get(i), Some(Value::Number(_)))))
            .collect();

        let pad = |text: &str, i: usize| -> String {
            if numeric[i] {
                format!("{:>width$}", text, width = widths[i])
            } else {
                format!("{:<width$}", text, width = widths[i])
            }
        };

        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().enumerate().map(|(i, c)| pad(c, i)).collect();
        out.push_str(header.join("  ").trim_end());
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&rule.join("  "));
        out.push('\n');
        for row in &cells {
            let line: Vec<String> = row.iter().enumerate().map(|(i, c)| pad(c, i)).collect();
            out.push_str(line.join("  ").trim_end());
            out.push('\n');
        }
        out
    }
}
