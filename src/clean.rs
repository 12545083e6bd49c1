//! Typing of text columns and the category fallback chain.
//!
//! Malformed values become nulls. Nulls are what every later stage treats as "missing":
//! polars sums and means skip them, which is exactly the exclusion rule for prices.

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::Result;

/// Label used when a product has no category under any name.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// What happens to a value that is missing or failed coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Keep it missing: sums skip it and means leave it out of the denominator.
    Exclude,
    /// Treat it as zero.
    ZeroFill,
}

/// Float64 view of `name`; unparseable text and NaN become null.
pub fn numeric_expr(name: &str, policy: MissingPolicy) -> Expr {
    let parsed = col(name).cast(DataType::Float64);
    let cleaned = when(parsed.clone().is_nan())
        .then(lit(NULL).cast(DataType::Float64))
        .otherwise(parsed);
    match policy {
        MissingPolicy::Exclude => cleaned,
        MissingPolicy::ZeroFill => cleaned.fill_null(lit(0.0)),
    }
}

pub fn coerce_numeric(df: DataFrame, columns: &[&str], policy: MissingPolicy) -> Result<DataFrame> {
    if columns.is_empty() {
        return Ok(df);
    }
    let exprs: Vec<Expr> = columns
        .iter()
        .map(|c| numeric_expr(c, policy).alias(*c))
        .collect();
    let out = df.lazy().with_columns(exprs).collect()?;
    for c in columns {
        debug!(column = c, nulls = out.column(c)?.null_count(), "coerced numeric");
    }
    Ok(out)
}

fn parse_timestamp_expr(name: &str, format: &str) -> Expr {
    col(name).str().to_datetime(
        Some(TimeUnit::Microseconds),
        None,
        StrptimeOptions {
            format: Some(format.into()),
            strict: false,
            ..Default::default()
        },
        lit("raise"),
    )
}

/// Parse text timestamps with `format` into microsecond datetimes; failures become null.
///
/// Columns that are already temporal are only normalized to microseconds.
pub fn coerce_timestamp(df: DataFrame, columns: &[&str], format: &str) -> Result<DataFrame> {
    let target = DataType::Datetime(TimeUnit::Microseconds, None);
    let mut exprs = Vec::with_capacity(columns.len());
    for c in columns {
        let expr = match df.column(c)?.dtype() {
            DataType::String => parse_timestamp_expr(c, format),
            DataType::Null => lit(NULL).cast(target.clone()),
            _ => col(*c).cast(target.clone()),
        };
        exprs.push(expr.alias(*c));
    }
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Drop rows where any of `columns` is missing.
pub fn drop_missing(df: DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let Some(predicate) = columns
        .iter()
        .map(|c| col(*c).is_not_null())
        .reduce(|a, b| a.and(b))
    else {
        return Ok(df);
    };
    let before = df.height();
    let out = df.lazy().filter(predicate).collect()?;
    let dropped = before - out.height();
    if dropped > 0 {
        warn!(dropped, columns = ?columns, "dropped rows with missing values");
    }
    Ok(out)
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Translated name, else the raw name, else [`UNKNOWN_CATEGORY`]. Blank strings count as missing.
pub fn resolve_category(raw: Option<&str>, translated: Option<&str>) -> String {
    present(translated)
        .or(present(raw))
        .unwrap_or(UNKNOWN_CATEGORY)
        .to_string()
}

fn blank_as_null(name: &str) -> Expr {
    when(col(name).str().strip_chars(lit(NULL)).eq(lit("")))
        .then(lit(NULL).cast(DataType::String))
        .otherwise(col(name))
}

/// Frame-level [`resolve_category`]. `translated` is `None` when no translation table exists.
pub fn category_expr(raw: &str, translated: Option<&str>) -> Expr {
    let mut chain = Vec::with_capacity(3);
    if let Some(t) = translated {
        chain.push(blank_as_null(t));
    }
    chain.push(blank_as_null(raw));
    chain.push(lit(UNKNOWN_CATEGORY));
    coalesce(&chain)
}
