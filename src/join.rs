//! Key-based left joins between source tables.

use polars::prelude::*;
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::source::ensure_columns;

/// Keep only `columns` of `df`, failing with `MissingColumn` if one is absent.
pub fn project(df: &DataFrame, table: &str, columns: &[&str]) -> Result<DataFrame> {
    ensure_columns(df, table, columns)?;
    Ok(df.select(columns.iter().copied())?)
}

/// Left join `other` onto `base` by equality of `key`.
///
/// Every row of `base` survives exactly once: `key` must be unique among the non-missing
/// keys of `other` (`DuplicateJoinKey` otherwise), and unmatched rows get nulls in the
/// columns brought in from `other`. A non-key column present on both sides is a
/// `ColumnConflict`; project `other` first to avoid one.
pub fn left_join(base: DataFrame, other: &DataFrame, key: &str, other_name: &str) -> Result<DataFrame> {
    ensure_columns(&base, "base", &[key])?;
    ensure_columns(other, other_name, &[key])?;

    let base_names = base.get_column_names_owned();
    for name in other.get_column_names() {
        if name.as_str() != key && base_names.iter().any(|b| b == name) {
            return Err(DashboardError::ColumnConflict {
                column: name.to_string(),
            });
        }
    }

    let keys = other.column(key)?.as_materialized_series().drop_nulls();
    if keys.n_unique()? != keys.len() {
        return Err(DashboardError::DuplicateJoinKey {
            key: key.to_string(),
            table: other_name.to_string(),
        });
    }

    let rows = base.height();
    let joined = base
        .lazy()
        .left_join(other.clone().lazy(), col(key), col(key))
        .collect()?;
    debug!(key, other = other_name, rows, joined = joined.height(), "left join");
    Ok(joined)
}
