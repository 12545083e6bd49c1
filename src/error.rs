//! Error type shared by every pipeline stage, plus user-facing message formatting.

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::tables::TableName;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("missing source table '{table}' (searched: {})", display_paths(.searched))]
    MissingSource {
        table: TableName,
        searched: Vec<PathBuf>,
    },

    #[error("table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid value for {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("join key '{key}' is not unique in '{table}'")]
    DuplicateJoinKey { key: String, table: String },

    #[error("column '{column}' exists on both sides of a join")]
    ColumnConflict { column: String },

    #[error("could not read source table '{table}' at {}", .path.display())]
    UnreadableSource {
        table: TableName,
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("could not export to {}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DashboardError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by user-supplied parameters rather than by the sources.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidDateRange { .. } | Self::InvalidParameter { .. }
        )
    }

    /// Message suitable for showing to a dashboard user.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingSource { table, searched } => format!(
                "Data source '{}' was not found. Looked in: {}. Check [data] primary_dir and fallback_dir.",
                table,
                display_paths(searched)
            ),
            Self::MissingColumn { table, column } => format!(
                "Column '{}' is missing from '{}'. Check that the file has the expected header.",
                column, table
            ),
            Self::InvalidDateRange { start, end } => format!(
                "Invalid date range: the end date {} is before the start date {}. Pick an end date on or after the start.",
                end, start
            ),
            Self::InvalidParameter { name, reason } => format!("Invalid {}: {}", name, reason),
            Self::DuplicateJoinKey { key, table } => format!(
                "'{}' must identify rows uniquely in '{}', but duplicates were found.",
                key, table
            ),
            Self::ColumnConflict { column } => {
                format!("Column '{}' would be duplicated by a join.", column)
            }
            Self::UnreadableSource { table, path, source } => format!(
                "Data source '{}' at {} could not be read ({}). Check that it is a comma-separated file with a header row.",
                table,
                path.display(),
                cause(source)
            ),
            Self::Export { path, source } => format!(
                "Could not export to {} ({}). Check that the directory exists and is writable.",
                path.display(),
                cause(source)
            ),
            Self::Polars(err) => format!("Could not compute the page: {}", err),
            Self::Io(err) => format!("I/O error: {}", err),
        }
    }
}

/// Short reason for a failed read or write; permission problems are called out by name.
fn cause(err: &PolarsError) -> String {
    match err {
        PolarsError::IO { error, .. } if error.kind() == io::ErrorKind::PermissionDenied => {
            "permission denied".to_string()
        }
        PolarsError::IO { error, .. } => error.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_missing_source_message_lists_locations() {
        let err = DashboardError::MissingSource {
            table: TableName::Orders,
            searched: vec![
                Path::new("data/a.csv").to_path_buf(),
                Path::new("/mnt/data/a.csv").to_path_buf(),
            ],
        };
        let msg = err.user_message();
        assert!(msg.contains("orders"));
        assert!(msg.contains("data/a.csv"));
        assert!(msg.contains("/mnt/data/a.csv"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_invalid_range_is_input_error() {
        let err = DashboardError::InvalidDateRange {
            start: NaiveDate::from_ymd_opt(2018, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2018, 2, 1).unwrap(),
        };
        assert!(err.is_input_error());
        assert!(err.user_message().contains("2018-02-01"));
    }

    #[test]
    fn test_unreadable_source_names_table_and_path() {
        let err = DashboardError::UnreadableSource {
            table: TableName::OrderItems,
            path: Path::new("data/items.csv").to_path_buf(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied").into(),
        };
        let msg = err.user_message();
        assert!(msg.contains("order_items"));
        assert!(msg.contains("data/items.csv"));
        assert!(msg.contains("permission denied"));
        assert!(!err.is_input_error());
    }
}
