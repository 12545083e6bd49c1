//! Loading the logical source tables.
//!
//! [`TableProvider`] is the seam every pipeline stage reads through. [`DataSource`] backs it
//! with CSV files on disk and a shared [`TableCache`]; [`InMemoryTables`] backs it with frames
//! built in code.

use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{SourceStamp, TableCache};
use crate::config::{DataConfig, FilesConfig};
use crate::error::{DashboardError, Result};
use crate::tables::TableName;

pub trait TableProvider {
    /// Load a table. Every call returns an independent frame the caller may mutate freely.
    fn load(&self, table: TableName) -> Result<DataFrame>;

    /// Like [`load`](Self::load), but a table that does not exist anywhere is `None`.
    fn load_optional(&self, table: TableName) -> Result<Option<DataFrame>> {
        match self.load(table) {
            Ok(df) => Ok(Some(df)),
            Err(DashboardError::MissingSource { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<T: TableProvider + ?Sized> TableProvider for &T {
    fn load(&self, table: TableName) -> Result<DataFrame> {
        (**self).load(table)
    }
}

/// CSV-backed tables with primary/fallback directory resolution.
#[derive(Clone)]
pub struct DataSource {
    primary_dir: PathBuf,
    fallback_dir: Option<PathBuf>,
    files: FilesConfig,
    cache: Arc<TableCache>,
}

impl DataSource {
    pub fn new(primary_dir: impl Into<PathBuf>) -> Self {
        Self {
            primary_dir: primary_dir.into(),
            fallback_dir: None,
            files: FilesConfig::default(),
            cache: Arc::new(TableCache::new()),
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        let fallback = if config.fallback_dir.as_os_str().is_empty() {
            None
        } else {
            Some(config.fallback_dir.clone())
        };
        Self {
            primary_dir: config.primary_dir.clone(),
            fallback_dir: fallback,
            files: config.files.clone(),
            cache: Arc::new(TableCache::new()),
        }
    }

    pub fn with_fallback(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    pub fn with_files(mut self, files: FilesConfig) -> Self {
        self.files = files;
        self
    }

    /// Share an existing cache, e.g. between several sources pointing at the same files.
    pub fn with_cache(mut self, cache: Arc<TableCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    fn candidates(&self, table: TableName) -> Vec<PathBuf> {
        let file = self.files.file_name(table);
        let mut paths = vec![self.primary_dir.join(file)];
        if let Some(fallback) = &self.fallback_dir {
            paths.push(fallback.join(file));
        }
        paths
    }

    /// Locate the file for `table`: the primary directory wins, the fallback is tried next.
    pub fn resolve(&self, table: TableName) -> Result<PathBuf> {
        let candidates = self.candidates(table);
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(DashboardError::MissingSource {
                table,
                searched: candidates,
            }),
        }
    }
}

impl TableProvider for DataSource {
    fn load(&self, table: TableName) -> Result<DataFrame> {
        let path = self.resolve(table)?;
        let unreadable = |source: PolarsError| DashboardError::UnreadableSource {
            table,
            path: path.clone(),
            source,
        };
        let stamp = SourceStamp::of(&path).map_err(|e| unreadable(e.into()))?;
        self.cache.get_or_load(table.id(), stamp, |p| {
            let df = read_csv(p).map_err(|e| match e {
                DashboardError::Polars(source) => unreadable(source),
                other => other,
            })?;
            info!(table = table.id(), rows = df.height(), path = %p.display(), "loaded table");
            Ok(df)
        })
    }
}

/// Read a CSV file with every column as text. Typing is left to the cleaning stage.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let pl_path = PlPath::Local(Arc::from(path));
    let df = LazyCsvReader::new(pl_path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;
    Ok(df)
}

/// Tables held in memory, for tests and for embedding the pipeline without files.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTables {
    tables: HashMap<TableName, DataFrame>,
}

impl InMemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, table: TableName, df: DataFrame) -> Self {
        self.insert(table, df);
        self
    }

    pub fn insert(&mut self, table: TableName, df: DataFrame) {
        self.tables.insert(table, df);
    }
}

impl TableProvider for InMemoryTables {
    fn load(&self, table: TableName) -> Result<DataFrame> {
        debug!(table = table.id(), "in-memory table");
        self.tables
            .get(&table)
            .cloned()
            .ok_or(DashboardError::MissingSource {
                table,
                searched: Vec::new(),
            })
    }
}

/// Fail with `MissingColumn` unless every name in `required` is a column of `df`.
pub fn ensure_columns(df: &DataFrame, table: &str, required: &[&str]) -> Result<()> {
    let names = df.get_column_names();
    for column in required {
        if !names.iter().any(|n| n.as_str() == *column) {
            return Err(DashboardError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_every_column_is_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "s.csv", "seller_id,seller_zip_code_prefix\ns1,01001\n");
        let df = read_csv(&dir.path().join("s.csv")).unwrap();
        let zip = df.column("seller_zip_code_prefix").unwrap();
        assert_eq!(zip.dtype(), &DataType::String);
        assert_eq!(zip.str().unwrap().get(0), Some("01001"));
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let file = TableName::Sellers.default_file_name();
        write(primary.path(), file, "seller_id\np\n");
        write(fallback.path(), file, "seller_id\nf\n");

        let source = DataSource::new(primary.path()).with_fallback(fallback.path());
        assert_eq!(
            source.resolve(TableName::Sellers).unwrap(),
            primary.path().join(file)
        );
    }

    #[test]
    fn test_fallback_used_when_primary_missing() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let file = TableName::Sellers.default_file_name();
        write(fallback.path(), file, "seller_id\nf\n");

        let source = DataSource::new(primary.path()).with_fallback(fallback.path());
        let df = source.load(TableName::Sellers).unwrap();
        assert_eq!(df.column("seller_id").unwrap().str().unwrap().get(0), Some("f"));
    }

    #[test]
    fn test_missing_everywhere_reports_both_locations() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let source = DataSource::new(primary.path()).with_fallback(fallback.path());

        match source.load(TableName::Orders) {
            Err(DashboardError::MissingSource { table, searched }) => {
                assert_eq!(table, TableName::Orders);
                assert_eq!(searched.len(), 2);
            }
            other => panic!("expected MissingSource, got {:?}", other.map(|df| df.height())),
        }
        assert!(source
            .load_optional(TableName::CategoryTranslation)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unparseable_file_reports_table_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = TableName::Sellers.default_file_name();
        write(dir.path(), file, "seller_id,seller_state\ns1,SP\ns2,RJ,extra\n");
        let source = DataSource::new(dir.path());

        match source.load_optional(TableName::Sellers) {
            Err(DashboardError::UnreadableSource { table, path, .. }) => {
                assert_eq!(table, TableName::Sellers);
                assert_eq!(path, dir.path().join(file));
            }
            other => panic!("expected UnreadableSource, got {:?}", other.map(|df| df.map(|d| d.height()))),
        }
        assert!(source.cache().is_empty());
    }

    #[test]
    fn test_in_memory_tables_return_independent_frames() {
        let tables = InMemoryTables::new().with(
            TableName::Products,
            df!("product_id" => &["p1"]).unwrap(),
        );
        let mut first = tables.load(TableName::Products).unwrap();
        first
            .with_column(Series::new("x".into(), &[1_i64]))
            .unwrap();
        let second = tables.load(TableName::Products).unwrap();
        assert_eq!(second.width(), 1);
    }

    #[test]
    fn test_ensure_columns() {
        let df = df!("a" => &[1_i64], "b" => &[2_i64]).unwrap();
        assert!(ensure_columns(&df, "t", &["a", "b"]).is_ok());
        assert!(matches!(
            ensure_columns(&df, "t", &["a", "c"]),
            Err(DashboardError::MissingColumn { column, .. }) if column == "c"
        ));
    }
}
