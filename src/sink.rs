//! Output sinks for the model-ready table.
//!
//! Both sinks are idempotent: a destination that already holds data is left
//! alone and reported as [`SinkOutcome::AlreadyPopulated`].
//!
//! The table sink asks a [`TableStore`] how many rows the versioned table
//! holds. It replaces the table when it is empty or missing, or when the
//! companion CSV file is empty or absent, and then writes the companion CSV
//! through the file sink. The CSV goes last, so a run that dies after the
//! table load is repeated in full.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::fmt;
use std::path::{Path, PathBuf};

const COPY_CHUNK_ROWS: usize = 10_000;

/// Result of a sink write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Written { rows: usize },
    AlreadyPopulated,
}

/// Versioned relational table: `<schema>.<base>_v<version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub schema: Option<String>,
    pub base: String,
    pub version: u32,
}

impl TableTarget {
    pub fn new(base: impl Into<String>, version: u32) -> Self {
        Self {
            schema: None,
            base: base.into(),
            version,
        }
    }

    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn table_name(&self) -> String {
        format!("{}_v{}", self.base, self.version)
    }

    /// Quoted identifier, safe to splice into SQL
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(s) if !s.is_empty() => format!("{}.{}", quote(s), quote(&self.table_name())),
            _ => quote(&self.table_name()),
        }
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(s) if !s.is_empty() => write!(f, "{s}.{}", self.table_name()),
            _ => f.write_str(&self.table_name()),
        }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Where the model-ready table goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// CSV file with header
    File(PathBuf),
    /// Relational table, kept in step with a companion CSV file
    Table {
        target: TableTarget,
        companion_csv: PathBuf,
    },
}

/// Storage backend for the table sink
#[expect(async_fn_in_trait)]
pub trait TableStore {
    /// Rows currently in the table; a missing table counts as empty.
    async fn row_count(&self, target: &TableTarget) -> Result<u64>;

    /// Drop and recreate the table with the contents of `df`.
    async fn replace(&self, target: &TableTarget, df: &DataFrame) -> Result<()>;
}

/// Picks the sink for a [`Destination`] and enforces write-once semantics.
pub struct SinkSelector<S> {
    store: Option<S>,
}

impl<S: TableStore> SinkSelector<S> {
    pub fn new(store: Option<S>) -> Self {
        Self { store }
    }

    pub async fn write(&self, df: &mut DataFrame, destination: &Destination) -> Result<SinkOutcome> {
        let outcome = match destination {
            Destination::File(path) => write_csv_once(df, path)?,
            Destination::Table {
                target,
                companion_csv,
            } => {
                let store = self.store.as_ref().ok_or_else(|| {
                    PipelineError::config(format!("no database configured for table {target}"))
                })?;
                write_table_once(store, df, target, companion_csv).await?
            }
        };

        match outcome {
            SinkOutcome::Written { rows } => {
                tracing::info!(?destination, rows, "Wrote output");
            }
            SinkOutcome::AlreadyPopulated => {
                tracing::info!(?destination, "Destination already populated, skipping");
            }
        }
        Ok(outcome)
    }
}

/// True when the file is absent or zero-length.
pub fn is_file_empty(path: &Path) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// Write `df` as CSV unless the file already holds data.
///
/// Data goes to a `.partial` sibling first and is renamed into place.
pub fn write_csv_once(df: &mut DataFrame, path: &Path) -> Result<SinkOutcome> {
    if !is_file_empty(path)? {
        return Ok(SinkOutcome::AlreadyPopulated);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let partial = partial_path(path);
    let file = std::fs::File::create(&partial)?;
    CsvWriter::new(file).include_header(true).finish(df)?;
    std::fs::rename(&partial, path)?;

    Ok(SinkOutcome::Written { rows: df.height() })
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

/// Replace the table when it is empty or the companion CSV is, then fill
/// the companion CSV if it has no data yet.
pub async fn write_table_once<S: TableStore>(
    store: &S,
    df: &mut DataFrame,
    target: &TableTarget,
    companion_csv: &Path,
) -> Result<SinkOutcome> {
    let rows = store.row_count(target).await?;
    let csv_empty = is_file_empty(companion_csv)?;
    tracing::debug!(table = %target, rows, csv_empty, "Checked table sink");

    if rows > 0 && !csv_empty {
        return Ok(SinkOutcome::AlreadyPopulated);
    }

    store.replace(target, df).await?;
    if let SinkOutcome::Written { rows } = write_csv_once(df, companion_csv)? {
        tracing::debug!(path = %companion_csv.display(), rows, "Wrote companion CSV");
    }
    Ok(SinkOutcome::Written { rows: df.height() })
}

/// Postgres-backed [`TableStore`]
pub struct PgTableStore {
    pool: Pool<Postgres>,
}

impl PgTableStore {
    pub async fn connect(options: PgConnectOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }
}

impl TableStore for PgTableStore {
    async fn row_count(&self, target: &TableTarget) -> Result<u64> {
        let exists: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
            .bind(target.quoted())
            .fetch_one(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(0);
        }

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", target.quoted()))
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn replace(&self, target: &TableTarget, df: &DataFrame) -> Result<()> {
        let table = target.quoted();
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_table_sql(&table, df))
            .execute(&mut *tx)
            .await?;

        let mut writer = tx
            .copy_in_raw(&format!(
                "COPY {table} FROM STDIN WITH (FORMAT csv, NULL '')"
            ))
            .await?;

        let height = df.height();
        for offset in (0..height).step_by(COPY_CHUNK_ROWS) {
            let len = COPY_CHUNK_ROWS.min(height - offset);
            let mut chunk = df.slice(offset as i64, len);

            let mut buf = Vec::new();
            CsvWriter::new(&mut buf)
                .include_header(false)
                .with_separator(b',')
                .with_null_value(String::new())
                .finish(&mut chunk)?;
            writer.send(buf).await?;
        }
        writer.finish().await?;

        tx.commit().await?;
        tracing::info!(table = %target, rows = height, "Replaced table");
        Ok(())
    }
}

fn create_table_sql(table: &str, df: &DataFrame) -> String {
    let columns: Vec<String> = df
        .schema()
        .iter()
        .map(|(name, dtype)| format!("{} {}", quote(name), sql_type(dtype)))
        .collect();
    format!("CREATE TABLE {table} ({})", columns.join(", "))
}

fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "BIGINT",
        DataType::Float32 | DataType::Float64 => "DOUBLE PRECISION",
        DataType::Boolean => "BOOLEAN",
        DataType::Date => "DATE",
        DataType::Datetime(_, _) => "TIMESTAMP",
        _ => "TEXT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store that records replacements
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<u64>,
        replaced: Mutex<usize>,
    }

    impl TableStore for MemoryStore {
        async fn row_count(&self, _target: &TableTarget) -> Result<u64> {
            Ok(*self.rows.lock().expect("lock"))
        }

        async fn replace(&self, _target: &TableTarget, df: &DataFrame) -> Result<()> {
            *self.rows.lock().expect("lock") = df.height() as u64;
            *self.replaced.lock().expect("lock") += 1;
            Ok(())
        }
    }

    fn table() -> DataFrame {
        df!("lead_time" => [1i64, 2, 3], "hotel" => ["A", "B", "C"]).expect("valid frame")
    }

    #[test]
    fn test_target_naming() {
        let target = TableTarget::new("hotel_bookings", 2).in_schema("public");
        assert_eq!(target.table_name(), "hotel_bookings_v2");
        assert_eq!(target.quoted(), "\"public\".\"hotel_bookings_v2\"");
        assert_eq!(target.to_string(), "public.hotel_bookings_v2");

        let odd = TableTarget::new("we\"ird", 1);
        assert_eq!(odd.quoted(), "\"we\"\"ird_v1\"");
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("\"t\"", &table());
        assert_eq!(sql, "CREATE TABLE \"t\" (\"lead_time\" BIGINT, \"hotel\" TEXT)");
    }

    #[tokio::test]
    async fn test_file_sink_writes_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("out.csv");
        let selector = SinkSelector::<MemoryStore>::new(None);
        let destination = Destination::File(path.clone());

        let first = selector.write(&mut table(), &destination).await?;
        assert_eq!(first, SinkOutcome::Written { rows: 3 });
        let written = std::fs::read_to_string(&path)?;
        assert!(written.starts_with("lead_time,hotel\n"));

        let mut changed = df!("lead_time" => [9i64], "hotel" => ["Z"])?;
        let second = selector.write(&mut changed, &destination).await?;
        assert_eq!(second, SinkOutcome::AlreadyPopulated);
        assert_eq!(std::fs::read_to_string(&path)?, written);
        assert!(!partial_path(&path).exists());
        Ok(())
    }

    #[test]
    fn test_zero_length_file_is_rewritten() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "")?;

        let outcome = write_csv_once(&mut table(), &path)?;
        assert_eq!(outcome, SinkOutcome::Written { rows: 3 });
        Ok(())
    }

    #[tokio::test]
    async fn test_table_sink_writes_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let csv = dir.path().join("out.csv");
        std::fs::write(&csv, "lead_time,hotel\n1,A\n")?;

        let selector = SinkSelector::new(Some(MemoryStore::default()));
        let destination = Destination::Table {
            target: TableTarget::new("hotel_bookings", 1),
            companion_csv: csv,
        };

        assert_eq!(
            selector.write(&mut table(), &destination).await?,
            SinkOutcome::Written { rows: 3 }
        );
        assert_eq!(
            selector.write(&mut table(), &destination).await?,
            SinkOutcome::AlreadyPopulated
        );

        let store = selector.store.as_ref().expect("store");
        assert_eq!(*store.replaced.lock().expect("lock"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_companion_csv_forces_replace() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = MemoryStore {
            rows: Mutex::new(100),
            replaced: Mutex::new(0),
        };
        let target = TableTarget::new("hotel_bookings", 1);

        let csv = dir.path().join("missing.csv");

        let outcome = write_table_once(&store, &mut table(), &target, &csv).await?;
        assert_eq!(outcome, SinkOutcome::Written { rows: 3 });
        assert_eq!(*store.rows.lock().expect("lock"), 3);
        assert!(std::fs::read_to_string(&csv)?.starts_with("lead_time,hotel\n"));
        Ok(())
    }

    #[tokio::test]
    async fn test_table_sink_fills_absent_companion_csv() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let csv = dir.path().join("processed").join("out.csv");

        let selector = SinkSelector::new(Some(MemoryStore::default()));
        let destination = Destination::Table {
            target: TableTarget::new("hotel_bookings", 1),
            companion_csv: csv.clone(),
        };

        assert_eq!(
            selector.write(&mut table(), &destination).await?,
            SinkOutcome::Written { rows: 3 }
        );
        let written = std::fs::read_to_string(&csv)?;
        assert_eq!(written.lines().count(), 4);

        assert_eq!(
            selector.write(&mut table(), &destination).await?,
            SinkOutcome::AlreadyPopulated
        );
        assert_eq!(std::fs::read_to_string(&csv)?, written);

        let store = selector.store.as_ref().expect("store");
        assert_eq!(*store.replaced.lock().expect("lock"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_table_destination_without_store_fails() {
        let selector = SinkSelector::<MemoryStore>::new(None);
        let destination = Destination::Table {
            target: TableTarget::new("hotel_bookings", 1),
            companion_csv: PathBuf::from("out.csv"),
        };

        let err = selector.write(&mut table(), &destination).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
