use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::registry::TableSchema;
use crate::sql::{map_row, BuiltQuery, MappingError, Record};
use deadpool_sqlite::{Config as PoolConfig, Pool, Runtime};
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Pooled access to the SQLite store.
///
/// Every call checks a connection out for the duration of one closure and
/// returns it to the pool when the closure finishes, whether it succeeded or not.
pub struct Store {
    pool: Pool,
    path: PathBuf,
}

impl Store {
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = create_pool(
            &config.database_path,
            config.max_connections,
            config.pool_wait_timeout,
        )?;

        let store = Self {
            pool,
            path: config.database_path.clone(),
        };

        // Simple ping query
        store.ping().await.map_err(|e| ApiError::PoolUnavailable {
            cause: format!("Ping failed for {}: {}", store.path.display(), e),
        })?;

        info!("Connected to SQLite database at {}", store.path.display());

        Ok(store)
    }

    /// Open a store over an existing file with default pool settings
    pub fn open(path: impl AsRef<Path>, max_connections: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let pool = create_pool(&path, max_connections, Duration::from_secs(5))?;
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run `f` on a pooled connection
    pub async fn interact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.pool.get().await?;
        conn.interact(f).await?
    }

    pub async fn ping(&self) -> Result<()> {
        self.interact(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    /// Execute a built query and map every row onto `schema`
    pub async fn fetch_all(&self, query: BuiltQuery, schema: &TableSchema) -> Result<Vec<Record>> {
        let schema = schema.clone();
        self.interact(move |conn| run_query(conn, &query, &schema))
            .await
    }

    /// First mapped row, if any
    pub async fn fetch_optional(
        &self,
        query: BuiltQuery,
        schema: &TableSchema,
    ) -> Result<Option<Record>> {
        Ok(self.fetch_all(query, schema).await?.into_iter().next())
    }

    /// Several queries on one connection checkout
    pub async fn fetch_batch(
        &self,
        queries: Vec<(BuiltQuery, TableSchema)>,
    ) -> Result<Vec<Vec<Record>>> {
        self.interact(move |conn| {
            queries
                .iter()
                .map(|(query, schema)| run_query(conn, query, schema))
                .collect()
        })
        .await
    }

    /// Run a `SELECT COUNT(*) ...` query
    pub async fn count(&self, query: BuiltQuery) -> Result<u64> {
        self.interact(move |conn| run_count(conn, &query)).await
    }

    /// One page of rows plus the unpaginated total, read on the same connection
    pub async fn fetch_page(
        &self,
        query: BuiltQuery,
        count: BuiltQuery,
        schema: &TableSchema,
    ) -> Result<(Vec<Record>, u64)> {
        let schema = schema.clone();
        self.interact(move |conn| {
            let records = run_query(conn, &query, &schema)?;
            let total = run_count(conn, &count)?;
            Ok((records, total))
        })
        .await
    }
}

/// Execute `query` on an already checked-out connection
pub fn run_query(conn: &Connection, query: &BuiltQuery, schema: &TableSchema) -> Result<Vec<Record>> {
    debug!("Executing query: {} ({} params)", query.sql, query.params.len());

    let mut stmt = conn.prepare_cached(&query.sql)?;
    let rows = stmt.query_map(params_from_iter(query.params.iter()), |row| {
        Ok(map_row(row, schema))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let record: std::result::Result<Record, MappingError> = row?;
        records.push(record?);
    }
    Ok(records)
}

fn run_count(conn: &Connection, query: &BuiltQuery) -> Result<u64> {
    let total: i64 = conn.query_row(&query.sql, params_from_iter(query.params.iter()), |row| {
        row.get(0)
    })?;
    Ok(u64::try_from(total).unwrap_or(0))
}

fn create_pool(path: &Path, max_size: usize, wait: Duration) -> Result<Pool> {
    let mut cfg = PoolConfig::new(path);

    cfg.pool = Some(deadpool_sqlite::PoolConfig {
        max_size,
        timeouts: deadpool_sqlite::Timeouts {
            wait: Some(wait),
            create: Some(Duration::from_secs(5)),
            recycle: Some(Duration::from_secs(5)),
        },
        ..Default::default()
    });

    cfg.create_pool(Runtime::Tokio1)
        .map_err(|e| ApiError::Internal(format!("Failed to create pool: {}", e)))
}
