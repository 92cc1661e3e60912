pub mod pool;
pub mod repository;
pub mod schema;

pub use pool::{PoolOptions, Session, SessionPool};

use crate::error::{Error, Result};

/// Database wraps a writer `tokio_rusqlite::Connection` (migrations, config
/// writes, ingestion) and a `SessionPool` of read connections for analytics
/// requests. WAL mode lets the readers proceed while the writer works.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    pool: SessionPool,
}

impl Database {
    /// Open the database at the default path (`~/.lipdash/lipdash.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".lipdash");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("lipdash.db")).await
    }

    /// Open the database at the given path with the default pool options.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::open_with(path, PoolOptions::default()).await
    }

    /// Open the database at the given path.
    pub async fn open_with(
        path: impl AsRef<std::path::Path>,
        options: PoolOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let mut readers = Vec::with_capacity(options.size);
        for _ in 0..options.size.max(1) {
            let reader = tokio_rusqlite::Connection::open(&path).await?;
            Self::init_reader(&reader).await?;
            readers.push(reader);
        }
        log::info!(
            "Opened {} with {} read sessions",
            path.display(),
            readers.len()
        );

        Ok(Self {
            writer,
            pool: SessionPool::new(readers, options),
        })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        Self::open_memory_with(PoolOptions::default()).await
    }

    /// In-memory DBs are per-connection, so every pool slot shares the
    /// writer connection.
    pub async fn open_memory_with(options: PoolOptions) -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;
        let readers = vec![writer.clone(); options.size.max(1)];
        Ok(Self {
            pool: SessionPool::new(readers, options),
            writer,
        })
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            schema::migrations()
                .to_latest(conn)
                .map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;\
                 PRAGMA query_only=ON;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reference to the read session pool.
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }
}
