use crate::config::AppConfig;
use crate::errors::ServiceError;
use lazy_static::lazy_static;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbBackend,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::ops::Deref;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for the connection pool
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    /// An in-memory SQLite database lives inside a single connection, so the
    /// pool must never open a second one.
    fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite") && self.url.contains(":memory:")
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(?config, "Configuring database connection");

    let (max_connections, min_connections) = if config.is_in_memory() {
        (1, 1)
    } else {
        (config.max_connections, config.min_connections)
    };

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(max_connections, "Connecting to database");

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "Database connection establishment failed");
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(?elapsed, "Database migrations completed"),
        Err(e) => error!(?elapsed, error = %e, "Database migrations failed"),
    }

    result
}

pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    pool.ping().await.map_err(ServiceError::DatabaseError)
}

lazy_static! {
    /// SQLite allows a single writer per file. Read-then-write transactions
    /// queue here instead of failing with `SQLITE_BUSY` when they upgrade.
    static ref SQLITE_WRITER: Mutex<()> = Mutex::new(());
}

/// A transaction that will write. On SQLite it holds the process-wide
/// writer slot until it is committed, rolled back or dropped.
pub struct WriteTransaction {
    txn: DatabaseTransaction,
    _writer: Option<MutexGuard<'static, ()>>,
}

impl WriteTransaction {
    pub async fn commit(self) -> Result<(), ServiceError> {
        let WriteTransaction { txn, _writer } = self;
        txn.commit().await.map_err(ServiceError::db_error)
    }

    pub async fn rollback(self) -> Result<(), ServiceError> {
        let WriteTransaction { txn, _writer } = self;
        txn.rollback().await.map_err(ServiceError::db_error)
    }
}

impl Deref for WriteTransaction {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

/// Begins a transaction that reads, checks and then writes.
pub async fn begin_write(pool: &DbPool) -> Result<WriteTransaction, ServiceError> {
    let writer = match pool.get_database_backend() {
        DbBackend::Sqlite => Some(SQLITE_WRITER.lock().await),
        _ => None,
    };
    let txn = pool.begin().await.map_err(ServiceError::db_error)?;
    Ok(WriteTransaction {
        txn,
        _writer: writer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_migrates_and_pings() {
        let pool = establish_connection("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        check_connection(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn write_transactions_on_sqlite_take_turns() {
        let pool = establish_connection("sqlite::memory:").await.unwrap();
        let first = begin_write(&pool).await.unwrap();
        assert!(SQLITE_WRITER.try_lock().is_err());
        first.commit().await.unwrap();

        let second = begin_write(&pool).await.unwrap();
        second.rollback().await.unwrap();
    }

    #[test]
    fn detects_in_memory_urls() {
        let cfg = DbConfig {
            url: "sqlite::memory:".into(),
            ..Default::default()
        };
        assert!(cfg.is_in_memory());
        let cfg = DbConfig {
            url: "postgres://localhost/medsurplus".into(),
            ..Default::default()
        };
        assert!(!cfg.is_in_memory());
    }
}
