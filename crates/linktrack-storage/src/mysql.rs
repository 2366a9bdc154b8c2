use crate::sql::{impl_sql_repository, map_migrate_error, map_sqlx_error};
use linktrack_core::repository::Result;
use linktrack_core::StorageError;
use sqlx::migrate::Migrator;
use sqlx::mysql::{MySqlPool, MySqlQueryResult};
use tracing::{debug, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations/mysql");

/// MySQL implementation of the link and click repositories.
///
/// Codes are stored with a binary collation so that `abc` and `ABC` are two
/// different links, matching the other backends.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool and
    /// applying pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        info!("connected to mysql");
        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    /// Applies pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.map_err(map_migrate_error)?;
        debug!(backend = "mysql", "schema migrations applied");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn last_insert_id(result: &MySqlQueryResult) -> Result<i64> {
    i64::try_from(result.last_insert_id()).map_err(|_| {
        StorageError::InvalidData(format!(
            "insert id {} does not fit in i64",
            result.last_insert_id()
        ))
    })
}

impl_sql_repository!(MySqlRepository, last_insert_id);
