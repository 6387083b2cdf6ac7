use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::Storage;

mod catalog_repo;
mod certificate_repo;
mod enrollment_repo;
mod mapping;
mod migrate;
mod progress_repo;
mod quiz_result_repo;
mod rating_repo;

/// Connections shared by request handlers. Progress saves are small writes,
/// so a handful is enough for one server process.
const POOL_SIZE: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a writer waits on a locked database before failing the save.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Every LMS repository trait over one `SQLite` pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error("cannot open LMS database at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("LMS schema migration failed: {0}")]
    Migrate(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the LMS database at `database_url`.
    ///
    /// Each connection enforces foreign keys, so deleting a course removes
    /// its lessons, enrollments and ratings. WAL lets progress reads run
    /// while a save is being written.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Connect` if the pool cannot be opened or a
    /// connection pragma is rejected.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    for pragma in [
                        "PRAGMA foreign_keys = ON;".to_owned(),
                        "PRAGMA journal_mode = WAL;".to_owned(),
                        format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"),
                    ] {
                        sqlx::query(&pragma).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(database_url)
            .await
            .map_err(|source| SqliteInitError::Connect {
                url: database_url.to_owned(),
                source,
            })?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the catalog, progress, quiz, certificate and rating tables up to
    /// the current schema version.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Migrate` if a schema statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Open and migrate an LMS database.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` from either step.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self::from_backend(repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[tokio::test]
    async fn unreachable_database_names_the_url() {
        let url = "sqlite:/nonexistent-dir/lms.db?mode=ro";
        let err = SqliteRepository::connect(url)
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, SqliteInitError::Connect { .. }));
        assert!(err.to_string().contains(url));
    }
}
