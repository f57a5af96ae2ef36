//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and connection
//! configuration for SQLite databases.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::debug;

use crate::config::DbConfig;
use crate::error::{Error, Result};

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const COMPONENT: &str = "relational store";

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        configure_sqlite_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Create a connection pool and verify the store answers a query.
///
/// Connectivity problems surface here rather than on first use.
///
/// # Errors
/// Returns [`Error::Construction`] if no connection can be established
/// within `connect_timeout_ms` or the probe query fails.
pub fn create_pool(config: &DbConfig) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(config.path.as_str());
    let pool = Pool::builder()
        .max_size(config.max_connections.max(1))
        .connection_timeout(config.connect_timeout())
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .map_err(|e| Error::construction(COMPONENT, e))?;

    check_connectivity(&pool)?;
    debug!(path = %config.path, "Relational store reachable");
    Ok(pool)
}

/// Run a trivial query on a pooled connection.
pub fn check_connectivity(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::construction(COMPONENT, e))?;
    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map_err(|e| Error::construction(COMPONENT, e))?;
    Ok(())
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::construction(COMPONENT, e))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::construction(COMPONENT, e))?;
    Ok(())
}

/// Configure SQLite connection pragmas applied to every pooled connection.
pub fn configure_sqlite_connection(conn: &mut SqliteConnection) -> QueryResult<()> {
    diesel::sql_query("PRAGMA busy_timeout=5000").execute(conn)?;
    Ok(())
}
