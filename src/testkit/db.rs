//! Temporary SQLite databases.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;

use crate::config::DbConfig;
use crate::db::{create_pool, run_migrations, DbPool, OrderStore};

/// Migrated SQLite database in the system temp directory, removed on drop.
pub struct TempDb {
    path: PathBuf,
    pool: DbPool,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        path.push(format!("easyswap-sync-{name}-{nanos}.db"));

        let config = DbConfig {
            path: path.display().to_string(),
            max_connections: 4,
            connect_timeout_ms: 2_000,
        };
        let pool = create_pool(&config).expect("create sqlite pool");
        run_migrations(&pool).expect("run migrations");

        // WAL mode improves concurrent writer behavior in tests.
        {
            let mut conn = pool.get().expect("get sqlite connection");
            diesel::sql_query("PRAGMA journal_mode=WAL")
                .execute(&mut conn)
                .expect("enable WAL mode");
        }

        Self { path, pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> OrderStore {
        OrderStore::new(self.pool.clone())
    }

    /// Run raw SQL, for breaking the schema on purpose.
    pub fn execute(&self, sql: &str) {
        let mut conn = self.pool.get().expect("get sqlite connection");
        diesel::sql_query(sql).execute(&mut conn).expect("execute sql");
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        for suffix in ["-wal", "-shm"] {
            let mut side = self.path.clone().into_os_string();
            side.push(suffix);
            let _ = std::fs::remove_file(side);
        }
    }
}
