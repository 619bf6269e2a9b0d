use std::path::PathBuf;

use tempfile::TempDir;
use waitnotify::adapter::outbound::sqlite::database::connection::{open, DbPool};

/// Temporary SQLite database for integration tests.
///
/// Backed by a file so every pooled connection sees the same data. The
/// directory is removed on drop.
pub struct TempDb {
    dir: TempDir,
    pool: DbPool,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("waitnotify-{name}-"))
            .tempdir()
            .expect("create temp dir");
        let pool = open(&Self::url_in(&dir)).expect("open sqlite database");
        Self { dir, pool }
    }

    fn url_in(dir: &TempDir) -> String {
        dir.path().join("wait.db").to_string_lossy().into_owned()
    }

    pub fn url(&self) -> String {
        Self::url_in(&self.dir)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("wait.db")
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
