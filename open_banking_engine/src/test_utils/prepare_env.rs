use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tempfile::TempDir;

use crate::SqliteDatabase;

/// A migrated SQLite database in its own temporary directory. The directory (and the database) is removed when this
/// value is dropped.
pub struct TestDatabase {
    pub db: SqliteDatabase,
    pub url: String,
    _dir: TempDir,
}

impl TestDatabase {
    pub fn db(&self) -> SqliteDatabase {
        self.db.clone()
    }
}

pub async fn prepare_test_env() -> TestDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Error creating temporary directory");
    let url = db_url_in(dir.path());
    create_database(&url).await;
    let db = run_migrations(&url).await;
    TestDatabase { db, url, _dir: dir }
}

pub fn db_url_in<P: AsRef<Path>>(dir: P) -> String {
    let path = dir.as_ref().join(format!("test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Migrations complete on {url}");
    db
}

pub async fn create_database(url: &str) {
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("Error dropping database {url}: {e:?}");
        }
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    debug!("Created Sqlite database {url}");
}
