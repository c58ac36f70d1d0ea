use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::db;
use crate::storage::{LocalStorage, Storage};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    /// Open the database, apply migrations and prepare the uploads directory.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let uploads = config.uploads_path();
        std::fs::create_dir_all(&uploads)?;

        let pool = db::create_pool(&config.db_path())?;
        db::run_migrations(&pool)?;

        let storage = LocalStorage::new(uploads, &config.base_url());
        Ok(Self {
            db: pool,
            config,
            storage: Arc::new(storage),
        })
    }

    /// Public URL for a stored path, if any.
    pub fn storage_url(&self, path: Option<&str>) -> Option<String> {
        path.map(|p| self.storage.url(p))
    }
}
