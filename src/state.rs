use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::cache::PageCache;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub page_cache: Arc<Mutex<PageCache>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let ttl = std::time::Duration::from_secs(config.feed.cache_seconds);
        Self {
            db,
            config,
            page_cache: Arc::new(Mutex::new(PageCache::new(ttl))),
        }
    }
}
