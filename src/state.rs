use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::mailer::Mailer;
use crate::services::media_store::MediaStore;

/// Everything a handler needs; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let media = MediaStore::new(config.media_root.clone(), config.media_url.clone());
        Self {
            pool,
            config: Arc::new(config),
            mailer,
            media,
        }
    }
}
