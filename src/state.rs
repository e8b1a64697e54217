use crate::config::Config;
use crate::redis_client::RedisClient;
use crate::websocket::PresenceRegistry;
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Shared application state, cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Pool,
    pub registry: PresenceRegistry,
    pub redis: RedisClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Pool, redis: RedisClient, config: Config) -> Self {
        Self {
            db,
            registry: PresenceRegistry::new(),
            redis,
            config: Arc::new(config),
        }
    }
}
