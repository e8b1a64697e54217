use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};

#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    pub async fn from_url(url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }

    /// ConnectionManager is a cheap handle; clone per operation.
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}
