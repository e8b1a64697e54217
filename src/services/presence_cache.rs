//! Redis mirror of the in-memory presence registry.
//!
//! Each live session keeps a `presence:{user_id}` key alive with a TTL that
//! the WebSocket heartbeat refreshes. If a disconnect event is ever missed,
//! the key expires on its own instead of going stale forever. All operations
//! are best-effort: Redis being down degrades presence queries, not delivery.

use crate::redis_client::RedisClient;
use redis::AsyncCommands;
use uuid::Uuid;

fn presence_key(user_id: Uuid) -> String {
    format!("presence:{user_id}")
}

pub async fn mark_online(redis: &RedisClient, user_id: Uuid, ttl_secs: u64) {
    let mut conn = redis.connection();
    let result: Result<(), _> = conn
        .set_ex(presence_key(user_id), "1", ttl_secs)
        .await;
    if let Err(e) = result {
        tracing::warn!(%user_id, error = %e, "failed to mark presence in redis");
    }
}

/// Called from the heartbeat; identical to `mark_online` but logged at debug
/// so a flapping Redis does not flood the logs every 5 seconds.
pub async fn refresh(redis: &RedisClient, user_id: Uuid, ttl_secs: u64) {
    let mut conn = redis.connection();
    let result: Result<(), _> = conn
        .set_ex(presence_key(user_id), "1", ttl_secs)
        .await;
    if let Err(e) = result {
        tracing::debug!(%user_id, error = %e, "failed to refresh presence ttl");
    }
}

pub async fn mark_offline(redis: &RedisClient, user_id: Uuid) {
    let mut conn = redis.connection();
    let result: Result<(), _> = conn.del(presence_key(user_id)).await;
    if let Err(e) = result {
        tracing::warn!(%user_id, error = %e, "failed to clear presence in redis");
    }
}

pub async fn is_online(redis: &RedisClient, user_id: Uuid) -> bool {
    let mut conn = redis.connection();
    match conn.exists::<_, bool>(presence_key(user_id)).await {
        Ok(exists) => exists,
        Err(e) => {
            tracing::debug!(%user_id, error = %e, "presence lookup failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_per_user() {
        let id = Uuid::new_v4();
        assert_eq!(presence_key(id), format!("presence:{id}"));
        assert_eq!(presence_key(id), presence_key(id));
    }
}
