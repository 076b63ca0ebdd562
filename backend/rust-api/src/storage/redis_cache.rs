use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;

use super::{ActivityStore, ReplayStore, REPLAY_TTL_SECONDS};
use crate::metrics::track_cache_operation;
use crate::models::activity::{Activity, SubmissionResult};

#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
}

impl RedisCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub fn activity_key(challenge_id: &str) -> String {
        format!("activity:{}", challenge_id)
    }

    pub fn replay_key(challenge_id: &str) -> String {
        format!("idempotency:submission:{}", challenge_id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.redis.clone();
        let cached: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to read {}", key))?;

        cached
            .map(|json| serde_json::from_str(&json).context("Failed to deserialize cached value"))
            .transpose()
    }

    async fn set_json<T: serde::Serialize>(&self, key: &str, ttl: u64, value: &T) -> Result<()> {
        let mut conn = self.redis.clone();
        let json = serde_json::to_string(value).context("Failed to serialize cached value")?;

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl)
            .arg(&json)
            .query_async::<()>(&mut conn)
            .await
            .with_context(|| format!("Failed to write {}", key))
    }
}

#[async_trait]
impl ActivityStore for RedisCache {
    async fn put(&self, activity: &Activity) -> Result<()> {
        let ttl = (activity.expires_at - Utc::now()).num_seconds().max(1) as u64;
        track_cache_operation(
            "setex_activity",
            self.set_json(&Self::activity_key(&activity.challenge_id), ttl, activity),
        )
        .await
    }

    async fn get(&self, challenge_id: &str) -> Result<Option<Activity>> {
        let activity: Option<Activity> = track_cache_operation(
            "get_activity",
            self.get_json(&Self::activity_key(challenge_id)),
        )
        .await?;
        Ok(activity.filter(|a| a.expires_at > Utc::now()))
    }
}

#[async_trait]
impl ReplayStore for RedisCache {
    async fn get(&self, challenge_id: &str) -> Result<Option<SubmissionResult>> {
        track_cache_operation("get_replay", self.get_json(&Self::replay_key(challenge_id))).await
    }

    async fn put(&self, challenge_id: &str, result: &SubmissionResult) -> Result<()> {
        track_cache_operation(
            "setex_replay",
            self.set_json(&Self::replay_key(challenge_id), REPLAY_TTL_SECONDS, result),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(RedisCache::activity_key("abc"), "activity:abc");
        assert_eq!(
            RedisCache::replay_key("abc"),
            "idempotency:submission:abc"
        );
    }
}
