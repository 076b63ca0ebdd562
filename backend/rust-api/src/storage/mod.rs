//! Persistence seams for the learning engine.
//!
//! Every store is a trait object so the engine runs the same against MongoDB/Redis in
//! production and the in-memory maps used by tests and `STORAGE_BACKEND=memory`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::activity::{Activity, ActivityResultRecord, SubmissionResult};
use crate::models::mastery::MasteryRecord;
use crate::models::progression::ProgressionAccount;
use crate::models::LearningIntent;

pub mod memory;
pub mod mongo;
pub mod redis_cache;

pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use redis_cache::RedisCache;

#[async_trait]
pub trait MasteryStore: Send + Sync {
    async fn load(&self, learner_id: &str, intent_id: &str) -> Result<Option<MasteryRecord>>;
    async fn save(&self, record: &MasteryRecord) -> Result<()>;
    async fn list_for_learner(&self, learner_id: &str) -> Result<Vec<MasteryRecord>>;
}

#[async_trait]
pub trait ProgressionStore: Send + Sync {
    async fn load(&self, learner_id: &str) -> Result<Option<ProgressionAccount>>;
    async fn save(&self, account: &ProgressionAccount) -> Result<()>;
    async fn top_by_xp(&self, limit: usize) -> Result<Vec<ProgressionAccount>>;
}

#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn insert(&self, intent: &LearningIntent) -> Result<()>;
    async fn get(&self, intent_id: &str) -> Result<Option<LearningIntent>>;
    async fn find(
        &self,
        learner_id: &str,
        subject: &str,
        topic: &str,
    ) -> Result<Option<LearningIntent>>;
    async fn list(&self, learner_id: &str) -> Result<Vec<LearningIntent>>;
}

/// Outstanding activities. Expired entries read back as `None`.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn put(&self, activity: &Activity) -> Result<()>;
    async fn get(&self, challenge_id: &str) -> Result<Option<Activity>>;
}

/// How long a returned result is kept for replay. Outlives the activity itself.
pub const REPLAY_TTL_SECONDS: u64 = 86_400;

/// Results already returned for a challenge, replayed on re-submission.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    async fn get(&self, challenge_id: &str) -> Result<Option<SubmissionResult>>;
    async fn put(&self, challenge_id: &str, result: &SubmissionResult) -> Result<()>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Writing a record whose id is already logged replaces it.
    async fn insert(&self, record: &ActivityResultRecord) -> Result<()>;
    /// Newest first.
    async fn recent(&self, learner_id: &str, limit: usize) -> Result<Vec<ActivityResultRecord>>;
}

#[derive(Clone)]
pub struct Stores {
    pub mastery: Arc<dyn MasteryStore>,
    pub progression: Arc<dyn ProgressionStore>,
    pub intents: Arc<dyn IntentStore>,
    pub activities: Arc<dyn ActivityStore>,
    pub replays: Arc<dyn ReplayStore>,
    pub results: Arc<dyn ResultStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            mastery: store.clone(),
            progression: store.clone(),
            intents: store.clone(),
            activities: store.clone(),
            replays: store.clone(),
            results: store,
        }
    }

    /// Durable records in MongoDB, short-lived activity and replay entries in Redis.
    pub fn persistent(mongo: MongoStore, redis: RedisCache) -> Self {
        let mongo = Arc::new(mongo);
        let redis = Arc::new(redis);
        Self {
            mastery: mongo.clone(),
            progression: mongo.clone(),
            intents: mongo.clone(),
            results: mongo,
            activities: redis.clone(),
            replays: redis,
        }
    }
}
