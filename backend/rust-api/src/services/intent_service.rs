use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::LearningIntent;
use crate::storage::IntentStore;

/// Registry of learning intents planned by each learner.
pub struct IntentRegistry {
    store: Arc<dyn IntentStore>,
    plan_lock: Mutex<()>,
}

impl IntentRegistry {
    pub fn new(store: Arc<dyn IntentStore>) -> Self {
        Self {
            store,
            plan_lock: Mutex::new(()),
        }
    }

    /// Returns the learner's intent for (subject, topic), planning it on first use.
    pub async fn plan(&self, learner_id: &str, subject: &str, topic: &str) -> Result<LearningIntent> {
        let subject = subject.trim();
        let topic = topic.trim();
        if subject.is_empty() || topic.is_empty() {
            return Err(EngineError::InvalidRequest(
                "Subject and topic must not be empty".to_string(),
            ));
        }

        let _guard = self.plan_lock.lock().await;
        if let Some(existing) = self.store.find(learner_id, subject, topic).await? {
            return Ok(existing);
        }

        let intent = LearningIntent {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            subject: subject.to_string(),
            topic: topic.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert(&intent).await?;

        tracing::info!(
            "Learning intent planned: learner={}, intent={}, subject={}, topic={}",
            learner_id,
            intent.id,
            subject,
            topic
        );
        Ok(intent)
    }

    /// Looks up an intent owned by `learner_id`; other learners' intents read as unknown.
    pub async fn get(&self, learner_id: &str, intent_id: &str) -> Result<LearningIntent> {
        match self.store.get(intent_id).await? {
            Some(intent) if intent.learner_id == learner_id => Ok(intent),
            _ => Err(EngineError::UnknownIntent(intent_id.to_string())),
        }
    }

    pub async fn list(&self, learner_id: &str) -> Result<Vec<LearningIntent>> {
        Ok(self.store.list(learner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn plan_is_stable_per_subject_and_topic() {
        let registry = IntentRegistry::new(Arc::new(MemoryStore::default()));
        let first = registry.plan("l1", "Physics", "Optics").await.unwrap();
        let again = registry.plan("l1", " Physics ", "Optics").await.unwrap();
        let other = registry.plan("l1", "Physics", "Waves").await.unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert_eq!(registry.list("l1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn intents_are_private_to_their_learner() {
        let registry = IntentRegistry::new(Arc::new(MemoryStore::default()));
        let intent = registry.plan("owner", "Math", "Algebra").await.unwrap();

        assert!(registry.get("owner", &intent.id).await.is_ok());
        let err = registry.get("someone-else", &intent.id).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownIntent(_)));
    }

    #[tokio::test]
    async fn blank_topic_is_rejected() {
        let registry = IntentRegistry::new(Arc::new(MemoryStore::default()));
        let err = registry.plan("l1", "Math", "  ").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
    }
}
