use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{
    ActivityStore, IntentStore, MasteryStore, ProgressionStore, ReplayStore, ResultStore,
    REPLAY_TTL_SECONDS,
};
use crate::models::activity::{Activity, ActivityResultRecord, SubmissionResult};
use crate::models::mastery::MasteryRecord;
use crate::models::progression::ProgressionAccount;
use crate::models::LearningIntent;

/// Process-local storage backing every store trait.
#[derive(Default)]
pub struct MemoryStore {
    mastery: RwLock<HashMap<String, MasteryRecord>>,
    accounts: RwLock<HashMap<String, ProgressionAccount>>,
    intents: RwLock<HashMap<String, LearningIntent>>,
    activities: RwLock<HashMap<String, Activity>>,
    // result and the instant it stops being replayed
    replays: RwLock<HashMap<String, (SubmissionResult, DateTime<Utc>)>>,
    results: RwLock<Vec<ActivityResultRecord>>,
}

#[async_trait]
impl MasteryStore for MemoryStore {
    async fn load(&self, learner_id: &str, intent_id: &str) -> Result<Option<MasteryRecord>> {
        let key = MasteryRecord::record_id(learner_id, intent_id);
        Ok(self.mastery.read().await.get(&key).cloned())
    }

    async fn save(&self, record: &MasteryRecord) -> Result<()> {
        self.mastery
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_for_learner(&self, learner_id: &str) -> Result<Vec<MasteryRecord>> {
        let mut records: Vec<MasteryRecord> = self
            .mastery
            .read()
            .await
            .values()
            .filter(|r| r.learner_id == learner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }
}

#[async_trait]
impl ProgressionStore for MemoryStore {
    async fn load(&self, learner_id: &str) -> Result<Option<ProgressionAccount>> {
        Ok(self.accounts.read().await.get(learner_id).cloned())
    }

    async fn save(&self, account: &ProgressionAccount) -> Result<()> {
        self.accounts
            .write()
            .await
            .insert(account.learner_id.clone(), account.clone());
        Ok(())
    }

    async fn top_by_xp(&self, limit: usize) -> Result<Vec<ProgressionAccount>> {
        let mut accounts: Vec<ProgressionAccount> =
            self.accounts.read().await.values().cloned().collect();
        accounts.sort_by(|a, b| {
            b.total_xp
                .cmp(&a.total_xp)
                .then_with(|| a.learner_id.cmp(&b.learner_id))
        });
        accounts.truncate(limit);
        Ok(accounts)
    }
}

#[async_trait]
impl IntentStore for MemoryStore {
    async fn insert(&self, intent: &LearningIntent) -> Result<()> {
        let mut intents = self.intents.write().await;
        if intents.contains_key(&intent.id) {
            anyhow::bail!("Learning intent {} already exists", intent.id);
        }
        intents.insert(intent.id.clone(), intent.clone());
        Ok(())
    }

    async fn get(&self, intent_id: &str) -> Result<Option<LearningIntent>> {
        Ok(self.intents.read().await.get(intent_id).cloned())
    }

    async fn find(
        &self,
        learner_id: &str,
        subject: &str,
        topic: &str,
    ) -> Result<Option<LearningIntent>> {
        Ok(self
            .intents
            .read()
            .await
            .values()
            .find(|i| i.learner_id == learner_id && i.subject == subject && i.topic == topic)
            .cloned())
    }

    async fn list(&self, learner_id: &str) -> Result<Vec<LearningIntent>> {
        let mut intents: Vec<LearningIntent> = self
            .intents
            .read()
            .await
            .values()
            .filter(|i| i.learner_id == learner_id)
            .cloned()
            .collect();
        intents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(intents)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn put(&self, activity: &Activity) -> Result<()> {
        let mut activities = self.activities.write().await;
        let now = Utc::now();
        activities.retain(|_, a| a.expires_at > now);
        activities.insert(activity.challenge_id.clone(), activity.clone());
        Ok(())
    }

    async fn get(&self, challenge_id: &str) -> Result<Option<Activity>> {
        Ok(self
            .activities
            .read()
            .await
            .get(challenge_id)
            .filter(|a| a.expires_at > Utc::now())
            .cloned())
    }
}

#[async_trait]
impl ReplayStore for MemoryStore {
    async fn get(&self, challenge_id: &str) -> Result<Option<SubmissionResult>> {
        Ok(self
            .replays
            .read()
            .await
            .get(challenge_id)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(result, _)| result.clone()))
    }

    async fn put(&self, challenge_id: &str, result: &SubmissionResult) -> Result<()> {
        let mut replays = self.replays.write().await;
        let now = Utc::now();
        replays.retain(|_, (_, expires_at)| *expires_at > now);
        replays.insert(
            challenge_id.to_string(),
            (
                result.clone(),
                now + Duration::seconds(REPLAY_TTL_SECONDS as i64),
            ),
        );
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert(&self, record: &ActivityResultRecord) -> Result<()> {
        let mut results = self.results.write().await;
        match results.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => results.push(record.clone()),
        }
        Ok(())
    }

    async fn recent(&self, learner_id: &str, limit: usize) -> Result<Vec<ActivityResultRecord>> {
        Ok(self
            .results
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.learner_id == learner_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::ActivityType;
    use crate::models::mastery::{LoopStage, LoopStatus, MasteryState};

    fn activity(id: &str, ttl_seconds: i64) -> Activity {
        let now = Utc::now();
        Activity {
            challenge_id: id.to_string(),
            learner_id: "learner".into(),
            intent_id: "intent".into(),
            activity_type: ActivityType::Coding,
            subject: "CS".into(),
            topic: "Sorting".into(),
            payload: serde_json::json!({}),
            answer_key: serde_json::json!({"answer": "42"}),
            points: 100,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    #[tokio::test]
    async fn expired_activities_are_not_returned() {
        let store = MemoryStore::default();
        ActivityStore::put(&store, &activity("live", 60)).await.unwrap();
        ActivityStore::put(&store, &activity("stale", -1)).await.unwrap();

        assert!(ActivityStore::get(&store, "live").await.unwrap().is_some());
        assert!(ActivityStore::get(&store, "stale").await.unwrap().is_none());
        assert!(ActivityStore::get(&store, "missing").await.unwrap().is_none());
    }

    fn replay(challenge_id: &str) -> SubmissionResult {
        SubmissionResult {
            challenge_id: challenge_id.to_string(),
            is_correct: true,
            score: 1.0,
            xp_earned: 100,
            new_proficiency: 50.0,
            mastery_state: MasteryState::InProgress,
            loop_status: LoopStatus {
                stage: LoopStage::Understand,
                feedback: None,
            },
            explanation: None,
        }
    }

    #[tokio::test]
    async fn expired_replays_are_pruned() {
        let store = MemoryStore::default();
        store.replays.write().await.insert(
            "l1:old".into(),
            (replay("old"), Utc::now() - Duration::seconds(1)),
        );
        assert!(ReplayStore::get(&store, "l1:old").await.unwrap().is_none());

        ReplayStore::put(&store, "l1:new", &replay("new")).await.unwrap();
        assert_eq!(store.replays.read().await.len(), 1);
        assert_eq!(
            ReplayStore::get(&store, "l1:new").await.unwrap(),
            Some(replay("new"))
        );
    }

    #[tokio::test]
    async fn result_log_keeps_one_entry_per_challenge() {
        let store = MemoryStore::default();
        let mut record = ActivityResultRecord {
            id: ActivityResultRecord::record_id("l1", "c1"),
            learner_id: "l1".into(),
            challenge_id: "c1".into(),
            intent_id: "i1".into(),
            is_correct: false,
            score: 0.0,
            xp_earned: 0,
            violation_count: 0,
            created_at: Utc::now(),
        };
        ResultStore::insert(&store, &record).await.unwrap();
        record.is_correct = true;
        ResultStore::insert(&store, &record).await.unwrap();

        let logged = store.recent("l1", 10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].is_correct);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_xp() {
        let store = MemoryStore::default();
        for (id, xp) in [("a", 50), ("b", 300), ("c", 120)] {
            let mut account = ProgressionAccount::new(id);
            account.total_xp = xp;
            ProgressionStore::save(&store, &account).await.unwrap();
        }

        let top = store.top_by_xp(2).await.unwrap();
        let ids: Vec<&str> = top.iter().map(|a| a.learner_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn duplicate_intent_ids_are_rejected() {
        let store = MemoryStore::default();
        let intent = LearningIntent {
            id: "i1".into(),
            learner_id: "l1".into(),
            subject: "Physics".into(),
            topic: "Optics".into(),
            created_at: Utc::now(),
        };
        IntentStore::insert(&store, &intent).await.unwrap();
        assert!(IntentStore::insert(&store, &intent).await.is_err());
        assert_eq!(
            store.find("l1", "Physics", "Optics").await.unwrap(),
            Some(intent)
        );
    }
}
