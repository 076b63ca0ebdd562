use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::{Collection, Database};

use super::{IntentStore, MasteryStore, ProgressionStore, ResultStore};
use crate::metrics::track_db_operation;
use crate::models::activity::ActivityResultRecord;
use crate::models::mastery::MasteryRecord;
use crate::models::progression::ProgressionAccount;
use crate::models::LearningIntent;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

const MASTERY: &str = "mastery_records";
const ACCOUNTS: &str = "progression_accounts";
const INTENTS: &str = "learning_intents";
const RESULTS: &str = "activity_results";

#[derive(Clone)]
pub struct MongoStore {
    mongo: Database,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn mastery(&self) -> Collection<MasteryRecord> {
        self.mongo.collection(MASTERY)
    }

    fn accounts(&self) -> Collection<ProgressionAccount> {
        self.mongo.collection(ACCOUNTS)
    }

    fn intents(&self) -> Collection<LearningIntent> {
        self.mongo.collection(INTENTS)
    }

    fn results(&self) -> Collection<ActivityResultRecord> {
        self.mongo.collection(RESULTS)
    }
}

fn upsert() -> ReplaceOptions {
    ReplaceOptions::builder().upsert(true).build()
}

#[async_trait]
impl MasteryStore for MongoStore {
    async fn load(&self, learner_id: &str, intent_id: &str) -> Result<Option<MasteryRecord>> {
        let id = MasteryRecord::record_id(learner_id, intent_id);
        track_db_operation("find_one", MASTERY, async {
            self.mastery()
                .find_one(doc! { "_id": &id })
                .await
                .context("Failed to load mastery record")
        })
        .await
    }

    async fn save(&self, record: &MasteryRecord) -> Result<()> {
        let collection = self.mastery();
        track_db_operation("replace_one", MASTERY, async {
            retry_async_with_config(RetryConfig::default(), || async {
                collection
                    .replace_one(doc! { "_id": &record.id }, record)
                    .with_options(upsert())
                    .await
                    .map(|_| ())
            })
            .await
            .context("Failed to save mastery record")
        })
        .await
    }

    async fn list_for_learner(&self, learner_id: &str) -> Result<Vec<MasteryRecord>> {
        track_db_operation("find", MASTERY, async {
            let cursor = self
                .mastery()
                .find(doc! { "learner_id": learner_id })
                .sort(doc! { "updated_at": -1 })
                .await
                .context("Failed to query mastery records")?;
            cursor
                .try_collect()
                .await
                .context("Failed to read mastery records")
        })
        .await
    }
}

#[async_trait]
impl ProgressionStore for MongoStore {
    async fn load(&self, learner_id: &str) -> Result<Option<ProgressionAccount>> {
        track_db_operation("find_one", ACCOUNTS, async {
            self.accounts()
                .find_one(doc! { "_id": learner_id })
                .await
                .context("Failed to load progression account")
        })
        .await
    }

    async fn save(&self, account: &ProgressionAccount) -> Result<()> {
        let collection = self.accounts();
        track_db_operation("replace_one", ACCOUNTS, async {
            retry_async_with_config(RetryConfig::default(), || async {
                collection
                    .replace_one(doc! { "_id": &account.learner_id }, account)
                    .with_options(upsert())
                    .await
                    .map(|_| ())
            })
            .await
            .context("Failed to save progression account")
        })
        .await
    }

    async fn top_by_xp(&self, limit: usize) -> Result<Vec<ProgressionAccount>> {
        track_db_operation("find", ACCOUNTS, async {
            let cursor = self
                .accounts()
                .find(doc! {})
                .sort(doc! { "total_xp": -1, "_id": 1 })
                .limit(limit as i64)
                .await
                .context("Failed to query leaderboard")?;
            cursor
                .try_collect()
                .await
                .context("Failed to read leaderboard")
        })
        .await
    }
}

#[async_trait]
impl IntentStore for MongoStore {
    async fn insert(&self, intent: &LearningIntent) -> Result<()> {
        track_db_operation("insert_one", INTENTS, async {
            self.intents()
                .insert_one(intent)
                .await
                .map(|_| ())
                .context("Failed to insert learning intent")
        })
        .await
    }

    async fn get(&self, intent_id: &str) -> Result<Option<LearningIntent>> {
        track_db_operation("find_one", INTENTS, async {
            self.intents()
                .find_one(doc! { "_id": intent_id })
                .await
                .context("Failed to load learning intent")
        })
        .await
    }

    async fn find(
        &self,
        learner_id: &str,
        subject: &str,
        topic: &str,
    ) -> Result<Option<LearningIntent>> {
        track_db_operation("find_one", INTENTS, async {
            self.intents()
                .find_one(doc! {
                    "learner_id": learner_id,
                    "subject": subject,
                    "topic": topic,
                })
                .await
                .context("Failed to look up learning intent")
        })
        .await
    }

    async fn list(&self, learner_id: &str) -> Result<Vec<LearningIntent>> {
        track_db_operation("find", INTENTS, async {
            let cursor = self
                .intents()
                .find(doc! { "learner_id": learner_id })
                .sort(doc! { "created_at": 1 })
                .await
                .context("Failed to query learning intents")?;
            cursor
                .try_collect()
                .await
                .context("Failed to read learning intents")
        })
        .await
    }
}

#[async_trait]
impl ResultStore for MongoStore {
    async fn insert(&self, record: &ActivityResultRecord) -> Result<()> {
        let mongo = self.mongo.clone();
        let record = record.clone();

        // history, written off the request path
        tokio::spawn(async move {
            let collection: Collection<ActivityResultRecord> = mongo.collection(RESULTS);
            let res = track_db_operation("replace_one", RESULTS, async {
                retry_async_with_config(RetryConfig::aggressive(), || async {
                    collection
                        .replace_one(doc! { "_id": &record.id }, &record)
                        .with_options(upsert())
                        .await
                        .map(|_| ())
                })
                .await
                .context("Failed to insert activity result")
            })
            .await;

            match res {
                Ok(()) => tracing::debug!("Activity result saved: id={}", record.id),
                Err(e) => tracing::error!("Background activity result save failed: {:#}", e),
            }
        });

        Ok(())
    }

    async fn recent(&self, learner_id: &str, limit: usize) -> Result<Vec<ActivityResultRecord>> {
        track_db_operation("find", RESULTS, async {
            let cursor = self
                .results()
                .find(doc! { "learner_id": learner_id })
                .sort(doc! { "created_at": -1 })
                .limit(limit as i64)
                .await
                .context("Failed to query activity results")?;
            cursor
                .try_collect()
                .await
                .context("Failed to read activity results")
        })
        .await
    }
}
