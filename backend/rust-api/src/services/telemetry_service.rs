use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::Database;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::metrics::track_db_operation;
use crate::models::focus::DistractionEvent;

const DISTRACTIONS_CHANNEL: &str = "distractions";
const DISTRACTIONS_COLLECTION: &str = "distraction_logs";

/// Receives distraction events. Delivery is best-effort; callers never retry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn report(&self, event: &DistractionEvent) -> Result<()>;
}

/// Publishes to Redis pub/sub and appends to the `distraction_logs` collection.
pub struct PersistentTelemetry {
    mongo: Database,
    redis: ConnectionManager,
}

impl PersistentTelemetry {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    async fn publish(&self, event: &DistractionEvent) -> Result<()> {
        let mut conn = self.redis.clone();
        let payload =
            serde_json::to_string(event).context("Failed to serialize distraction for pub/sub")?;

        let _: () = redis::cmd("PUBLISH")
            .arg(DISTRACTIONS_CHANNEL)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .context("Failed to publish distraction to Redis Pub/Sub")?;
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for PersistentTelemetry {
    async fn report(&self, event: &DistractionEvent) -> Result<()> {
        if let Err(e) = self.publish(event).await {
            tracing::warn!("Failed to publish distraction to Redis Pub/Sub: {:#}", e);
        }

        let collection: mongodb::Collection<DistractionEvent> =
            self.mongo.collection(DISTRACTIONS_COLLECTION);
        track_db_operation("insert_one", DISTRACTIONS_COLLECTION, async {
            collection
                .insert_one(event)
                .await
                .map(|_| ())
                .context("Failed to save distraction log")
        })
        .await
    }
}

/// Keeps events in process; used by the in-memory backend and tests.
#[derive(Default)]
pub struct MemoryTelemetry {
    events: RwLock<Vec<DistractionEvent>>,
}

impl MemoryTelemetry {
    pub async fn events(&self) -> Vec<DistractionEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl TelemetrySink for MemoryTelemetry {
    async fn report(&self, event: &DistractionEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
