use std::sync::Arc;
use std::time::Duration;

use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use crate::config::{Config, StorageBackend};
use crate::storage::{MongoStore, RedisCache, Stores};

pub mod activity_engine;
pub mod analytics_service;
pub mod content_gate;
pub mod focus_monitor;
pub mod generator_client;
pub mod intent_service;
pub mod learning_loop;
pub mod mastery_ledger;
pub mod policy;
pub mod progression_service;
pub mod telemetry_service;

use activity_engine::{ActivityEngine, ActivityEngineDeps};
use analytics_service::AnalyticsService;
use content_gate::ContentGate;
use focus_monitor::{media_pause_hook, FocusRegistry, FocusSettings};
use generator_client::{ContentGenerator, Evaluator, HttpGenerator, LocalEvaluator, LocalGenerator};
use intent_service::IntentRegistry;
use learning_loop::LearningLoop;
use mastery_ledger::MasteryLedger;
use policy::Policies;
use progression_service::ProgressionService;
use telemetry_service::{MemoryTelemetry, PersistentTelemetry, TelemetrySink};

/// External collaborators the engine is wired against.
pub struct Collaborators {
    pub generator: Arc<dyn ContentGenerator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

/// Live connections, kept for health checks.
pub enum Backend {
    Memory,
    Persistent {
        mongo: Database,
        redis: ConnectionManager,
    },
}

pub struct AppState {
    pub config: Config,
    pub backend: Backend,
    pub intents: Arc<IntentRegistry>,
    pub ledger: Arc<MasteryLedger>,
    pub progression: Arc<ProgressionService>,
    pub engine: Arc<ActivityEngine>,
    pub gate: Arc<ContentGate>,
    pub focus: Arc<FocusRegistry>,
    pub analytics: AnalyticsService,
}

impl AppState {
    /// Connects to MongoDB and Redis and wires the engine over them.
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let stores = Stores::persistent(MongoStore::new(mongo.clone()), RedisCache::new(redis.clone()));
        let telemetry: Arc<dyn TelemetrySink> =
            Arc::new(PersistentTelemetry::new(mongo.clone(), redis.clone()));
        let collaborators = Self::default_collaborators(&config, telemetry)?;

        Ok(Self::assemble(
            config,
            Backend::Persistent { mongo, redis },
            stores,
            collaborators,
        ))
    }

    /// Process-local state: in-memory stores and telemetry.
    pub fn in_memory(config: Config) -> anyhow::Result<Self> {
        if config.storage != StorageBackend::Memory {
            tracing::warn!("Building in-memory state although storage backend is {:?}", config.storage);
        }
        let collaborators =
            Self::default_collaborators(&config, Arc::new(MemoryTelemetry::default()))?;
        Ok(Self::assemble(
            config,
            Backend::Memory,
            Stores::in_memory(),
            collaborators,
        ))
    }

    fn default_collaborators(
        config: &Config,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> anyhow::Result<Collaborators> {
        if config.generator_enabled {
            tracing::info!("Using generator API at {}", config.generator_api_url);
            let http = Arc::new(HttpGenerator::new(
                &config.generator_api_url,
                Duration::from_millis(config.engine.collaborator_timeout_ms),
            )?);
            Ok(Collaborators {
                generator: http.clone(),
                evaluator: http,
                telemetry,
            })
        } else {
            tracing::info!("Generator API disabled, serving local content");
            Ok(Collaborators {
                generator: Arc::new(LocalGenerator),
                evaluator: Arc::new(LocalEvaluator::default()),
                telemetry,
            })
        }
    }

    /// Wires every engine component over the given stores and collaborators.
    pub fn assemble(
        config: Config,
        backend: Backend,
        stores: Stores,
        collaborators: Collaborators,
    ) -> Self {
        let settings = &config.engine;
        let policies = Arc::new(Policies::from_settings(settings));

        let intents = Arc::new(IntentRegistry::new(stores.intents.clone()));
        let ledger = Arc::new(MasteryLedger::new(
            stores.mastery.clone(),
            policies.clone(),
            LearningLoop::new(settings.mastery_threshold),
        ));
        let progression = Arc::new(ProgressionService::new(
            stores.progression.clone(),
            policies.clone(),
        ));
        let analytics = AnalyticsService::new(stores.results.clone(), stores.mastery.clone());

        let engine = Arc::new(ActivityEngine::new(
            ActivityEngineDeps {
                stores,
                intents: intents.clone(),
                ledger: ledger.clone(),
                progression: progression.clone(),
                generator: collaborators.generator,
                evaluator: collaborators.evaluator,
                policies,
            },
            settings,
        ));
        let gate = Arc::new(ContentGate::new(
            intents.clone(),
            ledger.clone(),
            engine.clone(),
            settings.gate_threshold,
        ));
        let focus = Arc::new(
            FocusRegistry::new(FocusSettings::from(settings), collaborators.telemetry)
                .with_pause_hook(media_pause_hook()),
        );

        Self {
            config,
            backend,
            intents,
            ledger,
            progression,
            engine,
            gate,
            focus,
            analytics,
        }
    }
}
