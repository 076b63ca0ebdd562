use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongo,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self, config::ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            other => Err(config::ConfigError::Message(format!(
                "Unknown storage backend '{}', expected 'memory' or 'mongo'",
                other
            ))),
        }
    }
}

/// Policy constants for the learning engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub gate_threshold: f64,
    pub mastery_threshold: f64,
    pub distraction_noise_seconds: u32,
    pub focus_cooldown_seconds: u32,
    pub activity_ttl_seconds: u64,
    pub collaborator_timeout_ms: u64,
    pub proficiency_weight: f64,
    pub failure_decay: f64,
    pub violation_xp_penalty_pct: u32,
    pub level_thresholds: Vec<u64>,
    pub leaderboard_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            gate_threshold: 30.0,
            mastery_threshold: 80.0,
            distraction_noise_seconds: 2,
            focus_cooldown_seconds: 3,
            activity_ttl_seconds: 3600,
            collaborator_timeout_ms: 10_000,
            proficiency_weight: 0.5,
            failure_decay: 0.1,
            violation_xp_penalty_pct: 10,
            level_thresholds: vec![0, 100, 300, 600, 1000, 1500, 2100, 2800, 3600, 4500, 5500],
            leaderboard_limit: 10,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let bad = |msg: &str| Err(config::ConfigError::Message(msg.to_string()));

        if !(0.0..=100.0).contains(&self.gate_threshold) {
            return bad("engine.gate_threshold must be within [0, 100]");
        }
        if !(0.0..=100.0).contains(&self.mastery_threshold) {
            return bad("engine.mastery_threshold must be within [0, 100]");
        }
        if !(0.0..=1.0).contains(&self.proficiency_weight) {
            return bad("engine.proficiency_weight must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.failure_decay) {
            return bad("engine.failure_decay must be within [0, 1]");
        }
        if self.focus_cooldown_seconds == 0 {
            return bad("engine.focus_cooldown_seconds must be at least 1");
        }
        if self.level_thresholds.first() != Some(&0) {
            return bad("engine.level_thresholds must start at 0");
        }
        if self.level_thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return bad("engine.level_thresholds must be strictly increasing");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageBackend,
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub generator_api_url: String,
    pub generator_enabled: bool,
    pub engine: EngineSettings,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml + APP__* overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let storage = settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
            .map(|value| StorageBackend::parse(&value))
            .unwrap_or(Ok(StorageBackend::Mongo))?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "focuslearner".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let generator_api_url = settings
            .get_string("generator.url")
            .or_else(|_| env::var("GENERATOR_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let generator_enabled = settings
            .get_bool("generator.enabled")
            .ok()
            .unwrap_or_else(|| env_flag("GENERATOR_ENABLED", false));

        let engine: EngineSettings = match settings.get::<EngineSettings>("engine") {
            Ok(engine) => engine,
            Err(config::ConfigError::NotFound(_)) => EngineSettings::default(),
            Err(e) => return Err(e),
        };
        engine.validate()?;

        Ok(Config {
            storage,
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            generator_api_url,
            generator_enabled,
            engine,
        })
    }

    /// In-memory configuration used by tests and local runs without MongoDB/Redis.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            storage: StorageBackend::Memory,
            mongo_uri: String::new(),
            redis_uri: String::new(),
            mongo_database: "focuslearner".to_string(),
            jwt_secret: jwt_secret.to_string(),
            generator_api_url: String::new(),
            generator_enabled: false,
            engine: EngineSettings::default(),
        }
    }
}

/// Reads a boolean environment flag ("1"/"true" vs "0"/"false").
pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | ""),
        Err(_) => default,
    }
}
