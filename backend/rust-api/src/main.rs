use focuslearner_api::{
    config::{Config, StorageBackend},
    create_router,
    services::AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() {
    let provider = init_telemetry();

    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focuslearner_api=debug,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .with(provider.as_ref().map(|(_, tracer)| {
            tracing_opentelemetry::layer().with_tracer(tracer.clone())
        }))
        .init();

    tracing::info!("Starting FocusLearner API");

    let config = Config::load().expect("Failed to load configuration");
    tracing::info!(
        "Configuration loaded for environment: {:?}, storage: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string()),
        config.storage
    );

    let app_state = match config.storage {
        StorageBackend::Memory => {
            AppState::in_memory(config).expect("Failed to initialize application state")
        }
        StorageBackend::Mongo => {
            let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
                .await
                .expect("Failed to connect to MongoDB");
            tracing::info!("MongoDB connected");

            let redis_client = redis::Client::open(config.redis_uri.clone())
                .expect("Failed to create Redis client");

            AppState::new(config, mongo_client, redis_client)
                .await
                .expect("Failed to initialize application state")
        }
    };

    let app = create_router(Arc::new(app_state));

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    if let Some((provider, _)) = provider {
        tracing::info!("Shutting down OpenTelemetry");
        if let Err(e) = provider.shutdown() {
            eprintln!("OpenTelemetry shutdown failed: {}", e);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

/// OTLP export is enabled only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_telemetry() -> Option<(
    opentelemetry_sdk::trace::SdkTracerProvider,
    opentelemetry_sdk::trace::Tracer,
)> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("Failed to create OTLP exporter, tracing export disabled: {}", e);
            return None;
        }
    };

    let resource = Resource::builder_empty()
        .with_service_name("focuslearner-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("focuslearner-api");
    opentelemetry::global::set_tracer_provider(provider.clone());

    Some((provider, tracer))
}
