use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use speechcast_backend::controllers::{
    health::HealthState, materials::MaterialController, speech::SpeechController,
};
use speechcast_backend::domain::generation::{ChunkExecutor, TaskQueue, WorkerPool};
use speechcast_backend::domain::material::MaterialService;
use speechcast_backend::domain::speech::{SpeechService, VoiceResolver};
use speechcast_backend::infrastructure::config::{
    Config, LogFormat, StorageBackend, StoreBackend, TtsProviderKind,
};
use speechcast_backend::infrastructure::db::{check_connection, create_pool, run_migrations, DbPool};
use speechcast_backend::infrastructure::http::{create_router, start_http_server};
use speechcast_backend::infrastructure::providers::{OpenAiProvider, PollyProvider, SpeechProvider};
use speechcast_backend::infrastructure::repositories::{
    InMemoryJobStore, InMemoryMaterialStore, JobStore, MaterialStore, PgJobStore, PgMaterialStore,
};
use speechcast_backend::infrastructure::storage::{AudioStorage, LocalAudioStorage, S3AudioStorage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting Speechcast Backend on {}:{}",
        config.host,
        config.port
    );

    // === STORES ===
    // Selected once; everything downstream only sees the traits
    let (pool, job_store, material_store): (
        Option<Arc<DbPool>>,
        Arc<dyn JobStore>,
        Arc<dyn MaterialStore>,
    ) = match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(database_url)) => {
            let pool = create_pool(database_url, config.database_max_connections).await?;
            tracing::info!("Database connection pool created");

            check_connection(&pool).await?;
            tracing::info!("Database connection verified");

            run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");

            let pool = Arc::new(pool);
            (
                Some(pool.clone()),
                Arc::new(PgJobStore::new(pool.clone())) as Arc<dyn JobStore>,
                Arc::new(PgMaterialStore::new(pool)) as Arc<dyn MaterialStore>,
            )
        }
        (StoreBackend::Postgres, None) => {
            return Err("DATABASE_URL is required when STORE_BACKEND=postgres".into());
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory stores; jobs and chunk audio are lost on restart");
            (
                None,
                Arc::new(InMemoryJobStore::new()) as Arc<dyn JobStore>,
                Arc::new(InMemoryMaterialStore::new()) as Arc<dyn MaterialStore>,
            )
        }
    };

    // === AWS ===
    let needs_aws = config.tts_provider == TtsProviderKind::Polly
        || config.storage_backend == StorageBackend::S3;
    let aws_config = if needs_aws {
        tracing::info!("Loading AWS configuration with region: {}", config.aws_region);

        let has_access_key = std::env::var("AWS_ACCESS_KEY_ID").is_ok();
        let has_secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").is_ok();
        tracing::info!(
            has_access_key_id = has_access_key,
            has_secret_access_key = has_secret_key,
            "AWS credentials environment check"
        );

        if !has_access_key || !has_secret_key {
            tracing::warn!("AWS credentials not found in environment variables. Will attempt to use other credential providers (instance metadata, etc.)");
        }

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;
        tracing::info!(region = ?aws_config.region(), "AWS configuration loaded");
        Some(aws_config)
    } else {
        None
    };

    // === PROVIDER ===
    let provider: Arc<dyn SpeechProvider> = match (config.tts_provider, &aws_config) {
        (TtsProviderKind::Polly, Some(aws_config)) => {
            let polly_client = Arc::new(aws_sdk_polly::Client::new(aws_config));
            Arc::new(PollyProvider::new(polly_client, config.provider_timeout()))
                as Arc<dyn SpeechProvider>
        }
        (TtsProviderKind::OpenAi, _) => Arc::new(OpenAiProvider::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.openai_tts_model.clone(),
            config.provider_timeout(),
        )?),
        (TtsProviderKind::Polly, None) => return Err("AWS configuration was not loaded".into()),
    };

    if provider.is_configured() {
        tracing::info!(provider = provider.name(), "Speech provider initialized");
    } else {
        tracing::warn!(
            provider = provider.name(),
            "Speech provider has no credentials; speech requests will be rejected"
        );
    }

    // === STORAGE ===
    let (storage, audio_dir): (Arc<dyn AudioStorage>, Option<PathBuf>) =
        match (config.storage_backend, &aws_config) {
            (StorageBackend::S3, Some(aws_config)) => {
                let s3_client = Arc::new(aws_sdk_s3::Client::new(aws_config));
                (
                    Arc::new(S3AudioStorage::new(
                        s3_client,
                        config.s3_bucket.clone(),
                        config.storage_public_base_url.clone(),
                    )) as Arc<dyn AudioStorage>,
                    None,
                )
            }
            (StorageBackend::S3, None) => return Err("AWS configuration was not loaded".into()),
            (StorageBackend::Local, _) => {
                let storage = LocalAudioStorage::new(
                    &config.local_storage_dir,
                    config.storage_public_base_url.clone(),
                );
                tokio::fs::create_dir_all(storage.root()).await?;
                let audio_dir = storage.root().clone();
                (Arc::new(storage) as Arc<dyn AudioStorage>, Some(audio_dir))
            }
        };
    tracing::info!(storage = storage.name(), "Audio storage initialized");

    // === WORKERS ===
    let queue = Arc::new(TaskQueue::new());
    let executor = Arc::new(ChunkExecutor::new(
        provider.clone(),
        storage.clone(),
        job_store.clone(),
        material_store.clone(),
    ));
    let worker_pool = Arc::new(WorkerPool::new(
        queue.clone(),
        executor,
        config.retry_policy(),
        config.worker_concurrency,
    ));
    let _workers = worker_pool.start();

    // === SERVICES ===
    tracing::info!("Instantiating services...");
    let voices = Arc::new(VoiceResolver::new(config.default_voice.clone()));
    let settings = config.generation_settings();
    let speech_service = Arc::new(SpeechService::new(
        job_store,
        provider.clone(),
        storage,
        queue.clone(),
        voices.clone(),
        settings.clone(),
    ));
    let material_service = Arc::new(MaterialService::new(
        material_store,
        provider.clone(),
        queue,
        voices,
        settings,
    ));

    // === CONTROLLERS ===
    tracing::info!("Instantiating controllers...");
    let speech_controller = Arc::new(SpeechController::new(speech_service));
    let material_controller = Arc::new(MaterialController::new(material_service));

    let app = create_router(
        HealthState { pool, provider },
        speech_controller,
        material_controller,
        audio_dir,
    );

    start_http_server(Arc::new(config), app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "speechcast_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "speechcast_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
