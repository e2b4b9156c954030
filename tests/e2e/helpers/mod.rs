use once_cell::sync::Lazy;
use speechcast_backend::controllers::{
    health::HealthState, materials::MaterialController, speech::SpeechController,
};
use speechcast_backend::domain::chunking::ChunkerConfig;
use speechcast_backend::domain::generation::{
    ChunkExecutor, GenerationSettings, RetryPolicy, TaskQueue, WorkerPool,
};
use speechcast_backend::domain::material::MaterialService;
use speechcast_backend::domain::speech::{SpeechService, VoiceResolver};
use speechcast_backend::infrastructure::http::create_router;
use speechcast_backend::infrastructure::repositories::{
    InMemoryJobStore, InMemoryMaterialStore, JobStore, MaterialStore,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use test_context::AsyncTestContext;
use testcontainers::{clients::Cli, Container};
use testcontainers_modules::postgres::Postgres;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub mod db_pool;
pub mod fakes;

use api_client::TestClient;
use db_pool::{DatabasePool, PooledDatabase};
use fakes::{MemoryStorage, ScriptedProvider};

// Docker client for test containers
static DOCKER: Lazy<Cli> = Lazy::new(Cli::default);

// Shared PostgreSQL container, started on first use by the store tests
static SHARED_CONTAINER: Lazy<SharedContainer> = Lazy::new(SharedContainer::new);

static DB_POOL: Lazy<DatabasePool> = Lazy::new(|| DatabasePool::new(SHARED_CONTAINER.port));

/// Shared container that lives for the duration of all tests
struct SharedContainer {
    _container: Container<'static, Postgres>,
    port: u16,
}

impl SharedContainer {
    fn new() -> Self {
        let container = DOCKER.run(Postgres::default());
        let port = container.get_host_port_ipv4(5432);

        println!("🐳 Started shared PostgreSQL container on port {}", port);

        Self {
            _container: container,
            port,
        }
    }
}

/// Lease an isolated, migrated database from the shared container
#[allow(dead_code)]
pub async fn pg_database() -> PooledDatabase {
    DB_POOL
        .get_database()
        .await
        .expect("Failed to get database from pool")
}

#[derive(Debug, Clone)]
pub struct TestOptions {
    pub max_chunk_chars: usize,
    pub worker_concurrency: usize,
    /// When false the queue is left untouched until `start_workers` is called
    pub start_workers: bool,
    pub retry_policy: RetryPolicy,
    pub provider_configured: bool,
    pub provider_delay: Duration,
    pub default_voice: String,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 800,
            worker_concurrency: 4,
            start_workers: true,
            retry_policy: RetryPolicy {
                max_attempts: 2,
                transient_backoff: Duration::from_millis(10),
                rate_limit_backoff: Duration::from_millis(20),
            },
            provider_configured: true,
            provider_delay: Duration::from_millis(5),
            default_voice: "auto".to_string(),
        }
    }
}

/// Full application on a random port, backed by in-memory stores and scripted doubles
pub struct TestContext {
    pub client: TestClient,
    pub provider: Arc<ScriptedProvider>,
    pub storage: Arc<MemoryStorage>,
    #[allow(dead_code)]
    pub job_store: Arc<InMemoryJobStore>,
    #[allow(dead_code)]
    pub material_store: Arc<InMemoryMaterialStore>,
    pub queue: Arc<TaskQueue>,
    workers: Arc<WorkerPool>,
    worker_handles: Vec<JoinHandle<()>>,
    server: JoinHandle<()>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let provider = Arc::new(ScriptedProvider::new(
            options.provider_configured,
            options.provider_delay,
        ));
        let storage = Arc::new(MemoryStorage::new());
        let job_store = Arc::new(InMemoryJobStore::new());
        let material_store = Arc::new(InMemoryMaterialStore::new());
        let queue = Arc::new(TaskQueue::new());

        let executor = Arc::new(ChunkExecutor::new(
            provider.clone(),
            storage.clone(),
            job_store.clone() as Arc<dyn JobStore>,
            material_store.clone() as Arc<dyn MaterialStore>,
        ));
        let workers = Arc::new(WorkerPool::new(
            queue.clone(),
            executor,
            options.retry_policy.clone(),
            options.worker_concurrency,
        ));

        let settings = GenerationSettings {
            chunker: ChunkerConfig::new(options.max_chunk_chars),
            ..GenerationSettings::default()
        };
        let voices = Arc::new(VoiceResolver::new(options.default_voice.clone()));

        let speech_service = Arc::new(SpeechService::new(
            job_store.clone(),
            provider.clone(),
            storage.clone(),
            queue.clone(),
            voices.clone(),
            settings.clone(),
        ));
        let material_service = Arc::new(MaterialService::new(
            material_store.clone(),
            provider.clone(),
            queue.clone(),
            voices,
            settings,
        ));

        let app = create_router(
            HealthState {
                pool: None,
                provider: provider.clone(),
            },
            Arc::new(SpeechController::new(speech_service)),
            Arc::new(MaterialController::new(material_service)),
            None,
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local addr");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let mut ctx = Self {
            client: TestClient::new(&format!("http://{}", addr)),
            provider,
            storage,
            job_store,
            material_store,
            queue,
            workers,
            worker_handles: Vec::new(),
            server,
        };

        if options.start_workers {
            ctx.start_workers();
        }

        ctx
    }

    pub fn start_workers(&mut self) {
        if self.worker_handles.is_empty() {
            self.worker_handles = self.workers.start();
        }
    }

    /// Poll `GET path` until `done` accepts the JSON body, panicking after a few seconds
    #[allow(dead_code)]
    pub async fn wait_for<F>(&self, path: &str, done: F) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let response = self.client.get(path).await.unwrap();
            if let Some(body) = response.body.as_ref() {
                if done(body) {
                    return body.clone();
                }
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("Timed out waiting on {}: last body {:?}", path, response.body);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Wait for a job to reach one of the terminal statuses
    #[allow(dead_code)]
    pub async fn wait_for_job(&self, job_id: &str) -> serde_json::Value {
        self.wait_for(&format!("/api/speech/jobs/{}", job_id), |body| {
            matches!(
                body.get("status").and_then(|s| s.as_str()),
                Some("completed") | Some("failed") | Some("rate_limited")
            )
        })
        .await
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        for handle in &self.worker_handles {
            handle.abort();
        }
        self.server.abort();
    }
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl Future<Output = Self> + Send {
        TestContext::new()
    }

    fn teardown(self) -> impl Future<Output = ()> + Send {
        async {
            // Workers and server are aborted on drop
        }
    }
}
