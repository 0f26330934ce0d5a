// ABOUTME: Shared fixtures for integration tests
// ABOUTME: Scripted completion provider, recording trace sink, and app state assembly

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};

use chat_relay::auth::{Claims, JwtIdentityResolver};
use chat_relay::config::PipelineConfig;
use chat_relay::errors::{AppError, AppResult};
use chat_relay::llm::{ChatStream, CompletionRequest, LlmProvider, StreamChunk};
use chat_relay::server::AppState;
use chat_relay::store::MemoryStore;
use chat_relay::telemetry::{TraceEvent, TraceSink, Tracer};

pub const TEST_JWT_SECRET: &[u8] = b"integration-test-secret";
pub const TEST_MODEL: &str = "test-model";

/// Mint a valid session token for the given user
pub fn mint_token(sub: &str) -> String {
    encode(
        &Header::default(),
        &Claims {
            sub: sub.to_owned(),
            exp: chrono::Utc::now().timestamp() + 3600,
        },
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("Failed to mint test token")
}

/// One step of a scripted provider stream
#[derive(Clone)]
pub enum ScriptStep {
    /// Yield a content delta
    Delta(&'static str),
    /// Fail the stream with a provider error
    Fail(&'static str),
}

/// Scripted completion provider
///
/// Replays the configured steps as a stream on every call, and records how
/// it was invoked for assertions.
pub struct MockProvider {
    script: Vec<ScriptStep>,
    fail_open: bool,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    pub fn streaming(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            fail_open: false,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Provider that fails before the first chunk
    pub fn failing_open() -> Self {
        Self {
            script: Vec::new(),
            fail_open: true,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn default_model(&self) -> &str {
        TEST_MODEL
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<ChatStream, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().expect("lock poisoned") = Some(request.clone());

        if self.fail_open {
            return Err(AppError::external_service("mock", "provider down"));
        }

        let items: Vec<Result<StreamChunk, AppError>> = self
            .script
            .iter()
            .map(|step| match step {
                ScriptStep::Delta(delta) => Ok(StreamChunk {
                    delta: (*delta).to_owned(),
                    is_final: false,
                    finish_reason: None,
                }),
                ScriptStep::Fail(message) => Err(AppError::external_service("mock", *message)),
            })
            .collect();

        Ok(Box::pin(futures_util::stream::iter(items)))
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

/// Trace sink recording every event in memory
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().expect("lock poisoned").clone()
    }

    pub fn events_named(&self, name: &str) -> Vec<TraceEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.message == name)
            .collect()
    }
}

#[async_trait]
impl TraceSink for RecordingSink {
    async fn send(&self, event: TraceEvent) -> AppResult<()> {
        self.events.lock().expect("lock poisoned").push(event);
        Ok(())
    }
}

/// Assembled test fixture
pub struct TestApp {
    pub state: Arc<AppState>,
    pub provider: Arc<MockProvider>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn router(&self) -> axum::Router {
        chat_relay::server::router(Arc::clone(&self.state))
    }
}

/// Build an app state over a memory store and the given provider
pub fn test_app(provider: MockProvider) -> TestApp {
    test_app_with_prompt(provider, None)
}

pub fn test_app_with_prompt(
    provider: MockProvider,
    system_prompt: Option<String>,
) -> TestApp {
    let provider = Arc::new(provider);
    let sink = Arc::new(RecordingSink::default());
    let store = Arc::new(MemoryStore::new());

    let state = Arc::new(AppState {
        provider: Arc::clone(&provider) as Arc<dyn LlmProvider>,
        identity: Arc::new(JwtIdentityResolver::new(TEST_JWT_SECRET)),
        tracer: Tracer::new(Arc::clone(&sink) as Arc<dyn TraceSink>),
        store: Arc::clone(&store) as Arc<dyn chat_relay::store::ConversationStore>,
        pipeline: PipelineConfig {
            model: TEST_MODEL.to_owned(),
            temperature: 0.0,
            system_prompt,
        },
    });

    TestApp {
        state,
        provider,
        sink,
        store,
    }
}

/// Poll until `condition` holds or the timeout expires
///
/// Completion side effects run on detached tasks after the response body
/// closes, so assertions on them must wait for quiescence.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Condition not reached within timeout"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
