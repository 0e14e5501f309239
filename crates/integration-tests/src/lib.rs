//! Integration tests for Cartwise.
//!
//! Each test starts the storefront router in-process on an ephemeral port,
//! backed by [`MemoryStore`] and a mock upstream that plays both the
//! recommendation service (`POST /run`) and the monitoring relay
//! (`POST /notify`). Requests go over real HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartwise-integration-tests
//! ```
//!
//! Identity normally comes from a fronting auth layer; here the
//! `x-test-user` header stands in for it.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Response},
    routing::post,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

use cartwise_core::{Price, ProductId, UserId};
use cartwise_storefront::config::{
    LogFormat, McoConfig, MonitoringConfig, StorefrontConfig, SuggestionConfig,
};
use cartwise_storefront::db::{MemoryStore, Stores};
use cartwise_storefront::models::{CurrentUser, Product};
use cartwise_storefront::services::{BackgroundQueue, spawn_workers};
use cartwise_storefront::state::AppState;

/// Header the test identity layer reads the caller's user id from.
pub const TEST_USER_HEADER: &str = "x-test-user";

/// Title of the single suggestion the mock recommendation service returns.
pub const MOCK_SUGGESTION_TITLE: &str = "Pasta night";

/// Outbound recommendation timeout of the storefront under test.
pub const MCO_TIMEOUT: Duration = Duration::from_secs(1);

/// Which upstream services the storefront under test can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Recommendation and monitoring both point at the mock.
    Mock,
    /// Neither is configured.
    None,
}

/// A running storefront plus its backing store and mock upstream.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub upstream: MockUpstream,
    cancel: CancellationToken,
}

impl TestContext {
    /// Start a storefront whose upstreams point at a fresh mock.
    pub async fn start() -> Self {
        Self::with_upstream(Upstream::Mock).await
    }

    /// Start a storefront with the given upstream wiring.
    pub async fn with_upstream(upstream: Upstream) -> Self {
        let mock = MockUpstream::start().await;
        let upstream_url = (upstream == Upstream::Mock).then(|| mock.url.clone());

        let config = test_config(upstream_url);
        let store = Arc::new(MemoryStore::with_products(catalog()));

        let (queue, receiver) = BackgroundQueue::channel(config.suggestions.queue_capacity);
        let state = AppState::new(config.clone(), Stores::memory(&store), queue).unwrap();

        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        spawn_workers(
            receiver,
            Arc::new(state.job_runner()),
            config.suggestions.workers,
            &tracker,
            &cancel,
        );
        tracker.close();

        let router = cartwise_storefront::app(state).layer(from_fn(test_identity));
        let addr = serve(router).await;

        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
            store,
            upstream: mock,
            cancel,
        }
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET` as `user`.
    pub async fn get(&self, user: i32, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header(TEST_USER_HEADER, user.to_string())
            .send()
            .await
            .unwrap()
    }

    /// `POST` a JSON body as `user`.
    pub async fn post(&self, user: i32, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header(TEST_USER_HEADER, user.to_string())
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// `DELETE` with an optional JSON body as `user`.
    pub async fn delete(&self, user: i32, path: &str, body: Option<&Value>) -> reqwest::Response {
        let mut request = self
            .client
            .delete(self.url(path))
            .header(TEST_USER_HEADER, user.to_string());
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.unwrap()
    }

    /// `POST /cart/add` as `user`.
    pub async fn add_to_cart(&self, user: i32, product_id: i32, quantity: i64) -> reqwest::Response {
        self.post(
            user,
            "/cart/add",
            &json!({ "product_id": product_id, "quantity": quantity }),
        )
        .await
    }

    /// Poll `GET /suggestions/stored` until it returns a non-empty list.
    pub async fn wait_for_stored_suggestions(&self, user: i32) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let body = body_json(self.get(user, "/suggestions/stored").await).await;
            let list = body["suggestions"].as_array().cloned().unwrap_or_default();
            if !list.is_empty() {
                return list;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no suggestions stored for user {user}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What the mock recommendation service answers on `/run`.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    /// A 200 with `body` and no delay.
    #[must_use]
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    /// An error status with a short JSON body.
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::body(json!({ "detail": "agent crashed" }).to_string())
        }
    }

    /// This reply, sent only after `delay`.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for MockReply {
    /// One suggestion in the agent's event-list shape, with the payload fenced.
    fn default() -> Self {
        let payload = json!([{
            "dish_name": MOCK_SUGGESTION_TITLE,
            "extra_items_required": ["Basil", "Parmesan"],
            "reason": "Goes with the tomatoes in your cart"
        }]);
        let text = format!("```json\n{payload}\n```");

        Self::body(
            json!([{
                "author": "recipe_agent",
                "content": { "role": "model", "parts": [{ "text": text }] }
            }])
            .to_string(),
        )
    }
}

/// Records what the storefront sent upstream.
#[derive(Clone)]
pub struct MockUpstream {
    pub url: Url,
    state: MockState,
}

#[derive(Clone, Default)]
struct MockState {
    runs: Arc<Mutex<Vec<Value>>>,
    notifications: Arc<Mutex<Vec<Value>>>,
    reply: Arc<Mutex<MockReply>>,
}

impl MockUpstream {
    async fn start() -> Self {
        let state = MockState::default();

        let router = Router::new()
            .route("/run", post(mock_run))
            .route("/notify", post(mock_notify))
            .with_state(state.clone());
        let addr = serve(router).await;

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            state,
        }
    }

    /// Answer every later `/run` with `reply`.
    pub fn reply_with(&self, reply: MockReply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    /// Request bodies received on `/run`.
    #[must_use]
    pub fn runs(&self) -> Vec<Value> {
        self.state.runs.lock().unwrap().clone()
    }

    /// Cart snapshots received on `/notify`.
    #[must_use]
    pub fn notifications(&self) -> Vec<Value> {
        self.state.notifications.lock().unwrap().clone()
    }

    /// Poll until at least `count` requests have arrived on `/run`.
    pub async fn wait_for_runs(&self, count: usize) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let received = self.runs();
            if received.len() >= count {
                return received;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {count} runs, got {}",
                received.len()
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Poll until at least `count` notifications have arrived.
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let received = self.notifications();
            if received.len() >= count {
                return received;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {count} notifications, got {}",
                received.len()
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

async fn mock_run(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.runs.lock().unwrap().push(body);

    let reply = state.reply.lock().unwrap().clone();
    tokio::time::sleep(reply.delay).await;
    (
        reply.status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response()
}

async fn mock_notify(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.notifications.lock().unwrap().push(body);
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Read a response body as JSON.
pub async fn body_json(response: reqwest::Response) -> Value {
    response.json().await.unwrap()
}

/// Six catalog products with ids 1 through 6.
#[must_use]
pub fn catalog() -> Vec<Product> {
    ["Tomatoes", "Spaghetti", "Garlic", "Olive oil", "Onion", "Rice"]
        .into_iter()
        .zip(1..)
        .map(|(name, id)| Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::new(Decimal::new(199, 2)).unwrap(),
            tags: String::new(),
        })
        .collect()
}

fn test_config(upstream_url: Option<Url>) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: Url::parse("http://localhost").unwrap(),
        mco: McoConfig {
            base_url: upstream_url.clone(),
            timeout: MCO_TIMEOUT,
            ..McoConfig::default()
        },
        monitoring: MonitoringConfig {
            base_url: upstream_url,
            ..MonitoringConfig::default()
        },
        suggestions: SuggestionConfig::default(),
        shutdown_grace: Duration::from_secs(1),
        log_format: LogFormat::Text,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

async fn test_identity(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(TEST_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i32>().ok());
    if let Some(id) = user {
        request.extensions_mut().insert(CurrentUser {
            id: UserId::new(id),
        });
    }
    next.run(request).await
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
