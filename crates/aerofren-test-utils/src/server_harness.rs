//! Test server harness for E2E testing
//!
//! Provides `TestApiServer` for spawning real AEROFREN API instances in tests.
//! The identity authority is a wiremock JWKS endpoint serving a deterministic
//! test key, and the document store is in memory.

use crate::crypto_fixtures::TestKeypair;
use crate::token_builders::TestTokenBuilder;
use aerofren_api::auth::verifier_from_config;
use aerofren_api::config::Config;
use aerofren_api::observability::metrics::init_metrics_recorder;
use aerofren_api::rate_limit::{Clock, RateLimiter};
use aerofren_api::repositories::{DocumentStore, InMemoryDocumentStore};
use aerofren_api::routes::{self, AppState};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked identity authority serves its key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Global metrics handle for test servers
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Prometheus handle shared by every test server in the process.
///
/// Only one global recorder can be installed; later servers reuse it or
/// fall back to a detached recorder.
pub fn get_test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Builder for [`TestApiServer`].
pub struct TestApiServerBuilder {
    vars: HashMap<String, String>,
    with_store: bool,
    with_auth: bool,
    clock: Option<Arc<dyn Clock>>,
}

impl TestApiServerBuilder {
    fn new() -> Self {
        Self {
            vars: HashMap::from([
                ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
                ("API_DRAIN_SECONDS".to_string(), "0".to_string()),
            ]),
            with_store: true,
            with_auth: true,
            clock: None,
        }
    }

    /// Set a configuration variable, e.g. `RATE_LIMIT_CONTACT_MAX`.
    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    /// Set the admin allow-list (`ADMIN_EMAILS`).
    pub fn admin_emails(self, emails: &str) -> Self {
        self.var("ADMIN_EMAILS", emails)
    }

    /// Leave the document store unconfigured.
    pub fn without_store(mut self) -> Self {
        self.with_store = false;
        self
    }

    /// Leave the identity authority unconfigured.
    pub fn without_auth(mut self) -> Self {
        self.with_auth = false;
        self
    }

    /// Drive the rate limiter from `clock` instead of the monotonic clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Spawn the server on a random local port.
    ///
    /// # Returns
    /// * `Ok(TestApiServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If configuration or binding fails
    pub async fn spawn(mut self) -> Result<TestApiServer, anyhow::Error> {
        let keypair = TestKeypair::new(1, "test-key-01")
            .map_err(|e| anyhow::anyhow!("Failed to create test keypair: {}", e))?;

        let mock_server = if self.with_auth {
            let mock_server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(JWKS_PATH))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({ "keys": [keypair.jwk_json()] })),
                )
                .mount(&mock_server)
                .await;
            self.vars.insert(
                "AUTH_JWKS_URL".to_string(),
                format!("{}{}", mock_server.uri(), JWKS_PATH),
            );
            Some(mock_server)
        } else {
            None
        };

        let config = Config::from_vars(&self.vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let store = self
            .with_store
            .then(|| Arc::new(InMemoryDocumentStore::new()));
        let limiter = Arc::new(match self.clock {
            Some(clock) => RateLimiter::with_clock(clock),
            None => RateLimiter::new(),
        });

        let state = Arc::new(AppState::new(
            config.clone(),
            store
                .clone()
                .map(|store| store as Arc<dyn DocumentStore>),
            verifier_from_config(&config),
            Arc::clone(&limiter),
        ));

        // Build routes using the service's real route builder
        let app = routes::build_routes(state, get_test_metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            // Use into_make_service_with_connect_info to support SocketAddr extraction
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestApiServer {
            addr,
            config,
            store,
            limiter,
            keypair,
            mock_server,
            _handle: handle,
        })
    }
}

/// Test harness for spawning the AEROFREN API in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestApiServer::builder().spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestApiServer {
    addr: SocketAddr,
    config: Config,
    store: Option<Arc<InMemoryDocumentStore>>,
    limiter: Arc<RateLimiter>,
    keypair: TestKeypair,
    mock_server: Option<MockServer>,
    _handle: JoinHandle<()>,
}

impl TestApiServer {
    pub fn builder() -> TestApiServerBuilder {
        TestApiServerBuilder::new()
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The in-memory document store.
    ///
    /// # Panics
    ///
    /// If the server was built `without_store`.
    pub fn store(&self) -> &Arc<InMemoryDocumentStore> {
        self.store
            .as_ref()
            .expect("test server was spawned without a store")
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Key the mocked identity authority publishes.
    pub fn keypair(&self) -> &TestKeypair {
        &self.keypair
    }

    /// The mocked JWKS server, if auth is configured.
    pub fn mock_server(&self) -> Option<&MockServer> {
        self.mock_server.as_ref()
    }

    /// Sign the claims from `builder` with the published key.
    pub fn sign(&self, builder: TestTokenBuilder) -> String {
        self.keypair.sign(&builder.build())
    }
}

impl Drop for TestApiServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends.
        self._handle.abort();
    }
}
