//! Test server harness for E2E testing
//!
//! Provides `TestRegistryServer` for spawning real registry instances in
//! tests. The server runs the production router over an in-memory store.

use rr_service::config::Config;
use rr_service::middleware::principal::{
    PRINCIPAL_AVATAR_HEADER, PRINCIPAL_EMAIL_HEADER, PRINCIPAL_ID_HEADER, PRINCIPAL_NAME_HEADER,
};
use rr_service::models::Principal;
use rr_service::repositories::InMemoryRoomStore;
use rr_service::routes::{self, AppState};
use rr_service::services::{CredentialIssuer, LifecycleCoordinator};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the Room Registry in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestRegistryServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .get(&format!("{}/health", server.url()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRegistryServer {
    addr: SocketAddr,
    store: Arc<InMemoryRoomStore>,
    config: Config,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestRegistryServer {
    /// Spawn a server without a signing key. Credential issuance fails
    /// with a configuration error.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::new()).await
    }

    /// Spawn a server that signs credentials with `signing_key_b64`.
    pub async fn spawn_with_signing_key(signing_key_b64: &str) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::from([
            ("RR_SIGNING_KEY".to_string(), signing_key_b64.to_string()),
            ("RR_SIGNING_KEY_ID".to_string(), "test-key".to_string()),
        ]))
        .await
    }

    /// Spawn a server with extra configuration variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use a fresh in-memory store
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(mut vars: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let issuer = CredentialIssuer::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create credential issuer: {}", e))?;

        let store = Arc::new(InMemoryRoomStore::new());
        let coordinator =
            LifecycleCoordinator::new(store.clone(), issuer, config.default_global_ref.clone());

        let state = Arc::new(AppState { coordinator });

        // Metrics route is left out; the global recorder is process-wide.
        let app = routes::build_routes(state, None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            config,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The store behind the server, for backdating activity in tests.
    pub fn store(&self) -> &Arc<InMemoryRoomStore> {
        &self.store
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A client that sends `principal` in the identity headers.
    pub fn as_principal(&self, principal: &Principal) -> PrincipalClient {
        PrincipalClient {
            base_url: self.url(),
            client: self.client.clone(),
            principal: principal.clone(),
        }
    }
}

impl Drop for TestRegistryServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// HTTP client bound to one principal.
#[derive(Clone)]
pub struct PrincipalClient {
    base_url: String,
    client: reqwest::Client,
    principal: Principal,
}

impl PrincipalClient {
    fn with_identity(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header(PRINCIPAL_ID_HEADER, &self.principal.id)
            .header(PRINCIPAL_NAME_HEADER, &self.principal.name)
            .header(PRINCIPAL_EMAIL_HEADER, &self.principal.email);
        match &self.principal.avatar {
            Some(avatar) => builder.header(PRINCIPAL_AVATAR_HEADER, avatar),
            None => builder,
        }
    }

    /// GET `path` (relative to the server URL).
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_identity(self.client.get(format!("{}{}", self.base_url, path)))
    }

    /// POST `path` (relative to the server URL).
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_identity(self.client.post(format!("{}{}", self.base_url, path)))
    }

    /// The principal this client acts as.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
