//! sessiongate - Cookie-based session authentication for HTTP services
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - POST /login, POST /logout                                │
//! │  - Protected routes under /api                              │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Auth Layer                              │
//! │  - require_session: cookie → verified Session               │
//! │  - authorize: Authorizer → Principal                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Session Codec                             │
//! │  - AES-256-GCM sealed JSON session in the cookie            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers for protected and operational routes
//! - `auth`: Login, session codec and middleware
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;

use auth::{Clock, CredentialStore, SessionCodec, SessionSettings};

/// Application state shared across all handlers
///
/// Everything in here is read-only once the server is running.
#[derive(Clone)]
pub struct AppState {
    /// Session cookie settings
    pub settings: SessionSettings,

    /// Session token codec holding the server key
    pub codec: Arc<dyn SessionCodec>,

    /// Credential lookup for logins
    pub store: Arc<dyn CredentialStore>,

    /// Time source for issuing and checking sessions
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Initialize application state from configuration
    ///
    /// # Errors
    /// Returns error if the session key or timeout is invalid
    pub fn new(config: &config::AppConfig) -> Result<Self, error::AppError> {
        let key = config.session_key()?;
        let settings = config.session_settings()?;
        let store = auth::StaticCredentialStore::new(config.users.clone());

        tracing::info!(users = store.len(), "Credential store loaded");

        Ok(Self {
            settings,
            codec: Arc::new(auth::AesGcmSessionCodec::new(&key)),
            store: Arc::new(store),
            clock: Arc::new(auth::SystemClock),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use axum::extract::DefaultBodyLimit;
    use tower_http::trace::TraceLayer;

    let body_limit = state.settings.max_body_bytes;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::login_router())
        .nest("/api", api::protected_router(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
