//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use sessiongate::auth::{AesGcmSessionCodec, Clock};
use sessiongate::{AppState, config};
use tokio::net::TcpListener;

pub const TEST_KEY: [u8; 32] = [42; 32];
pub const TEST_USERNAME: &str = "thedude";
pub const TEST_PASSWORD: &str = "whiterussian";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance using the wall clock
    pub async fn new() -> Self {
        Self::start(None).await
    }

    /// Create a new test server instance with a custom clock
    pub async fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::start(Some(clock)).await
    }

    async fn start(clock: Option<Arc<dyn Clock>>) -> Self {
        let config = test_config();

        let mut state = AppState::new(&config).unwrap();
        if let Some(clock) = clock {
            state = state.with_clock(clock);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = sessiongate::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Codec sharing the server's key
    pub fn codec(&self) -> AesGcmSessionCodec {
        AesGcmSessionCodec::new(&TEST_KEY)
    }

    /// Log in with the test user and return the session cookie value
    pub async fn login(&self) -> String {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&serde_json::json!({
                "username": TEST_USERNAME,
                "password": TEST_PASSWORD,
            }))
            .send()
            .await
            .expect("login request succeeds");
        assert_eq!(response.status(), 200);

        session_cookie_value(&response).expect("session cookie issued")
    }
}

/// Extract the `session` value from a response's Set-Cookie header
pub fn session_cookie_value(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("session="))
        .map(|v| v.split(';').next().unwrap_or("").to_string())
}

fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
        },
        auth: config::AuthConfig {
            session_key: BASE64_STANDARD.encode(TEST_KEY),
            session_timeout: 1800,
            secure_cookies: false,
            max_body_bytes: 1024,
        },
        users: HashMap::from([(TEST_USERNAME.to_string(), TEST_PASSWORD.to_string())]),
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}
