//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::Deserialize;

use crate::auth::SessionSettings;
use crate::auth::codec::SESSION_KEY_BYTES;
use crate::auth::session::{DEFAULT_SESSION_TIMEOUT_SECS, MAX_SESSION_TIMEOUT_SECS};
use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    /// Username to password table backing the static credential store
    #[serde(default)]
    pub users: HashMap<String, String>,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Session authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base64-encoded 32-byte session encryption key
    pub session_key: String,
    /// Session lifetime in seconds (default: 1800 = 30 minutes, at most one year)
    pub session_timeout: i64,
    /// Mark the session cookie `Secure` (default: false)
    pub secure_cookies: bool,
    /// Maximum login request body size (default: 16384)
    pub max_body_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Whether events are written as JSON lines
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("sessiongate={},tower_http=debug", self.level)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SESSIONGATE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("auth.session_timeout", DEFAULT_SESSION_TIMEOUT_SECS)?
            .set_default("auth.secure_cookies", false)?
            .set_default("auth.max_body_bytes", 16 * 1024)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SESSIONGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Decode the configured session key
    pub fn session_key(&self) -> Result<[u8; SESSION_KEY_BYTES], AppError> {
        let key = BASE64_STANDARD
            .decode(self.auth.session_key.trim())
            .map_err(|_| {
                AppError::Config("auth.session_key must be valid base64-encoded bytes".to_string())
            })?;

        key.try_into().map_err(|_| {
            AppError::Config(format!(
                "auth.session_key must decode to {} bytes",
                SESSION_KEY_BYTES
            ))
        })
    }

    /// Session cookie settings derived from `auth`
    ///
    /// # Errors
    /// Returns `AppError::Config` if the timeout is out of range
    pub fn session_settings(&self) -> Result<SessionSettings, AppError> {
        self.validate_session_timeout()?;

        let timeout = chrono::Duration::try_seconds(self.auth.session_timeout).ok_or_else(|| {
            AppError::Config("auth.session_timeout is out of range".to_string())
        })?;

        Ok(SessionSettings {
            timeout,
            secure_cookies: self.auth.secure_cookies,
            max_body_bytes: self.auth.max_body_bytes,
        })
    }

    /// Log settings that are valid but probably unintended
    ///
    /// Call after the tracing subscriber is installed.
    pub fn warn_on_weak_settings(&self) {
        if !self.auth.secure_cookies {
            tracing::warn!("Session cookies are issued without the Secure attribute");
        }

        if self.users.is_empty() {
            tracing::warn!("No users configured; every login will be rejected");
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        self.session_key()?;
        self.validate_session_timeout()?;

        if self.auth.max_body_bytes == 0 {
            return Err(AppError::Config(
                "auth.max_body_bytes must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }

        Ok(())
    }

    fn validate_session_timeout(&self) -> Result<(), AppError> {
        if self.auth.session_timeout <= 0 {
            return Err(AppError::Config(
                "auth.session_timeout must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_timeout > MAX_SESSION_TIMEOUT_SECS {
            return Err(AppError::Config(format!(
                "auth.session_timeout must be at most {} seconds",
                MAX_SESSION_TIMEOUT_SECS
            )));
        }

        Ok(())
    }
}
