//! Session management
//!
//! The encrypted cookie carries the whole session.
//! No server-side session storage needed.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::codec::{CodecError, SessionCodec};
use crate::error::AppError;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Default session lifetime (30 minutes)
pub const DEFAULT_SESSION_TIMEOUT_SECS: i64 = 30 * 60;

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_TIMEOUT_SECS: i64 = 365 * 24 * 60 * 60;

/// User session data
///
/// Serialized as `{"username": ..., "expires": <RFC 3339>}` inside the
/// encrypted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Authenticated username
    pub username: String,
    /// When session expires
    pub expires: DateTime<Utc>,
}

impl Session {
    /// Start a session for `username` at `now`, lasting `timeout`
    ///
    /// # Errors
    /// Fails if the expiry falls outside the representable date range
    pub fn new(
        username: impl Into<String>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let expires = now
            .checked_add_signed(timeout)
            .context("session expiry out of range")?;

        Ok(Self {
            username: username.into(),
            expires,
        })
    }

    /// Check if session is expired at `now`
    ///
    /// A session is still valid at the exact instant it expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Login request body
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Stored credentials for one user, as returned by a credential store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub password: String,
}

/// Serialize and encrypt a session into a cookie value
///
/// Failures here are server-side faults, never the caller's.
pub fn create_session_token(
    session: &Session,
    codec: &dyn SessionCodec,
) -> anyhow::Result<String> {
    let payload = session
        .to_bytes()
        .context("failed to serialize session")?;

    codec
        .encode(&payload)
        .context("failed to encode session token")
}

/// Decrypt and deserialize a cookie value into a session
///
/// Expiry is not checked here; callers compare against their clock.
///
/// # Errors
/// Returns `AppError::BadRequest` if the token does not decode or the
/// payload is not a session
pub fn open_session_token(token: &str, codec: &dyn SessionCodec) -> Result<Session, AppError> {
    let payload = codec
        .decode(token)
        .map_err(|e: CodecError| AppError::BadRequest(e.to_string()))?;

    Session::from_bytes(&payload).map_err(|e| AppError::BadRequest(e.to_string()))
}
