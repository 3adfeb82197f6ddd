//! Session authentication
//!
//! Handles:
//! - Password login issuing an encrypted session cookie, and pluggable
//!   `Authenticator`s for other login schemes
//! - Session cookie verification middleware
//! - Authorization gate middleware

pub mod authorize;
pub mod clock;
pub mod codec;
mod login;
mod middleware;
pub mod session;
pub mod store;

use chrono::Duration;

pub use authorize::{
    AuthorizeError, Authorizer, CurrentPrincipal, Principal, SessionAuthorizer, authorize,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::{AesGcmSessionCodec, CodecError, SessionCodec};
pub use login::{
    AuthenticateError, Authenticator, PasswordAuthenticator, authenticate, login, login_router,
    logout,
};
pub use middleware::{CurrentSession, require_session, verify_session};
pub use session::{Credentials, SESSION_COOKIE, Session, StoredUser};
pub use store::{CredentialStore, StaticCredentialStore, StoreError};

/// Runtime knobs for issuing session cookies
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Lifetime of a freshly issued session
    pub timeout: Duration,
    /// Set the `Secure` attribute on the session cookie
    pub secure_cookies: bool,
    /// Maximum accepted login body size in bytes
    pub max_body_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::seconds(session::DEFAULT_SESSION_TIMEOUT_SECS),
            secure_cookies: false,
            max_body_bytes: 16 * 1024,
        }
    }
}
