//! Authorization middleware
//!
//! A decision gate in front of a handler. The decision itself is made by an
//! injected `Authorizer`; this module only maps its verdict to a response
//! or forwards the request with the resulting `Principal` attached.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::clock::Clock;
use super::session::Session;
use crate::error::AppError;

/// Identity a request was authorized as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A user holding a verified session cookie
    Session(Session),
    /// A non-interactive caller identified by name
    ///
    /// Never produced by `SessionAuthorizer`; custom `Authorizer`s yield it
    /// for callers that authenticate without a session, such as jobs
    /// presenting a service credential. Carries no expiry.
    Service { name: String },
}

impl Principal {
    /// Name of the authorized identity
    pub fn name(&self) -> &str {
        match self {
            Principal::Session(session) => &session.username,
            Principal::Service { name } => name,
        }
    }

    /// Expiry of the underlying credential, if it has one
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        match self {
            Principal::Session(session) => Some(session.expires),
            Principal::Service { .. } => None,
        }
    }
}

/// Authorization verdicts other than success
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("malformed authorization input")]
    BadRequest,

    #[error("not authorized")]
    Unauthorized,

    #[error("credential expired")]
    Expired,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AuthorizeError> for AppError {
    fn from(err: AuthorizeError) -> Self {
        match err {
            AuthorizeError::BadRequest => {
                AppError::BadRequest("malformed authorization input".to_string())
            }
            AuthorizeError::Unauthorized => AppError::Unauthorized,
            AuthorizeError::Expired => AppError::Expired,
            AuthorizeError::Other(error) => AppError::Internal(error),
        }
    }
}

/// Decides whether a request may proceed
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, parts: &Parts) -> Result<Principal, AuthorizeError>;
}

/// Authorizes requests carrying a session attached by `require_session`
///
/// The session is re-checked against the clock, so a session that lapsed
/// between authentication and authorization is reported as `Expired`.
pub struct SessionAuthorizer {
    clock: Arc<dyn Clock>,
}

impl SessionAuthorizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Authorizer for SessionAuthorizer {
    async fn authorize(&self, parts: &Parts) -> Result<Principal, AuthorizeError> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthorizeError::Unauthorized)?;

        if session.is_expired_at(self.clock.now()) {
            return Err(AuthorizeError::Expired);
        }

        Ok(Principal::Session(session))
    }
}

/// Middleware gating a route on an `Authorizer`
///
/// Adds the `Principal` to request extensions on success.
///
/// # Usage
/// ```ignore
/// let authorizer: Arc<dyn Authorizer> = Arc::new(SessionAuthorizer::new(clock));
/// let routes = Router::new()
///     .route("/api/...", ...)
///     .route_layer(middleware::from_fn_with_state(authorizer, authorize));
/// ```
pub async fn authorize(
    State(authorizer): State<Arc<dyn Authorizer>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let principal = authorizer.authorize(&parts).await.inspect_err(|error| {
        tracing::debug!(%error, uri = %parts.uri, "Authorization refused");
    })?;
    parts.extensions.insert(principal);

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Extractor for the principal attached by `authorize`
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(AppError::Unauthorized)
    }
}
