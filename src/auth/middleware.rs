//! Authentication middleware
//!
//! Protects routes that require a session cookie.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, Session, open_session_token};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::SESSION_CHECKS_TOTAL;

/// Verify the session cookie of a request
///
/// - no `session` cookie: `Unauthorized`
/// - cookie does not decode, or payload is not a session: `BadRequest`
/// - session expired according to the state's clock: `Unauthorized`
pub fn verify_session(jar: &CookieJar, state: &AppState) -> Result<Session, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        SESSION_CHECKS_TOTAL.with_label_values(&["missing"]).inc();
        return Err(AppError::Unauthorized);
    };

    let session = open_session_token(cookie.value(), state.codec.as_ref()).inspect_err(|_| {
        SESSION_CHECKS_TOTAL.with_label_values(&["invalid"]).inc();
    })?;

    let now = state.clock.now();
    if session.is_expired_at(now) {
        tracing::debug!(
            username = %session.username,
            expires = %session.expires,
            "Rejected expired session"
        );
        SESSION_CHECKS_TOTAL.with_label_values(&["expired"]).inc();
        return Err(AppError::Unauthorized);
    }

    SESSION_CHECKS_TOTAL.with_label_values(&["accepted"]).inc();
    Ok(session)
}

/// Middleware to require a valid session
///
/// Adds the `Session` to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/api/...", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_session));
/// ```
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let jar = CookieJar::from_headers(request.headers());
    let session = verify_session(&jar, &state)?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Extractor for the session attached by `require_session`
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentSession(session): CurrentSession) -> impl IntoResponse {
///     format!("Hello, {}", session.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or(AppError::Unauthorized)
    }
}
