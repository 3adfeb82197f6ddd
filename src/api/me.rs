//! Routes behind session authentication
//!
//! Every route here passes `require_session` and then `authorize` before
//! reaching its handler.

use std::sync::Arc;

use axum::{Json, Router, middleware, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::AppState;
use crate::auth::{Authorizer, CurrentPrincipal, SessionAuthorizer, authorize, require_session};

/// Response body of `GET /api/me`
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /api/me
///
/// Returns the identity the request was authorized as.
async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    Json(MeResponse {
        username: principal.name().to_string(),
        expires: principal.expires(),
    })
}

/// Create the protected router
///
/// Routes:
/// - GET /me - Current identity
pub fn protected_router(state: AppState) -> Router<AppState> {
    let authorizer: Arc<dyn Authorizer> = Arc::new(SessionAuthorizer::new(state.clock.clone()));

    // route_layer runs the last-added layer first: session, then authorize
    Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(authorizer, authorize))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}
