//! Password login and logout
//!
//! Routes:
//! - POST /login - Verify credentials and issue the session cookie
//! - POST /logout - Clear the session cookie
//!
//! `/login` runs the configured `PasswordAuthenticator`. Other login schemes
//! plug in through the `Authenticator` trait and the `authenticate` handler,
//! which share the same method check and status mapping.

use std::sync::Arc;

use axum::{
    Router, async_trait,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{any, post},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use thiserror::Error;

use super::SessionSettings;
use super::clock::Clock;
use super::codec::SessionCodec;
use super::session::{Credentials, SESSION_COOKIE, Session, create_session_token};
use super::store::{CredentialStore, passwords_match};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::LOGIN_ATTEMPTS_TOTAL;

/// Login verdicts other than success
#[derive(Debug, Error)]
pub enum AuthenticateError {
    #[error("malformed login request: {0}")]
    BadRequest(String),

    #[error("credentials rejected")]
    Unauthorized,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AuthenticateError> for AppError {
    fn from(err: AuthenticateError) -> Self {
        match err {
            AuthenticateError::BadRequest(detail) => AppError::BadRequest(detail),
            AuthenticateError::Unauthorized => AppError::Unauthorized,
            AuthenticateError::Other(error) => AppError::Internal(error),
        }
    }
}

/// Turns a login request body into a session cookie
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, body: Bytes) -> Result<Cookie<'static>, AuthenticateError>;
}

/// Username and password login against a `CredentialStore`
pub struct PasswordAuthenticator {
    settings: SessionSettings,
    store: Arc<dyn CredentialStore>,
    codec: Arc<dyn SessionCodec>,
    clock: Arc<dyn Clock>,
}

impl PasswordAuthenticator {
    pub fn new(state: &AppState) -> Self {
        Self {
            settings: state.settings,
            store: state.store.clone(),
            codec: state.codec.clone(),
            clock: state.clock.clone(),
        }
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn authenticate(&self, body: Bytes) -> Result<Cookie<'static>, AuthenticateError> {
        let credentials: Credentials = serde_json::from_slice(&body).map_err(|e| {
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["malformed"]).inc();
            AuthenticateError::BadRequest(e.to_string())
        })?;

        // Unknown users and store failures are indistinguishable from a bad password
        let user = match self.store.user(&credentials.username).await {
            Ok(user) => user,
            Err(error) => {
                tracing::info!(
                    username = %credentials.username,
                    reason = %error,
                    "Login rejected"
                );
                LOGIN_ATTEMPTS_TOTAL.with_label_values(&["rejected"]).inc();
                return Err(AuthenticateError::Unauthorized);
            }
        };

        if !passwords_match(&user.password, &credentials.password) {
            tracing::info!(username = %credentials.username, "Login rejected: wrong password");
            LOGIN_ATTEMPTS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(AuthenticateError::Unauthorized);
        }

        let session = Session::new(
            credentials.username,
            self.clock.now(),
            self.settings.timeout,
        )?;
        let token = create_session_token(&session, self.codec.as_ref())?;

        tracing::info!(
            username = %session.username,
            expires = %session.expires,
            "Session issued"
        );
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["accepted"]).inc();

        Ok(build_session_cookie(token, &self.settings))
    }
}

/// Create login router
pub fn login_router() -> Router<AppState> {
    Router::new()
        .route("/login", any(login))
        .route("/logout", post(logout))
}

/// POST /login
///
/// # Replies
/// - 405 if the method is not POST
/// - 413 if the body exceeds the configured limit
/// - 400 if the body is not a JSON credentials object
/// - 401 if the credentials could not be authenticated
/// - 500 if the session could not be encoded
/// - 200 with a `session` cookie otherwise
pub async fn login(
    State(state): State<AppState>,
    method: Method,
    jar: CookieJar,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    authenticate_with(&PasswordAuthenticator::new(&state), method, jar, body).await
}

/// Login handler for a custom `Authenticator`
///
/// Same replies as `login`: `BadRequest` → 400, `Unauthorized` → 401,
/// anything else → 500.
///
/// # Usage
/// ```ignore
/// let authenticator: Arc<dyn Authenticator> = Arc::new(MyAuthenticator::new());
/// let routes = Router::new()
///     .route("/login", any(authenticate))
///     .with_state(authenticator);
/// ```
pub async fn authenticate(
    State(authenticator): State<Arc<dyn Authenticator>>,
    method: Method,
    jar: CookieJar,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    authenticate_with(authenticator.as_ref(), method, jar, body).await
}

async fn authenticate_with(
    authenticator: &dyn Authenticator,
    method: Method,
    jar: CookieJar,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, CookieJar), AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let body = body.map_err(body_rejection)?;
    let cookie = authenticator.authenticate(body).await?;

    Ok((StatusCode::OK, jar.add(cookie)))
}

fn body_rejection(rejection: BytesRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(rejection.body_text())
    }
}

/// POST /logout
///
/// Asks the client to drop its session cookie. The token itself stays
/// valid until it expires.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        StatusCode::OK,
        jar.add(clear_session_cookie(state.settings.secure_cookies)),
    )
}

fn build_session_cookie(token: String, settings: &SessionSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(settings.timeout.num_seconds()))
        .http_only(true)
        .secure(settings.secure_cookies)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::extract::DefaultBodyLimit;
    use axum::http::{Request, header};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::SessionSettings;
    use crate::auth::clock::FixedClock;
    use crate::auth::codec::{AesGcmSessionCodec, CodecError, MockSessionCodec, SessionCodec};
    use crate::auth::session::StoredUser;
    use crate::auth::store::{MockCredentialStore, StoreError};

    const CREDENTIALS: &str = r#"{"username": "thedude", "password": "whiterussian"}"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 2, 7, 0, 0, 0).unwrap()
    }

    fn state(store: MockCredentialStore, codec: Arc<dyn SessionCodec>) -> AppState {
        AppState {
            settings: SessionSettings::default(),
            codec,
            store: Arc::new(store),
            clock: Arc::new(FixedClock(now())),
        }
    }

    fn store_returning(result: fn() -> Result<StoredUser, StoreError>) -> MockCredentialStore {
        let mut store = MockCredentialStore::new();
        store.expect_user().returning(move |_| result());
        store
    }

    fn known_user() -> Result<StoredUser, StoreError> {
        Ok(StoredUser {
            password: "whiterussian".to_string(),
        })
    }

    async fn send(state: AppState, method: Method, body: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri("/login")
            .body(Body::from(body.to_string()))
            .unwrap();

        login_router()
            .with_state(state)
            .oneshot(request)
            .await
            .unwrap()
    }

    fn unused_codec() -> Arc<dyn SessionCodec> {
        Arc::new(MockSessionCodec::new())
    }

    #[tokio::test]
    async fn get_is_method_not_allowed() {
        let response = send(
            state(MockCredentialStore::new(), unused_codec()),
            Method::GET,
            "",
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn truncated_json_is_bad_request() {
        let response = send(
            state(MockCredentialStore::new(), unused_codec()),
            Method::POST,
            r#"{"key": "value""#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn garbage_body_is_bad_request() {
        let response = send(
            state(MockCredentialStore::new(), unused_codec()),
            Method::POST,
            "{...",
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_field_types_are_bad_request() {
        let response = send(
            state(MockCredentialStore::new(), unused_codec()),
            Method::POST,
            r#"{"username": 42, "password": true}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized() {
        let store = store_returning(|| Err(StoreError::NotFound));
        let response = send(state(store, unused_codec()), Method::POST, CREDENTIALS).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_failure_is_unauthorized() {
        let store = store_returning(|| Err(StoreError::Backend("store error".to_string())));
        let response = send(state(store, unused_codec()), Method::POST, CREDENTIALS).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let store = store_returning(|| {
            Ok(StoredUser {
                password: "otherpassword".to_string(),
            })
        });
        let response = send(state(store, unused_codec()), Method::POST, CREDENTIALS).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn encoder_failure_is_internal_error() {
        let mut codec = MockSessionCodec::new();
        codec.expect_encode().returning(|_| Err(CodecError::Encode));

        let response = send(
            state(store_returning(known_user), Arc::new(codec)),
            Method::POST,
            CREDENTIALS,
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn valid_credentials_issue_session_cookie() {
        let codec = Arc::new(AesGcmSessionCodec::new(&[1_u8; 32]));
        let response = send(
            state(store_returning(known_user), codec.clone()),
            Method::POST,
            CREDENTIALS,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie header");
        let cookie = Cookie::parse(set_cookie.to_string()).unwrap();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(30 * 60)));
        assert_eq!(cookie.http_only(), Some(true));

        let session =
            crate::auth::session::open_session_token(cookie.value(), codec.as_ref()).unwrap();
        assert_eq!(session.username, "thedude");
        assert_eq!(session.expires, now() + Duration::minutes(30));

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn logout_removes_session_cookie() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/logout")
            .header(header::COOKIE, "session=whatever")
            .body(Body::empty())
            .unwrap();

        let response = login_router()
            .with_state(state(MockCredentialStore::new(), unused_codec()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie header");
        assert!(set_cookie.starts_with("session="));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .body(Body::from(CREDENTIALS))
            .unwrap();

        let response = login_router()
            .layer(DefaultBodyLimit::max(16))
            .with_state(state(MockCredentialStore::new(), unused_codec()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"], "Payload Too Large");
    }

    /// Returns a fixed verdict and counts its calls
    struct StaticAuthenticator {
        verdict: fn() -> Result<Cookie<'static>, AuthenticateError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for StaticAuthenticator {
        async fn authenticate(&self, _body: Bytes) -> Result<Cookie<'static>, AuthenticateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.verdict)()
        }
    }

    async fn authenticate_once(
        method: Method,
        verdict: fn() -> Result<Cookie<'static>, AuthenticateError>,
    ) -> (axum::response::Response, usize) {
        let authenticator = Arc::new(StaticAuthenticator {
            verdict,
            calls: AtomicUsize::new(0),
        });
        let router = Router::new()
            .route("/login", any(authenticate))
            .with_state(authenticator.clone() as Arc<dyn Authenticator>);

        let request = Request::builder()
            .method(method)
            .uri("/login")
            .body(Body::from(CREDENTIALS))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        (response, authenticator.calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn authenticator_rejects_non_post_without_calling() {
        let (response, calls) =
            authenticate_once(Method::PUT, || Ok(Cookie::new(SESSION_COOKIE, "token"))).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn authenticator_errors_map_to_status_codes() {
        let cases: [(fn() -> Result<Cookie<'static>, AuthenticateError>, StatusCode); 3] = [
            (
                || Err(AuthenticateError::BadRequest("bad".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (|| Err(AuthenticateError::Unauthorized), StatusCode::UNAUTHORIZED),
            (
                || Err(anyhow::anyhow!("some error").into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (verdict, expected) in cases {
            let (response, calls) = authenticate_once(Method::POST, verdict).await;
            assert_eq!(response.status(), expected);
            assert_eq!(calls, 1);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
        }
    }

    #[tokio::test]
    async fn authenticator_cookie_is_set_on_success() {
        let (response, calls) =
            authenticate_once(Method::POST, || Ok(Cookie::new(SESSION_COOKIE, "token"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls, 1);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie header");
        assert!(set_cookie.starts_with("session=token"));
    }
}
