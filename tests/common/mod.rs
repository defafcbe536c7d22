// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use crypto_dashboard::config::Config;
use crypto_dashboard::db::{MemoryUserStore, StoreError, UserStore};
use crypto_dashboard::models::{NewUser, User};
use crypto_dashboard::routes::create_router;
use crypto_dashboard::services::{OAuthError, OAuthIdentity, OAuthProvider};
use crypto_dashboard::AppState;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Check if a Postgres test database is configured.
#[allow(dead_code)]
pub fn database_available() -> bool {
    std::env::var("DATABASE_URL").is_ok()
}

/// Skip test with message if no database is configured.
#[macro_export]
macro_rules! require_database {
    () => {
        if !crate::common::database_available() {
            eprintln!("⚠️  Skipping: DATABASE_URL not set");
            return;
        }
    };
}

/// OAuth provider that maps known codes to identities.
#[derive(Default)]
pub struct FakeOAuthProvider {
    identities: HashMap<String, OAuthIdentity>,
}

impl FakeOAuthProvider {
    #[allow(dead_code)]
    pub fn with_identity(mut self, code: &str, email: &str) -> Self {
        self.identities.insert(
            code.to_string(),
            OAuthIdentity {
                provider_user_id: format!("sub-{code}"),
                email: email.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuthProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.test/auth?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, OAuthError> {
        self.identities
            .get(code)
            .cloned()
            .ok_or_else(|| OAuthError::Rejected(format!("unknown code {code}")))
    }
}

/// Store whose every call fails, for fault-path tests.
#[allow(dead_code)]
pub struct FailingUserStore;

#[async_trait]
impl UserStore for FailingUserStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        Err(StoreError::Timeout("find_by_id"))
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Timeout("find_by_email"))
    }

    async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Timeout("find_by_username"))
    }

    async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

/// Store whose uniqueness lookups run before a concurrent writer commits:
/// lookups see nothing, but the insert hits the winner's row.
#[allow(dead_code)]
pub struct RacingUserStore {
    pub inner: MemoryUserStore,
}

#[async_trait]
impl UserStore for RacingUserStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.inner.ensure_schema().await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn find_by_username(&self, _username: &str) -> Result<Option<User>, StoreError> {
        Ok(None)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.inner.insert(user).await
    }
}

/// Create a test app over an in-memory store.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryUserStore>) {
    create_test_app_with_oauth(FakeOAuthProvider::default())
}

#[allow(dead_code)]
pub fn create_test_app_with_oauth(
    oauth: FakeOAuthProvider,
) -> (axum::Router, Arc<AppState>, Arc<MemoryUserStore>) {
    let store = Arc::new(MemoryUserStore::new());
    let state = Arc::new(
        AppState::new(Config::test_default(), store.clone(), Arc::new(oauth))
            .expect("Failed to build test state"),
    );
    (create_router(state.clone()), state, store)
}

/// Create a test app over any store.
#[allow(dead_code)]
pub fn create_test_app_with_store(store: Arc<dyn UserStore>) -> axum::Router {
    let state = Arc::new(
        AppState::new(
            Config::test_default(),
            store,
            Arc::new(FakeOAuthProvider::default()),
        )
        .expect("Failed to build test state"),
    );
    create_router(state)
}

/// Create a test app whose store always faults.
#[allow(dead_code)]
pub fn create_failing_app() -> axum::Router {
    create_test_app_with_store(Arc::new(FailingUserStore))
}

/// Build a url-encoded form POST.
#[allow(dead_code)]
pub fn form_post(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

/// GET with an optional `Cookie` header.
#[allow(dead_code)]
pub fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// `name=value` pair from a `Set-Cookie` header, ready to send back.
#[allow(dead_code)]
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

#[allow(dead_code)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register `alice` and return her session cookie pair.
#[allow(dead_code)]
pub async fn register_alice(app: &axum::Router) -> String {
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(form_post(
            "/register",
            &[
                ("email", "a@x.com"),
                ("username", "alice"),
                ("password", "longenough"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);

    let cookies = set_cookie_headers(&response);
    cookie_pair(&find_cookie(&cookies, "__session"))
}
