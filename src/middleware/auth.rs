// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookies and the authentication middleware.
//!
//! The session is an HS256 JWT stored in an HttpOnly cookie. A missing,
//! tampered or expired token is treated as "no session", never as an error.

use crate::error::AppError;
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hkdf::Hkdf;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "__session";

/// Lifetime of a remembered session (30 days).
pub const REMEMBER_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound for a browser-session token (12 hours).
pub const BROWSER_SESSION_TTL_SECS: u64 = 12 * 60 * 60;

const SESSION_KEY_INFO: &[u8] = b"crypto-dashboard session token v1";
const OAUTH_STATE_KEY_INFO: &[u8] = b"crypto-dashboard oauth state v1";

/// Session token claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Whether the user asked to be remembered
    #[serde(default)]
    pub rem: bool,
}

impl SessionClaims {
    pub fn new(user_id: Uuid, remember: bool) -> Self {
        let now = now_unix_secs() as usize;
        let ttl = if remember {
            REMEMBER_TTL_SECS
        } else {
            BROWSER_SESSION_TTL_SECS
        };
        Self {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl as usize,
            rem: remember,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Keys derived from the process-wide session secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    oauth_state_key: Vec<u8>,
}

impl SessionKeys {
    /// Derive independent token and OAuth-state keys with HKDF-SHA256.
    pub fn derive(secret: &[u8]) -> anyhow::Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, secret);

        let mut session_key = [0u8; 32];
        let mut oauth_state_key = [0u8; 32];
        hk.expand(SESSION_KEY_INFO, &mut session_key)
            .map_err(|e| anyhow::anyhow!("HKDF expand failed: {}", e))?;
        hk.expand(OAUTH_STATE_KEY_INFO, &mut oauth_state_key)
            .map_err(|e| anyhow::anyhow!("HKDF expand failed: {}", e))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(&session_key),
            decoding: DecodingKey::from_secret(&session_key),
            oauth_state_key: oauth_state_key.to_vec(),
        })
    }

    /// Key used to sign the OAuth `state` parameter.
    pub fn oauth_state_key(&self) -> &[u8] {
        &self.oauth_state_key
    }

    /// Sign session claims into a token.
    pub fn sign(&self, claims: &SessionClaims) -> anyhow::Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Verify a token; `None` for anything that is not a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<SessionClaims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session token");
                None
            }
        }
    }
}

/// Build the session cookie.
///
/// A remembered session gets a long `Max-Age`; otherwise the cookie has no
/// expiry and lasts until the browser closes.
pub fn session_cookie(token: String, remember: bool, secure: bool) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/");

    if remember {
        builder = builder.max_age(time::Duration::seconds(REMEMBER_TTL_SECS as i64));
    }

    builder.build()
}

/// Removal cookie with the same attributes as [`session_cookie`].
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

/// Issue a session for `user_id` and redirect to `redirect_to`.
pub fn create_session(
    state: &AppState,
    jar: CookieJar,
    user_id: Uuid,
    remember: bool,
    redirect_to: &str,
) -> Result<(CookieJar, Redirect), AppError> {
    let token = state
        .session_keys
        .sign(&SessionClaims::new(user_id, remember))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Session signing failed: {}", e)))?;

    tracing::info!(user_id = %user_id, remember, "Session issued");

    let cookie = session_cookie(token, remember, state.config.secure_cookies());
    Ok((jar.add(cookie), Redirect::to(redirect_to)))
}

/// Resolve the user behind the request's session cookie.
///
/// The record is re-read on every call so a removed account stops resolving
/// immediately. Store faults are logged and fold to `None`.
pub async fn current_user(state: &AppState, jar: &CookieJar) -> Option<User> {
    let token = jar.get(SESSION_COOKIE)?.value().to_string();
    let claims = state.session_keys.verify(&token)?;
    let user_id = claims.user_id()?;

    match state.users.find_by_id(user_id).await {
        Ok(Some(user)) => Some(user),
        Ok(None) => {
            tracing::info!(user_id = %user_id, "Session refers to a missing user");
            None
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "User lookup failed during session resolution");
            None
        }
    }
}

/// Authenticated user, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Middleware that requires a valid session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(user) = current_user(&state, &jar).await else {
        return AppError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(AuthUser(user));
    next.run(request).await
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
