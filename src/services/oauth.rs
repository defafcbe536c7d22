// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth sign-in: provider abstraction, signed `state`, and the callback flow.
//!
//! The callback runs as a small state machine:
//!
//! ```text
//! AwaitingCode -> ExchangingCode -> ResolvingUser -> CreatingSession
//!       \               \                 \
//!        +---------------+-----------------+--> Failed
//! ```
//!
//! Every failure ends in `Failed` with a reason whose user-facing message is
//! generic; details only go to the log.

use crate::db::{StoreError, UserStore};
use crate::models::user::NO_PASSWORD;
use crate::models::{NewUser, UniqueField, User};
use crate::validation::{normalize_email, safe_redirect, DEFAULT_REDIRECT};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long an issued `state` stays acceptable.
pub const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

const MAX_USERNAME_LEN: usize = 48;
const USERNAME_ATTEMPTS: usize = 5;

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthIdentity {
    pub provider_user_id: String,
    pub email: String,
}

/// Provider failure categories.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OAuthError {
    /// The code or the returned identity was not acceptable.
    #[error("rejected by OAuth verification: {0}")]
    Rejected(String),
    /// The provider could not be reached or answered garbage.
    #[error("transient OAuth failure: {0}")]
    Transient(String),
}

/// An external identity provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to, carrying our signed `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange a one-time authorization code for a verified identity.
    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, OAuthError>;
}

// ─── Signed state ────────────────────────────────────────────

/// Encode `redirect_to` and the current time into a signed, URL-safe state.
pub fn sign_state(redirect_to: &str, key: &[u8]) -> anyhow::Result<String> {
    sign_state_at(redirect_to, key, now_millis())
}

fn sign_state_at(redirect_to: &str, key: &[u8], timestamp_ms: u128) -> anyhow::Result<String> {
    // "redirect|timestamp_hex|signature_hex"
    let payload = format!("{}|{:x}", redirect_to, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a state parameter and return the redirect target it carries.
///
/// Returns `None` for bad encoding, a bad signature, or an expired state.
pub fn verify_state(state: &str, key: &[u8]) -> Option<String> {
    verify_state_at(state, key, now_millis())
}

fn verify_state_at(state: &str, key: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right: the redirect target may itself contain '|'.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let redirect_to = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(format!("{}|{}", redirect_to, timestamp_hex).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(safe_redirect(Some(redirect_to)))
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

// ─── Callback state machine ──────────────────────────────────

/// Query parameters delivered to the callback.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Why a callback did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The provider redirected back with an `error` parameter.
    ProviderError(String),
    /// Neither `code` nor `error` was present.
    MissingCode,
    InvalidState,
    ExchangeFailed,
    ProvisioningFailed,
}

impl FailureReason {
    /// Message shown on the login page, if any.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            FailureReason::MissingCode => None,
            FailureReason::ProviderError(code) if code == "access_denied" => {
                Some("Sign-in was cancelled")
            }
            _ => Some("Authentication failed"),
        }
    }
}

#[derive(Debug)]
enum CallbackStage {
    AwaitingCode(CallbackParams),
    ExchangingCode(String),
    ResolvingUser(OAuthIdentity),
    CreatingSession(User),
    Failed(FailureReason),
}

/// Terminal result of a callback.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Issue a remembered session for `user` and go to `redirect_to`.
    Session { user: User, redirect_to: String },
    Failed(FailureReason),
}

/// Drive one callback from the provider redirect to a terminal outcome.
pub async fn handle_callback(
    provider: &dyn OAuthProvider,
    users: &dyn UserStore,
    state_key: &[u8],
    params: CallbackParams,
) -> CallbackOutcome {
    let mut redirect_to = DEFAULT_REDIRECT.to_string();
    let mut stage = CallbackStage::AwaitingCode(params);

    loop {
        tracing::debug!(stage = stage_name(&stage), "OAuth callback stage");

        stage = match stage {
            CallbackStage::AwaitingCode(params) => {
                if let Some(error) = params.error {
                    tracing::warn!(error = %error, "OAuth error from provider");
                    CallbackStage::Failed(FailureReason::ProviderError(error))
                } else if let Some(code) = params.code {
                    match params.state.as_deref().and_then(|s| verify_state(s, state_key)) {
                        Some(target) => {
                            redirect_to = target;
                            CallbackStage::ExchangingCode(code)
                        }
                        None => CallbackStage::Failed(FailureReason::InvalidState),
                    }
                } else {
                    CallbackStage::Failed(FailureReason::MissingCode)
                }
            }
            CallbackStage::ExchangingCode(code) => match provider.exchange_code(&code).await {
                Ok(identity) => CallbackStage::ResolvingUser(identity),
                Err(e) => {
                    match &e {
                        OAuthError::Rejected(_) => tracing::warn!(error = %e, "Code exchange rejected"),
                        OAuthError::Transient(_) => tracing::error!(error = %e, "Code exchange failed"),
                    }
                    CallbackStage::Failed(FailureReason::ExchangeFailed)
                }
            },
            CallbackStage::ResolvingUser(identity) => {
                match find_or_provision(users, &identity).await {
                    Ok(user) => CallbackStage::CreatingSession(user),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to resolve OAuth user");
                        CallbackStage::Failed(FailureReason::ProvisioningFailed)
                    }
                }
            }
            CallbackStage::CreatingSession(user) => {
                return CallbackOutcome::Session { user, redirect_to };
            }
            CallbackStage::Failed(reason) => {
                tracing::info!(reason = ?reason, "OAuth callback failed");
                return CallbackOutcome::Failed(reason);
            }
        };
    }
}

fn stage_name(stage: &CallbackStage) -> &'static str {
    match stage {
        CallbackStage::AwaitingCode(_) => "awaiting_code",
        CallbackStage::ExchangingCode(_) => "exchanging_code",
        CallbackStage::ResolvingUser(_) => "resolving_user",
        CallbackStage::CreatingSession(_) => "creating_session",
        CallbackStage::Failed(_) => "failed",
    }
}

/// Find the local user for a provider identity, creating one on first login.
///
/// New users get a username derived from the email local part and the
/// empty password marker.
pub async fn find_or_provision(
    users: &dyn UserStore,
    identity: &OAuthIdentity,
) -> Result<User, StoreError> {
    let email = normalize_email(&identity.email);

    if let Some(user) = users.find_by_email(&email).await? {
        return Ok(user);
    }

    let base = derive_username(&email);
    for attempt in 0..USERNAME_ATTEMPTS {
        let username = if attempt == 0 {
            base.clone()
        } else {
            let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
            format!("{}{}", base, suffix)
        };

        let new_user = NewUser {
            email: email.clone(),
            username,
            password_hash: NO_PASSWORD.to_string(),
        };

        match users.insert(new_user).await {
            Ok(user) => {
                tracing::info!(
                    user_id = %user.id,
                    provider_user_id = %identity.provider_user_id,
                    "Provisioned user from OAuth login"
                );
                return Ok(user);
            }
            Err(StoreError::Duplicate(UniqueField::Username)) => continue,
            Err(StoreError::Duplicate(UniqueField::Email)) => {
                // A concurrent callback created it first.
                return users.find_by_email(&email).await?.ok_or_else(|| {
                    StoreError::Backend("user missing after duplicate email".to_string())
                });
            }
            Err(e) => return Err(e),
        }
    }

    Err(StoreError::Backend(format!(
        "no free username derived from {:?}",
        base
    )))
}

/// Username candidate from the email local part.
pub fn derive_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_USERNAME_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}
