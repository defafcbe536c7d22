// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google sign-in: authorization URL, code exchange and ID token verification.

use crate::config::Config;
use crate::services::oauth::{OAuthError, OAuthIdentity, OAuthProvider};
use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const SCOPES: &str = "openid email profile";
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Where ID token signing keys come from.
enum KeySource {
    /// Google's published JWKS, discovered and cached.
    Jwks {
        jwks_uri: RwLock<Option<CachedUri>>,
        keys: RwLock<Option<CachedKeys>>,
        refresh_lock: Mutex<()>,
    },
    /// One fixed key, for tests.
    Static {
        kid: String,
        key: Arc<DecodingKey>,
    },
}

struct CachedUri {
    uri: String,
    expires_at: Instant,
}

struct CachedKeys {
    by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Google OAuth 2.0 / OpenID Connect client.
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    keys: KeySource,
}

impl GoogleOAuthClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Self::build(
            config,
            KeySource::Jwks {
                jwks_uri: RwLock::new(None),
                keys: RwLock::new(None),
                refresh_lock: Mutex::new(()),
            },
        )?;

        tracing::info!(
            redirect_uri = %client.redirect_uri,
            "Initialized Google OAuth client"
        );
        Ok(client)
    }

    /// Client that trusts a single fixed ID token key.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key id must not be empty");
        }

        Self::build(
            config,
            KeySource::Static {
                kid,
                key: Arc::new(key),
            },
        )
    }

    fn build(config: &Config, keys: KeySource) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building Google OAuth HTTP client")?;

        Ok(Self {
            http,
            token_url: TOKEN_URL.to_string(),
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri(),
            keys,
        })
    }

    /// Verify a Google ID token and extract the identity it asserts.
    pub async fn verify_id_token(&self, token: &str) -> Result<OAuthIdentity, OAuthError> {
        let header = decode_header(token)
            .map_err(|e| OAuthError::Rejected(format!("invalid ID token header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(OAuthError::Rejected(format!(
                "unexpected ID token alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| OAuthError::Rejected("missing ID token kid".to_string()))?;
        let key = self.key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(token, key.as_ref(), &validation)
            .map_err(|e| OAuthError::Rejected(format!("ID token validation failed: {e}")))?
            .claims;

        check_issued_at(claims.iat)?;

        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| OAuthError::Rejected("ID token has no email".to_string()))?;

        if claims.email_verified != Some(true) {
            return Err(OAuthError::Rejected(format!(
                "email not verified (email_verified = {:?})",
                claims.email_verified
            )));
        }

        tracing::debug!(subject = %claims.sub, "Google ID token verified");

        Ok(OAuthIdentity {
            provider_user_id: claims.sub,
            email,
        })
    }

    async fn key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, OAuthError> {
        match &self.keys {
            KeySource::Static {
                kid: static_kid,
                key,
            } => {
                if kid == static_kid {
                    Ok(key.clone())
                } else {
                    Err(OAuthError::Rejected(format!("unknown ID token kid: {kid}")))
                }
            }
            KeySource::Jwks {
                jwks_uri,
                keys,
                refresh_lock,
            } => {
                if let Some(key) = cached_key(keys, kid).await {
                    return Ok(key);
                }

                // Google rotates keys; a miss after a normal refresh forces one more.
                for force in [false, true] {
                    self.refresh_keys(jwks_uri, keys, refresh_lock, force).await?;
                    if let Some(key) = cached_key(keys, kid).await {
                        return Ok(key);
                    }
                }

                Err(OAuthError::Rejected(format!(
                    "ID token kid not in JWKS after refresh: {kid}"
                )))
            }
        }
    }

    async fn refresh_keys(
        &self,
        jwks_uri: &RwLock<Option<CachedUri>>,
        keys: &RwLock<Option<CachedKeys>>,
        refresh_lock: &Mutex<()>,
        force: bool,
    ) -> Result<(), OAuthError> {
        let _guard = refresh_lock.lock().await;

        if !force
            && keys
                .read()
                .await
                .as_ref()
                .is_some_and(|c| c.expires_at > Instant::now())
        {
            return Ok(());
        }

        let uri = self.discover_jwks_uri(jwks_uri, force).await;
        tracing::debug!(jwks_uri = %uri, "Refreshing Google JWKS");

        let response = self
            .http
            .get(&uri)
            .send()
            .await
            .map_err(|e| OAuthError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OAuthError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl(response.headers());
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OAuthError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let by_kid = usable_keys(jwks);
        if by_kid.is_empty() {
            return Err(OAuthError::Transient(
                "JWKS contained no usable RSA keys".to_string(),
            ));
        }

        *keys.write().await = Some(CachedKeys {
            by_kid,
            expires_at: Instant::now() + ttl,
        });
        Ok(())
    }

    /// JWKS location from discovery; falls back to the last known or the
    /// well-known default when discovery is unavailable.
    async fn discover_jwks_uri(&self, cache: &RwLock<Option<CachedUri>>, force: bool) -> String {
        let cached = cache.read().await.as_ref().map(|c| (c.uri.clone(), c.expires_at));
        if let Some((uri, expires_at)) = &cached {
            if !force && *expires_at > Instant::now() {
                return uri.clone();
            }
        }
        let fallback = cached
            .map(|(uri, _)| uri)
            .unwrap_or_else(|| DEFAULT_JWKS_URL.to_string());

        let response = match self.http.get(DISCOVERY_URL).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "OIDC discovery failed; using fallback JWKS URI");
                return fallback;
            }
            Err(e) => {
                tracing::warn!(error = %e, "OIDC discovery failed; using fallback JWKS URI");
                return fallback;
            }
        };

        let ttl = cache_ttl(response.headers());
        match response.json::<OpenIdConfig>().await {
            Ok(config) => {
                *cache.write().await = Some(CachedUri {
                    uri: config.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });
                config.jwks_uri
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid OIDC discovery document");
                fallback
            }
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthIdentity, OAuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Transient(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected(format!("token endpoint {status}: {body}")));
        }
        if !status.is_success() {
            return Err(OAuthError::Transient(format!("token endpoint {status}")));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Transient(format!("invalid token response: {e}")))?;

        self.verify_id_token(&tokens.id_token).await
    }
}

async fn cached_key(keys: &RwLock<Option<CachedKeys>>, kid: &str) -> Option<Arc<DecodingKey>> {
    let now = Instant::now();
    keys.read()
        .await
        .as_ref()
        .filter(|c| c.expires_at > now)
        .and_then(|c| c.by_kid.get(kid))
        .cloned()
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    jwks.keys
        .into_iter()
        .filter(|jwk| {
            jwk.kty == "RSA"
                && !jwk.kid.trim().is_empty()
                && jwk.alg.as_deref().map_or(true, |a| a == "RS256")
                && jwk.use_.as_deref().map_or(true, |u| u == "sig")
        })
        .filter_map(|jwk| match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => Some((jwk.kid, Arc::new(key))),
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid JWKS key");
                None
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<u64>,
    email: Option<String>,
    email_verified: Option<bool>,
}

fn check_issued_at(iat: Option<u64>) -> Result<(), OAuthError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    match iat {
        None => Err(OAuthError::Rejected("missing iat claim".to_string())),
        Some(iat) if iat > now + CLOCK_SKEW_SECS => {
            Err(OAuthError::Rejected("iat claim is in the future".to_string()))
        }
        Some(_) => Ok(()),
    }
}

fn cache_ttl(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CACHE_TTL)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|d| d.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn client() -> GoogleOAuthClient {
        GoogleOAuthClient::new_with_static_key(
            &Config::test_default(),
            "test-kid",
            DecodingKey::from_secret(b"unused"),
        )
        .unwrap()
    }

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(parse_cache_control_max_age("public, max-age=3600"), Some(3600));
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn static_key_requires_kid() {
        let result = GoogleOAuthClient::new_with_static_key(
            &Config::test_default(),
            "  ",
            DecodingKey::from_secret(b"unused"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn authorization_url_carries_client_and_state() {
        let url = client().authorization_url("abc_123");

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=test-client-id"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("state=abc_123"));
        assert!(url.contains(&format!(
            "redirect_uri={}",
            urlencoding::encode("http://localhost:8080/auth/google")
        )));
    }

    #[tokio::test]
    async fn hs256_id_token_is_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "1", "email": "a@x.com" }),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            client().verify_id_token(&token).await,
            Err(OAuthError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn garbage_id_token_is_rejected() {
        assert!(matches!(
            client().verify_id_token("not.a.jwt").await,
            Err(OAuthError::Rejected(_))
        ));
    }

    #[test]
    fn future_iat_is_rejected() {
        assert!(check_issued_at(None).is_err());
        assert!(check_issued_at(Some(u64::MAX / 2)).is_err());
        assert!(check_issued_at(Some(1_700_000_000)).is_ok());
    }
}
