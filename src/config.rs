// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Secrets (session secret, Google client
//! secret, database URL) may come from a local `.env` file during development.

use std::env;
use std::time::Duration;

/// Minimum length of the session secret in bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Public base URL of this service (used for the OAuth callback URL)
    pub app_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Base URL of the CoinGecko API
    pub coingecko_api_url: String,
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Server port
    pub port: u16,
    /// Maximum pooled database connections
    pub database_max_connections: u32,
    /// Upper bound for any single user-store call
    pub store_timeout: Duration,

    // --- Secrets ---
    /// Postgres connection string
    pub database_url: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Root secret for session and OAuth state signing (raw bytes)
    pub session_secret: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            app_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            coingecko_api_url: "http://127.0.0.1:9/api/v3".to_string(),
            google_client_id: "test-client-id.apps.googleusercontent.com".to_string(),
            port: 8080,
            database_max_connections: 2,
            store_timeout: Duration::from_secs(5),
            database_url: "postgres://localhost/crypto_dashboard_test".to_string(),
            google_client_secret: "test_google_secret".to_string(),
            session_secret: b"test_session_secret_32_bytes_min!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?
            .trim()
            .as_bytes()
            .to_vec();
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            });
        }

        Ok(Self {
            app_url: env::var("APP_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            coingecko_api_url: env::var("COINGECKO_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            port: parse_or("PORT", 8080)?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            store_timeout: Duration::from_secs(parse_or("STORE_TIMEOUT_SECS", 5)?),

            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            session_secret,
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    ///
    /// Plain-http local development would otherwise never send them back.
    pub fn secure_cookies(&self) -> bool {
        self.app_url.starts_with("https://")
    }

    /// Callback URL registered with Google.
    pub fn google_redirect_uri(&self) -> String {
        format!("{}/auth/google", self.app_url)
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        env::set_var("SESSION_SECRET", "test_session_secret_32_bytes_min!!");
        env::set_var("GOOGLE_CLIENT_ID", "client-id");
        env::set_var("GOOGLE_CLIENT_SECRET", "client-secret");
        env::remove_var("PORT");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.google_client_id, "client-id");
        assert_eq!(config.google_client_secret, "client-secret");
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_secure_cookies_follow_app_url_scheme() {
        let mut config = Config::test_default();
        assert!(!config.secure_cookies());

        config.app_url = "https://dashboard.example.com".to_string();
        assert!(config.secure_cookies());
        assert_eq!(
            config.google_redirect_uri(),
            "https://dashboard.example.com/auth/google"
        );
    }
}
