// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod coingecko;
pub mod credentials;
pub mod google_oauth;
pub mod oauth;
pub mod password;

pub use coingecko::MarketDataClient;
pub use credentials::CredentialService;
pub use google_oauth::GoogleOAuthClient;
pub use oauth::{OAuthError, OAuthIdentity, OAuthProvider};
