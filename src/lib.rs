// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Crypto Dashboard: sign in and follow live cryptocurrency prices
//!
//! This crate provides the backend for the dashboard: password and Google
//! sign-in with cookie sessions, and authenticated access to CoinGecko
//! market data.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

use config::Config;
use db::UserStore;
use middleware::auth::SessionKeys;
use services::{CredentialService, MarketDataClient, OAuthProvider};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub credentials: CredentialService,
    pub oauth: Arc<dyn OAuthProvider>,
    pub market: MarketDataClient,
    pub session_keys: SessionKeys,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        oauth: Arc<dyn OAuthProvider>,
    ) -> anyhow::Result<Self> {
        let session_keys = SessionKeys::derive(&config.session_secret)?;
        let credentials = CredentialService::new(users.clone())?;
        let market = MarketDataClient::new(config.coingecko_api_url.clone())?;

        Ok(Self {
            config,
            users,
            credentials,
            oauth,
            market,
            session_keys,
        })
    }
}
