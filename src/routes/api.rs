// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CoinMarket, MarketChart};
use crate::validation::{ChartQuery, MarketsQuery};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::SecondsFormat;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require an authenticated session).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/markets", get(get_markets))
        .route("/api/markets/{coin_id}/chart", get(get_market_chart))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export))]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
    /// RFC 3339, UTC with `Z` suffix
    pub created_at: String,
}

/// Get the signed-in user.
async fn get_me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse {
        id: user.id.to_string(),
        email: user.email,
        username: user.username,
        created_at: user.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

// ─── Market Data ─────────────────────────────────────────────

/// Top coins by market cap.
async fn get_markets(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<MarketsQuery>, AppError>,
) -> Result<Json<Vec<CoinMarket>>> {
    let input = query.validate().map_err(AppError::Validation)?;

    let markets = state
        .market
        .top_markets(&input.vs_currency, input.per_page)
        .await?;

    tracing::debug!(count = markets.len(), vs_currency = %input.vs_currency, "Fetched markets");
    Ok(Json(markets))
}

/// Price history for one coin.
async fn get_market_chart(
    State(state): State<Arc<AppState>>,
    Path(coin_id): Path<String>,
    WithRejection(Query(query), _): WithRejection<Query<ChartQuery>, AppError>,
) -> Result<Json<MarketChart>> {
    let input = query.validate(&coin_id).map_err(AppError::Validation)?;

    let chart = state
        .market
        .market_chart(&input.coin_id, &input.vs_currency, input.days)
        .await?;

    Ok(Json(chart))
}
