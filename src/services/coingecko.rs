// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! CoinGecko client for live prices and price history.

use crate::error::AppError;
use crate::models::{CoinMarket, MarketChart, PricePoint};
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Market data API client.
#[derive(Clone)]
pub struct MarketDataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed building market data HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Top coins by market capitalization.
    pub async fn top_markets(
        &self,
        vs_currency: &str,
        per_page: u32,
    ) -> Result<Vec<CoinMarket>, AppError> {
        let url = format!("{}/coins/markets", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", vs_currency.to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", per_page.to_string()),
                ("page", "1".to_string()),
                ("sparkline", "false".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::MarketData(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Price history for one coin over the last `days` days.
    pub async fn market_chart(
        &self,
        coin_id: &str,
        vs_currency: &str,
        days: u32,
    ) -> Result<MarketChart, AppError> {
        let url = format!(
            "{}/coins/{}/market_chart",
            self.base_url,
            urlencoding::encode(coin_id)
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", vs_currency.to_string()),
                ("days", days.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::MarketData(e.to_string()))?;

        let raw: RawMarketChart = self.check_response_json(response).await?;

        Ok(MarketChart {
            coin_id: coin_id.to_string(),
            vs_currency: vs_currency.to_string(),
            days,
            prices: raw.price_points(),
        })
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("CoinGecko rate limit hit (429)");
                return Err(AppError::MarketData("rate limited".to_string()));
            }

            return Err(AppError::MarketData(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MarketData(format!("JSON parse error: {}", e)))
    }
}

/// `market_chart` response: each series is `[[ms, value], ...]`.
#[derive(Debug, Deserialize)]
struct RawMarketChart {
    prices: Vec<(f64, f64)>,
}

impl RawMarketChart {
    fn price_points(self) -> Vec<PricePoint> {
        self.prices
            .into_iter()
            .filter(|(ts, price)| ts.is_finite() && price.is_finite())
            .map(|(ts, price)| PricePoint {
                timestamp: ts as i64,
                price,
            })
            .collect()
    }
}
