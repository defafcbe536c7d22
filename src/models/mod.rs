// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod market;
pub mod user;

pub use market::{CoinMarket, MarketChart, PricePoint};
pub use user::{NewUser, UniqueField, User};
