// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-record store.
//!
//! Reads distinguish "not found" (`Ok(None)`) from an underlying fault
//! (`Err`). Callers decide whether a fault folds to "no user".

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use crate::models::{NewUser, UniqueField, User};
use async_trait::async_trait;
use uuid::Uuid;

/// Table and constraint names.
pub mod schema {
    pub const USERS: &str = "users";
    pub const EMAIL_CONSTRAINT: &str = "users_email_key";
    pub const USERNAME_CONSTRAINT: &str = "users_username_key";
}

/// Store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("A user already exists with this {0}")]
    Duplicate(UniqueField),

    #[error("Store operation `{0}` timed out")]
    Timeout(&'static str),

    #[error("Store error: {0}")]
    Backend(String),
}

/// Persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the backing schema if it does not exist yet. Idempotent.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up by email. Emails are stored lowercased.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new record, failing with [`StoreError::Duplicate`] on a
    /// uniqueness violation.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
}
