// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Password hash marker for accounts created through OAuth.
///
/// Never verifies against any password.
pub const NO_PASSWORD: &str = "";

/// User record stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Unique, stored lowercased
    pub email: String,
    /// Unique
    pub username: String,
    /// Argon2 PHC string, or [`NO_PASSWORD`]
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the account can sign in with a password at all.
    pub fn has_password(&self) -> bool {
        self.password_hash != NO_PASSWORD
    }
}

/// Fields needed to insert a user; the id and timestamp are assigned here.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            username: self.username,
            password_hash: self.password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Columns protected by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UniqueField {
    Email,
    Username,
}

impl UniqueField {
    /// Form field name used in error payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::Username => "username",
        }
    }

    pub fn duplicate_message(self) -> &'static str {
        match self {
            UniqueField::Email => "A user already exists with this email",
            UniqueField::Username => "A user already exists with this username",
        }
    }
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
