// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory user store for tests and offline development.

use crate::db::{StoreError, UserStore};
use crate::models::{NewUser, UniqueField, User};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// DashMap-backed store with the same uniqueness rules as the Postgres table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    by_email: DashMap<String, Uuid>,
    by_username: DashMap<String, Uuid>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Remove a record and its index entries.
    ///
    /// Only used to simulate out-of-band deletion; the application never
    /// deletes users.
    pub fn remove(&self, id: Uuid) -> Option<User> {
        let (_, user) = self.users.remove(&id)?;
        self.by_email.remove(&user.email);
        self.by_username.remove(&user.username);
        Some(user)
    }

    fn lookup(&self, index: &DashMap<String, Uuid>, key: &str) -> Option<User> {
        let id = *index.get(key)?;
        self.users.get(&id).map(|user| user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lookup(&self.by_email, email))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lookup(&self.by_username, username))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user();

        // Claim the email first, then the username; release the email if the
        // username is taken. Lock order is always email -> username.
        let email_slot = match self.by_email.entry(user.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Duplicate(UniqueField::Email)),
            Entry::Vacant(slot) => slot.insert(user.id),
        };

        let username_taken = match self.by_username.entry(user.username.clone()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                false
            }
        };
        drop(email_slot);

        if username_taken {
            self.by_email.remove(&user.email);
            return Err(StoreError::Duplicate(UniqueField::Username));
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}
