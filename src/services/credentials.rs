// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential verification and registration.

use crate::db::{StoreError, UserStore};
use crate::error::{AppError, Result};
use crate::models::{NewUser, UniqueField, User};
use crate::services::password;
use crate::validation::{normalize_email, RegisterInput};
use std::sync::Arc;

/// Verifies passwords and registers new accounts against the user store.
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    /// Hash checked when there is no real one, so unknown identifiers cost
    /// the same as wrong passwords.
    dummy_hash: String,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let dummy_hash = password::hash_password("timing-equalization-placeholder")?;
        Ok(Self { users, dummy_hash })
    }

    /// Check an email-or-username plus password.
    ///
    /// `Ok(None)` covers both an unknown identifier and a wrong password.
    /// Store faults are returned as errors.
    pub async fn verify_login(&self, identifier: &str, password: &str) -> Result<Option<User>> {
        let found = if identifier.contains('@') {
            self.users
                .find_by_email(&normalize_email(identifier))
                .await?
        } else {
            self.users.find_by_username(identifier).await?
        };

        let (hash, candidate) = match found {
            Some(user) if user.has_password() => (user.password_hash.clone(), Some(user)),
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Password login attempted on OAuth-only account");
                (self.dummy_hash.clone(), None)
            }
            None => (self.dummy_hash.clone(), None),
        };

        let matched = password::verify_password_blocking(password.to_string(), hash).await?;

        match candidate {
            Some(user) if matched => {
                tracing::info!(user_id = %user.id, "Login verified");
                Ok(Some(user))
            }
            _ => {
                tracing::info!("Login rejected: invalid credentials");
                Ok(None)
            }
        }
    }

    /// Create an account from validated input.
    ///
    /// Every identifier that is already taken is reported. A uniqueness
    /// violation raised by the insert itself (a concurrent registration won)
    /// is reported the same way.
    pub async fn register(&self, input: &RegisterInput) -> Result<User> {
        let (by_email, by_username) = tokio::try_join!(
            self.users.find_by_email(&input.email),
            self.users.find_by_username(&input.username),
        )?;

        let mut taken = Vec::new();
        if by_email.is_some() {
            taken.push(UniqueField::Email);
        }
        if by_username.is_some() {
            taken.push(UniqueField::Username);
        }
        if !taken.is_empty() {
            tracing::info!(fields = ?taken, "Registration rejected: identifier taken");
            return Err(AppError::Duplicate(taken));
        }

        let password_hash = password::hash_password_blocking(input.password.clone()).await?;

        let user = self
            .users
            .insert(NewUser {
                email: input.email.clone(),
                username: input.username.clone(),
                password_hash,
            })
            .await
            .map_err(|e| {
                if let StoreError::Duplicate(field) = &e {
                    tracing::warn!(%field, "Registration lost a uniqueness race");
                }
                AppError::from(e)
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUserStore;
    use crate::models::user::NO_PASSWORD;

    fn input(email: &str, username: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            redirect_to: "/".to_string(),
        }
    }

    fn service() -> (CredentialService, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        let service = CredentialService::new(store.clone()).unwrap();
        (service, store)
    }

    #[tokio::test]
    async fn email_and_username_resolve_to_same_record() {
        let (service, _) = service();
        let user = service
            .register(&input("a@x.com", "alice", "longenough"))
            .await
            .unwrap();

        let by_email = service.verify_login("a@x.com", "longenough").await.unwrap();
        let by_username = service.verify_login("alice", "longenough").await.unwrap();

        assert_eq!(by_email.as_ref().map(|u| u.id), Some(user.id));
        assert_eq!(by_email, by_username);
    }

    #[tokio::test]
    async fn email_login_is_case_insensitive() {
        let (service, _) = service();
        service
            .register(&input("a@x.com", "alice", "longenough"))
            .await
            .unwrap();

        assert!(service
            .verify_login("A@X.COM", "longenough")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_both_return_none() {
        let (service, _) = service();
        service
            .register(&input("a@x.com", "alice", "longenough"))
            .await
            .unwrap();

        assert!(service.verify_login("alice", "wrongpass").await.unwrap().is_none());
        assert!(service.verify_login("nobody", "longenough").await.unwrap().is_none());
        assert!(service
            .verify_login("nobody@x.com", "longenough")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn oauth_only_account_cannot_password_login() {
        let (service, store) = service();
        store
            .insert(NewUser {
                email: "g@x.com".to_string(),
                username: "g".to_string(),
                password_hash: NO_PASSWORD.to_string(),
            })
            .await
            .unwrap();

        assert!(service.verify_login("g@x.com", "").await.unwrap().is_none());
        assert!(service.verify_login("g", "anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_all_reported() {
        let (service, store) = service();
        service
            .register(&input("a@x.com", "alice", "longenough"))
            .await
            .unwrap();

        let err = service
            .register(&input("a@x.com", "alice", "longenough"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Duplicate(ref fields)
                if fields == &vec![UniqueField::Email, UniqueField::Username]
        ));

        let err = service
            .register(&input("a@x.com", "bob", "longenough"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Duplicate(ref fields) if fields == &vec![UniqueField::Email]
        ));

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let (service, _) = service();
        let user = service
            .register(&input("a@x.com", "alice", "longenough"))
            .await
            .unwrap();

        assert_ne!(user.password_hash, "longenough");
        assert!(password::verify_password("longenough", &user.password_hash));
    }
}
