// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Postgres-backed user store.

use crate::config::Config;
use crate::db::{schema, StoreError, UserStore};
use crate::models::{NewUser, UniqueField, User};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

const SELECT_USER: &str = "SELECT id, email, username, password_hash, created_at FROM users";

/// User store over a Postgres connection pool.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    /// Open the connection pool.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(config.store_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Postgres: {}", e)))?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "Connected to Postgres"
        );

        Ok(Self::from_pool(pool, config.store_timeout))
    }

    pub fn from_pool(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Postgres pool closed");
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| map_sqlx_error(op, e)),
            Err(_) => {
                tracing::error!(op, timeout_ms = self.timeout.as_millis() as u64, "Store call timed out");
                Err(StoreError::Timeout(op))
            }
        }
    }

    async fn find_one(
        &self,
        op: &'static str,
        column: &'static str,
        value: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE {column} = $1");
        self.run(
            op,
            sqlx::query_as::<_, User>(&sql)
                .bind(value)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT {email_key} UNIQUE (email),
                CONSTRAINT {username_key} UNIQUE (username)
            )
            "#,
            table = schema::USERS,
            email_key = schema::EMAIL_CONSTRAINT,
            username_key = schema::USERNAME_CONSTRAINT,
        );

        self.run("ensure_schema", sqlx::query(&ddl).execute(&self.pool))
            .await?;

        tracing::info!(table = schema::USERS, "Schema ready");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("{SELECT_USER} WHERE id = $1");
        self.run(
            "find_by_id",
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("find_by_email", "email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("find_by_username", "username", username).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user();
        let inserted = self
            .run(
                "insert",
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (id, email, username, password_hash, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, email, username, password_hash, created_at
                    "#,
                )
                .bind(user.id)
                .bind(&user.email)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .fetch_one(&self.pool),
            )
            .await?;

        tracing::info!(user_id = %inserted.id, "User inserted");
        Ok(inserted)
    }
}

/// Map a sqlx error, turning unique violations into [`StoreError::Duplicate`].
fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            if let Some(field) = db_err.constraint().and_then(field_for_constraint) {
                return StoreError::Duplicate(field);
            }
        }
    }

    tracing::error!(op, error = %err, "Postgres query failed");
    StoreError::Backend(err.to_string())
}

fn field_for_constraint(constraint: &str) -> Option<UniqueField> {
    match constraint {
        schema::EMAIL_CONSTRAINT => Some(UniqueField::Email),
        schema::USERNAME_CONSTRAINT => Some(UniqueField::Username),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_fields() {
        assert_eq!(
            field_for_constraint("users_email_key"),
            Some(UniqueField::Email)
        );
        assert_eq!(
            field_for_constraint("users_username_key"),
            Some(UniqueField::Username)
        );
        assert_eq!(field_for_constraint("users_pkey"), None);
    }

    #[test]
    fn non_database_errors_are_backend_faults() {
        let err = map_sqlx_error("find_by_id", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
