// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every error renders as `{"errors": {field: [messages]}}`. Form-level
//! messages use the `form` key.

use crate::db::StoreError;
use crate::models::UniqueField;
use axum::{
    extract::rejection::{FormRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field name for messages that do not belong to a single input.
pub const FORM_FIELD: &str = "form";

/// Per-field validation messages, keyed by form field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Unknown identifier or wrong password; deliberately indistinguishable.
    #[error("Invalid username/email or password")]
    InvalidCredentials,

    #[error("Duplicate identifier: {0:?}")]
    Duplicate(Vec<UniqueField>),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub const MARKET_DATA_MESSAGE: &'static str =
        "Failed to load token prices. Please try again later.";
    pub const GENERIC_MESSAGE: &'static str = "Something went wrong";

    /// Build a validation error for a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => AppError::Duplicate(vec![field]),
            other => AppError::Store(other.to_string()),
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected form body");
        AppError::field(FORM_FIELD, "Invalid form submission")
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected query string");
        AppError::field(FORM_FIELD, "Invalid query string")
    }
}

/// JSON error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: FieldErrors,
}

impl ErrorResponse {
    fn form(message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(FORM_FIELD.to_string(), vec![message.to_string()]);
        Self { errors }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, ErrorResponse { errors }),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::form("Invalid username/email or password"),
            ),
            AppError::Duplicate(fields) => {
                let errors = fields
                    .into_iter()
                    .map(|f| (f.as_str().to_string(), vec![f.duplicate_message().to_string()]))
                    .collect();
                (StatusCode::BAD_REQUEST, ErrorResponse { errors })
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::form("Authentication required"),
            ),
            AppError::MarketData(msg) => {
                tracing::warn!(error = %msg, "Market data request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::form(Self::MARKET_DATA_MESSAGE),
                )
            }
            AppError::Store(msg) => {
                tracing::error!(error = %msg, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::form(Self::GENERIC_MESSAGE),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::form(Self::GENERIC_MESSAGE),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
