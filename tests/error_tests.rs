// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use crypto_dashboard::db::StoreError;
use crypto_dashboard::error::AppError;
use crypto_dashboard::models::UniqueField;

mod common;
use common::body_json;

#[test]
fn test_store_duplicate_maps_to_field_error() {
    let err = AppError::from(StoreError::Duplicate(UniqueField::Username));
    assert!(matches!(err, AppError::Duplicate(ref f) if f == &vec![UniqueField::Username]));
}

#[test]
fn test_store_fault_maps_to_store_error() {
    let err = AppError::from(StoreError::Timeout("find_by_email"));
    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_internal_error_hides_detail() {
    let err = AppError::Internal(anyhow::anyhow!("db password is hunter2"));
    let response = err.into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["form"][0], "Something went wrong");
    assert!(!body.to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_single_field_error() {
    let response = AppError::field("email", "Invalid email address").into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"errors": {"email": ["Invalid email address"]}})
    );
}
