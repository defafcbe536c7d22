// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Behavior when the user store is unavailable.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{body_json, form_post, get_with_cookie, set_cookie_headers};

#[tokio::test]
async fn test_login_store_fault_is_generic_500() {
    let app = common::create_failing_app();

    let response = app
        .oneshot(form_post(
            "/login",
            &[("usernameOrEmail", "alice"), ("password", "longenough")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie_headers(&response).is_empty());
    assert_eq!(
        body_json(response).await,
        json!({"errors": {"form": ["Something went wrong"]}})
    );
}

#[tokio::test]
async fn test_register_store_fault_is_generic_500() {
    let app = common::create_failing_app();

    let response = app
        .oneshot(form_post(
            "/register",
            &[
                ("email", "a@x.com"),
                ("username", "alice"),
                ("password", "longenough"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({"errors": {"form": ["Something went wrong"]}})
    );
}

#[tokio::test]
async fn test_validation_runs_before_store() {
    let app = common::create_failing_app();

    let response = app
        .oneshot(form_post("/login", &[("usernameOrEmail", "alice")]))
        .await
        .unwrap();

    // The failing store is never reached.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"errors": {"password": ["Password is required"]}})
    );
}

#[tokio::test]
async fn test_session_lookup_fault_is_no_user() {
    let (healthy, _, _) = common::create_test_app();
    let cookie = common::register_alice(&healthy).await;

    // Same secret, so the cookie verifies; the lookup then faults.
    let app = common::create_failing_app();
    let response = app
        .oneshot(get_with_cookie("/api/me", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
