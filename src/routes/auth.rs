// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, registration, logout and Google sign-in routes.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{clear_session_cookie, create_session};
use crate::services::oauth::{self, CallbackOutcome, CallbackParams, FailureReason};
use crate::validation::{safe_redirect, LoginForm, RegisterForm, DEFAULT_REDIRECT};
use crate::AppState;

/// Where failed sign-ins are sent.
const LOGIN_PATH: &str = "/login";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", get(logout).post(logout))
        .route("/auth/google", get(google_callback).post(google_start))
}

/// Password login.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Form(form), _): WithRejection<Form<LoginForm>, AppError>,
) -> Result<(CookieJar, Redirect)> {
    let input = form.validate().map_err(AppError::Validation)?;

    let user = state
        .credentials
        .verify_login(&input.username_or_email, &input.password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    create_session(&state, jar, user.id, input.remember, &input.redirect_to)
}

/// Account registration; signs the new user in with a browser session.
async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Form(form), _): WithRejection<Form<RegisterForm>, AppError>,
) -> Result<(CookieJar, Redirect)> {
    let input = form.validate().map_err(AppError::Validation)?;
    let user = state.credentials.register(&input).await?;

    create_session(&state, jar, user.id, false, &input.redirect_to)
}

/// Clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.add(clear_session_cookie(state.config.secure_cookies()));
    (jar, Redirect::to(DEFAULT_REDIRECT))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleStartForm {
    redirect_to: Option<String>,
}

/// Start Google sign-in: sign the destination into `state` and hand off.
async fn google_start(
    State(state): State<Arc<AppState>>,
    WithRejection(Form(form), _): WithRejection<Form<GoogleStartForm>, AppError>,
) -> Result<Redirect> {
    let redirect_to = safe_redirect(form.redirect_to.as_deref());
    let oauth_state = oauth::sign_state(&redirect_to, state.session_keys.oauth_state_key())?;

    tracing::info!(redirect_to = %redirect_to, "Starting Google sign-in");

    Ok(Redirect::to(&state.oauth.authorization_url(&oauth_state)))
}

/// Google redirects back here with `code` and `state`, or with `error`.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    params: std::result::Result<Query<CallbackParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Malformed Google callback");
            return login_redirect(&FailureReason::InvalidState).into_response();
        }
    };

    let outcome = oauth::handle_callback(
        state.oauth.as_ref(),
        state.users.as_ref(),
        state.session_keys.oauth_state_key(),
        params,
    )
    .await;

    match outcome {
        CallbackOutcome::Session { user, redirect_to } => {
            match create_session(&state, jar, user.id, true, &redirect_to) {
                Ok(response) => response.into_response(),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to issue session after Google sign-in");
                    login_redirect(&FailureReason::ProvisioningFailed).into_response()
                }
            }
        }
        CallbackOutcome::Failed(reason) => login_redirect(&reason).into_response(),
    }
}

fn login_redirect(reason: &FailureReason) -> Redirect {
    match reason.user_message() {
        Some(message) => Redirect::to(&format!(
            "{}?error={}",
            LOGIN_PATH,
            urlencoding::encode(message)
        )),
        None => Redirect::to(LOGIN_PATH),
    }
}
