// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Form input validation.
//!
//! Raw forms deserialize with every field optional so that a missing field
//! becomes a field error instead of an extractor rejection. Validation runs
//! before any store access and returns the messages keyed by the form field
//! name (`usernameOrEmail`, `redirectTo`, ...). Market query errors are
//! keyed by the query parameter name.

use crate::error::FieldErrors;
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

/// Destination used when no (or an unsafe) `redirectTo` is supplied.
pub const DEFAULT_REDIRECT: &str = "/";

pub const DEFAULT_VS_CURRENCY: &str = "usd";
pub const DEFAULT_PER_PAGE: u32 = 10;
pub const DEFAULT_CHART_DAYS: u32 = 30;

/// Raw login form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub username_or_email: Option<String>,
    pub password: Option<String>,
    pub redirect_to: Option<String>,
    pub remember: Option<String>,
}

/// Validated login input.
#[derive(Debug, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, message = "Username or email is required"))]
    pub username_or_email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub redirect_to: String,
    pub remember: bool,
}

impl LoginForm {
    pub fn validate(self) -> Result<LoginInput, FieldErrors> {
        let input = LoginInput {
            username_or_email: self.username_or_email.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
            redirect_to: safe_redirect(self.redirect_to.as_deref()),
            remember: is_checked(self.remember.as_deref()),
        };
        input.validate().map_err(|e| field_errors(&e, to_camel_case))?;
        Ok(input)
    }
}

/// Raw registration form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub redirect_to: Option<String>,
}

/// Validated registration input.
#[derive(Debug, Validate)]
pub struct RegisterInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(
        length(
            min = 1,
            max = 64,
            message = "Username is required and must be at most 64 characters"
        ),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password must be between 8 and 128 characters"
    ))]
    pub password: String,
    pub redirect_to: String,
}

impl RegisterForm {
    pub fn validate(self) -> Result<RegisterInput, FieldErrors> {
        let input = RegisterInput {
            email: normalize_email(&self.email.unwrap_or_default()),
            username: self.username.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
            redirect_to: safe_redirect(self.redirect_to.as_deref()),
        };
        input.validate().map_err(|e| field_errors(&e, to_camel_case))?;
        Ok(input)
    }
}

/// Query for the prices table.
#[derive(Debug, Default, Deserialize)]
pub struct MarketsQuery {
    pub vs_currency: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Validate)]
pub struct MarketsInput {
    #[validate(custom(function = "validate_currency"))]
    pub vs_currency: String,
    #[validate(range(min = 1, max = 100, message = "per_page must be between 1 and 100"))]
    pub per_page: u32,
}

impl MarketsQuery {
    pub fn validate(self) -> Result<MarketsInput, FieldErrors> {
        let input = MarketsInput {
            vs_currency: currency_or_default(self.vs_currency),
            per_page: number_or(self.per_page.as_deref(), DEFAULT_PER_PAGE),
        };
        input.validate().map_err(|e| field_errors(&e, str::to_string))?;
        Ok(input)
    }
}

/// Query for one coin's price history.
#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub vs_currency: Option<String>,
    pub days: Option<String>,
}

#[derive(Debug, Validate)]
pub struct ChartInput {
    #[validate(custom(function = "validate_coin_id"))]
    pub coin_id: String,
    #[validate(custom(function = "validate_currency"))]
    pub vs_currency: String,
    #[validate(range(min = 1, max = 365, message = "days must be between 1 and 365"))]
    pub days: u32,
}

impl ChartQuery {
    pub fn validate(self, coin_id: &str) -> Result<ChartInput, FieldErrors> {
        let input = ChartInput {
            coin_id: coin_id.to_string(),
            vs_currency: currency_or_default(self.vs_currency),
            days: number_or(self.days.as_deref(), DEFAULT_CHART_DAYS),
        };
        input.validate().map_err(|e| field_errors(&e, str::to_string))?;
        Ok(input)
    }
}

fn currency_or_default(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_VS_CURRENCY.to_string())
}

/// Missing means the default; unparseable becomes 0 so the range check reports it.
fn number_or(value: Option<&str>, default: u32) -> u32 {
    match value.map(str::trim) {
        None | Some("") => default,
        Some(raw) => raw.parse().unwrap_or(0),
    }
}

/// Login treats any identifier containing `@` as an email.
fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.contains('@') {
        Err(ValidationError::new("username").with_message("Username must not contain @".into()))
    } else {
        Ok(())
    }
}

fn validate_currency(value: &str) -> Result<(), ValidationError> {
    let ok = (2..=10).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_lowercase());
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("currency")
            .with_message("vs_currency must be 2 to 10 lowercase letters".into()))
    }
}

fn validate_coin_id(value: &str) -> Result<(), ValidationError> {
    let ok = (1..=100).contains(&value.len())
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("coin_id").with_message("Invalid coin id".into()))
    }
}

/// Emails are compared case-insensitively by storing them lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accept only same-site relative paths; anything else falls back to `/`.
///
/// The result always forms a valid `Location` header value.
pub fn safe_redirect(to: Option<&str>) -> String {
    match to.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && path.bytes().all(|b| b.is_ascii_graphic()) =>
        {
            path.to_string()
        }
        _ => DEFAULT_REDIRECT.to_string(),
    }
}

/// HTML checkboxes submit `on`; API clients may send `true`.
fn is_checked(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("on" | "true" | "1"))
}

/// Flatten validator output into messages keyed by `key(field)`.
fn field_errors(errors: &ValidationErrors, key: fn(&str) -> String) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid {}", field))
                })
                .collect();
            (key(&field), messages)
        })
        .collect()
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
