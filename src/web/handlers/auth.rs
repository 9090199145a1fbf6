use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use tracing::info;

use super::public_user;
use crate::core::Value;
use crate::query::Insert;
use crate::web::{
    auth::{AuthUser, ROLE_CUSTOMER, hash_password, verify_password},
    error::{AppError, AppResult},
    models::{ApiResponse, AuthResponse, LoginRequest, RegisterRequest},
    state::AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let email = normalize_email(&payload.email)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name must not be blank"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::validation(
            "password must be at least 6 characters",
        ));
    }

    let existing = state
        .store
        .get_one("SELECT * FROM users WHERE email = ?", &[Value::Text(email.clone())])
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict("email already registered"));
    }

    let password_hash = hash_password(payload.password, state.bcrypt_cost).await?;
    let id = state
        .store
        .insert(
            Insert::into("users")
                .value("email", email.as_str())
                .value("password_hash", password_hash)
                .value("name", name)
                .value("role", ROLE_CUSTOMER)
                .value("verification_status", "unverified"),
        )
        .await
        .map_err(|err| {
            if err.is_constraint_violation() {
                AppError::conflict("email already registered")
            } else {
                err.into()
            }
        })?;

    state
        .store
        .insert(
            Insert::into("notification_preferences")
                .value("user_id", id.clone())
                .value("email_orders", true)
                .value("email_promotions", false)
                .value("sms_orders", false),
        )
        .await?;

    let user = state
        .store
        .find_by_id("users", &id)
        .await?
        .ok_or_else(|| AppError::internal("registered user vanished"))?;
    let token = state.tokens.issue(id, &email, ROLE_CUSTOMER)?;
    info!(email = %email, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(AuthResponse {
            token,
            user: public_user(user),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let email = payload.email.trim().to_ascii_lowercase();
    let user = state
        .store
        .get_one("SELECT * FROM users WHERE email = ?", &[Value::Text(email.clone())])
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid email or password"))?;

    let hash = user.get_str("password_hash").unwrap_or_default().to_string();
    if !verify_password(payload.password, hash).await? {
        return Err(AppError::unauthorized("invalid email or password"));
    }

    let id = user
        .id()
        .cloned()
        .ok_or_else(|| AppError::internal("user record has no identifier"))?;
    let role = user.get_str("role").unwrap_or(ROLE_CUSTOMER).to_string();
    let token = state.tokens.issue(id, &email, &role)?;

    Ok(Json(ApiResponse::new(AuthResponse {
        token,
        user: public_user(user),
    })))
}

pub async fn verify(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let user = state
        .store
        .find_by_id("users", &claims.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    Ok(Json(ApiResponse::new(serde_json::json!({
        "valid": true,
        "user": public_user(user),
    }))))
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::validation("email is not valid"));
    }
    Ok(email)
}
