use axum::{Json, extract::State};
use tracing::info;

use super::public_user;
use crate::core::{Record, Value};
use crate::query::{Condition, CREATED_AT, Insert, Select};
use crate::web::{
    auth::{AuthUser, Claims},
    error::{AppError, AppResult},
    models::{
        ApiResponse, NotificationPreferences, UpdateNotificationsRequest, UpdateProfileRequest,
    },
    state::AppState,
};

pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<Record>>> {
    let user = current_user(&state, &claims).await?;
    Ok(Json(ApiResponse::new(public_user(user))))
}

pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Record>>> {
    if let Some(name) = payload.name.as_deref()
        && name.trim().is_empty()
    {
        return Err(AppError::validation("name must not be blank"));
    }

    let assignments = payload.into_assignments();
    if assignments.is_empty() {
        return Err(AppError::validation("at least one field must be provided"));
    }
    if !state
        .store
        .update_by_id("users", &claims.id, assignments)
        .await?
    {
        return Err(AppError::not_found("user not found"));
    }

    let user = current_user(&state, &claims).await?;
    Ok(Json(ApiResponse::new(public_user(user))))
}

/// Stores the submitted documents verbatim and marks the account as awaiting review.
pub async fn submit_verification(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<ApiResponse<Record>>> {
    if !payload.is_object() {
        return Err(AppError::validation("verification data must be an object"));
    }

    let updated = state
        .store
        .update_by_id(
            "users",
            &claims.id,
            vec![
                ("verification_status".to_string(), Value::from("pending")),
                (
                    "verification_data".to_string(),
                    Value::Text(payload.to_string()),
                ),
            ],
        )
        .await?;
    if !updated {
        return Err(AppError::not_found("user not found"));
    }
    info!(user = %claims.id, "verification submitted");

    let user = current_user(&state, &claims).await?;
    Ok(Json(ApiResponse::new(public_user(user))))
}

pub async fn get_notifications(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<NotificationPreferences>>> {
    let preferences = stored_preferences(&state, &claims.id)
        .await?
        .map(|record| NotificationPreferences::from_record(&record))
        .unwrap_or_default();
    Ok(Json(ApiResponse::new(preferences)))
}

pub async fn update_notifications(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<UpdateNotificationsRequest>,
) -> AppResult<Json<ApiResponse<NotificationPreferences>>> {
    let stored = stored_preferences(&state, &claims.id).await?;
    let current = stored
        .as_ref()
        .map(NotificationPreferences::from_record)
        .unwrap_or_default();
    let preferences = current.apply(payload);

    // keyed on user_id, so both stores replace the existing row in place
    let mut upsert = Insert::into("notification_preferences")
        .or_replace()
        .value("user_id", claims.id.clone())
        .value("email_orders", preferences.email_orders)
        .value("email_promotions", preferences.email_promotions)
        .value("sms_orders", preferences.sms_orders);
    if let Some(created_at) = stored.as_ref().and_then(|r| r.get(CREATED_AT)) {
        upsert.set(CREATED_AT, created_at.clone());
    }
    state.store.insert(upsert).await?;

    Ok(Json(ApiResponse::new(preferences)))
}

async fn current_user(state: &AppState, claims: &Claims) -> AppResult<Record> {
    state
        .store
        .find_by_id("users", &claims.id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn stored_preferences(state: &AppState, user_id: &Value) -> AppResult<Option<Record>> {
    let record = state
        .store
        .find_one(
            Select::from("notification_preferences")
                .filter(Condition::eq("user_id", user_id.clone())),
        )
        .await?;
    Ok(record)
}
