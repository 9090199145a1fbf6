pub mod admin;
pub mod auth;
pub mod orders;
pub mod products;
pub mod users;

use axum::{Json, extract::State};
use serde_json::json;

use super::models::ApiResponse;
use super::state::AppState;
use crate::core::{Record, Value};

pub async fn healthcheck(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::new(json!({
        "status": "ok",
        "backend": state.store.backend().to_string(),
    })))
}

/// Path identifiers are integers for SQLite and ObjectId hex for MongoDB.
pub(crate) fn path_id(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::Integer)
        .unwrap_or_else(|_| Value::Text(raw.to_string()))
}

/// User record without credentials.
pub(crate) fn public_user(mut record: Record) -> Record {
    record.remove("password_hash");
    record
}

/// Grouping key for identifiers that may be integers or text.
pub(crate) fn id_key(value: &Value) -> String {
    value.to_string()
}
