use std::collections::{BTreeMap, HashMap};

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{Duration, Utc};
use tracing::info;

use super::id_key;
use crate::core::{Record, Value, format_timestamp};
use crate::query::{CREATED_AT, CompareOp, Condition, Filter, Select, SortDirection};
use crate::web::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{AdminStats, ApiResponse, OrderDetail, PeriodStats, UpdateSettingRequest},
    state::AppState,
};

pub async fn stats(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<AdminStats>>> {
    claims.require_admin()?;

    let now = Utc::now();
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    let week_start = now - Duration::days(7);

    let daily = period_stats(&state, &format_timestamp(day_start)).await?;
    let weekly = period_stats(&state, &format_timestamp(week_start)).await?;
    let users = state.store.count("users", Filter::new()).await?;
    let products = state.store.count("products", Filter::new()).await?;

    Ok(Json(ApiResponse::new(AdminStats {
        daily,
        weekly,
        users,
        products,
    })))
}

/// Orders placed since `since`; cancelled orders count toward neither figure.
async fn period_stats(state: &AppState, since: &str) -> AppResult<PeriodStats> {
    let orders = state
        .store
        .find(
            Select::from("orders")
                .filter(Condition::compare(CREATED_AT, CompareOp::GtEq, since))
                .filter(Condition::compare("status", CompareOp::NotEq, "cancelled")),
        )
        .await?;

    let revenue: f64 = orders.iter().filter_map(|o| o.get_f64("total")).sum();
    Ok(PeriodStats {
        orders: orders.len() as u64,
        revenue: (revenue * 100.0).round() / 100.0,
    })
}

pub async fn list_settings(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<BTreeMap<String, Value>>>> {
    claims.require_admin()?;

    let settings = state
        .store
        .get_many("SELECT setting_key, setting_value FROM admin_settings", &[])
        .await?
        .into_iter()
        .filter_map(|record| {
            let key = record.get_str("setting_key")?.to_string();
            let value = record.get("setting_value").cloned().unwrap_or(Value::Null);
            Some((key, value))
        })
        .collect();
    Ok(Json(ApiResponse::new(settings)))
}

pub async fn put_setting(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(key): Path<String>,
    Json(payload): Json<UpdateSettingRequest>,
) -> AppResult<Json<ApiResponse<Record>>> {
    claims.require_admin()?;

    let key = key.trim().to_string();
    if key.is_empty() {
        return Err(AppError::validation("setting key must not be blank"));
    }
    let value = match payload.value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    };

    state
        .store
        .run(
            "INSERT OR REPLACE INTO admin_settings (setting_key, setting_value) VALUES (?, ?)",
            &[Value::Text(key.clone()), Value::Text(value)],
        )
        .await?;

    let setting = state
        .store
        .get_one(
            "SELECT * FROM admin_settings WHERE setting_key = ?",
            &[Value::Text(key.clone())],
        )
        .await?
        .ok_or_else(|| AppError::internal("stored setting vanished"))?;
    info!(key = %key, "admin setting saved");
    Ok(Json(ApiResponse::new(setting)))
}

pub async fn orders(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<OrderDetail>>>> {
    claims.require_admin()?;

    let orders = state
        .store
        .find(Select::from("orders").order_by(CREATED_AT, SortDirection::Desc))
        .await?;
    let mut items_by_order: HashMap<String, Vec<Record>> = HashMap::new();
    for item in state
        .store
        .find(Select::from("order_items").order_by("id", SortDirection::Asc))
        .await?
    {
        if let Some(order_id) = item.get("order_id") {
            items_by_order
                .entry(id_key(order_id))
                .or_default()
                .push(item);
        }
    }

    let details = orders
        .into_iter()
        .map(|order| {
            let items = order
                .id()
                .and_then(|id| items_by_order.remove(&id_key(id)))
                .unwrap_or_default();
            OrderDetail { order, items }
        })
        .collect();
    Ok(Json(ApiResponse::new(details)))
}
