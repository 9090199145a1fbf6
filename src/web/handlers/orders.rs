use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use super::path_id;
use crate::core::{Record, Value};
use crate::facade::StoreFacade;
use crate::query::{Condition, Insert, Select, SortDirection, Update};
use crate::web::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{ApiResponse, CreateOrderRequest, ORDER_STATUSES, OrderDetail, UpdateOrderStatusRequest},
    state::AppState,
};

pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Record>>>> {
    let mut select = Select::from("orders").order_by("created_at", SortDirection::Desc);
    if !claims.is_admin() {
        select = select.filter(Condition::eq("user_id", claims.id.clone()));
    }
    let orders = state.store.find(select).await?;
    Ok(Json(ApiResponse::new(orders)))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let id = path_id(&id);
    let order = state
        .store
        .find_by_id("orders", &id)
        .await?
        .ok_or_else(|| AppError::not_found("order not found"))?;

    if !claims.is_admin() && order.get("user_id") != Some(&claims.id) {
        return Err(AppError::forbidden("order belongs to another customer"));
    }

    let items = order_items(&state.store, &id).await?;
    Ok(Json(ApiResponse::new(OrderDetail { order, items })))
}

pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderDetail>>)> {
    if payload.items.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }

    let mut lines = Vec::with_capacity(payload.items.len());
    let mut total = 0.0;
    for item in &payload.items {
        if item.quantity < 1 {
            return Err(AppError::validation("quantity must be at least 1"));
        }
        let product_id = normalize_reference(&item.product_id);
        let product = state
            .store
            .find_by_id("products", &product_id)
            .await?
            .ok_or_else(|| AppError::validation(format!("unknown product {product_id}")))?;
        if !product.get("active").is_some_and(Value::to_flag) {
            return Err(AppError::validation(format!(
                "product {product_id} is not available"
            )));
        }

        let unit_price = product.get_f64("price").unwrap_or(0.0);
        total += unit_price * item.quantity as f64;
        lines.push(OrderLine {
            product_id,
            product_name: product.get_str("name").unwrap_or_default().to_string(),
            quantity: item.quantity,
            unit_price,
        });
    }
    let total = round_cents(total);

    let order_id = state
        .store
        .insert(
            Insert::into("orders")
                .value("user_id", claims.id.clone())
                .value("status", "pending")
                .value("total", total)
                .value("shipping_address", payload.shipping_address)
                .value("notes", payload.notes),
        )
        .await?;

    for line in lines {
        state
            .store
            .insert(
                Insert::into("order_items")
                    .value("order_id", order_id.clone())
                    .value("product_id", line.product_id)
                    .value("product_name", line.product_name)
                    .value("quantity", line.quantity)
                    .value("unit_price", line.unit_price),
            )
            .await?;
    }

    let order = state
        .store
        .find_by_id("orders", &order_id)
        .await?
        .ok_or_else(|| AppError::internal("created order vanished"))?;
    let items = order_items(&state.store, &order_id).await?;
    info!(order = %order_id, total, "order placed");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(OrderDetail { order, items })),
    ))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Record>>> {
    claims.require_admin()?;

    let status = payload.status.trim().to_ascii_lowercase();
    if !ORDER_STATUSES.contains(&status.as_str()) {
        return Err(AppError::validation(format!(
            "status must be one of {}",
            ORDER_STATUSES.join(", ")
        )));
    }

    let id = path_id(&id);
    let result = state
        .store
        .update(
            Update::table("orders")
                .set("status", status.as_str())
                .filter(Condition::id(id.clone())),
        )
        .await?;
    if result.changes == 0 {
        return Err(AppError::not_found("order not found"));
    }

    let order = state
        .store
        .find_by_id("orders", &id)
        .await?
        .ok_or_else(|| AppError::not_found("order not found"))?;
    info!(order = %id, status = %status, "order status changed");
    Ok(Json(ApiResponse::new(order)))
}

struct OrderLine {
    product_id: Value,
    product_name: String,
    quantity: i64,
    unit_price: f64,
}

pub(crate) async fn order_items(store: &StoreFacade, order_id: &Value) -> AppResult<Vec<Record>> {
    let items = store
        .find(
            Select::from("order_items")
                .filter(Condition::eq("order_id", order_id.clone()))
                .order_by("id", SortDirection::Asc),
        )
        .await?;
    Ok(items)
}

/// Product references arrive as JSON numbers or strings; numeric strings address SQLite rows.
fn normalize_reference(raw: &Value) -> Value {
    match raw {
        Value::Text(text) => path_id(text.trim()),
        Value::Float(f) if f.fract() == 0.0 => Value::Integer(*f as i64),
        other => other.clone(),
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_round_to_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(19.999), 20.0);
        assert_eq!(round_cents(3.0 * 4.35), 13.05);
    }

    #[test]
    fn references_are_normalized() {
        assert_eq!(normalize_reference(&Value::Text(" 7 ".into())), Value::Integer(7));
        assert_eq!(normalize_reference(&Value::Float(3.0)), Value::Integer(3));
        assert_eq!(
            normalize_reference(&Value::Text("65f0c0ffee0000000000beef".into())),
            Value::Text("65f0c0ffee0000000000beef".into())
        );
    }
}
