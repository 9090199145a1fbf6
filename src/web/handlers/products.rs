use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;

use super::path_id;
use crate::core::{Record, Value};
use crate::query::Insert;
use crate::web::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{ApiResponse, CreateProductRequest, ProductQuery, UpdateProductRequest},
    state::AppState,
};

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<Vec<Record>>>> {
    let (sql, params) = product_listing_sql(&query)?;
    let products = state.store.get_many(&sql, &params).await?;
    Ok(Json(ApiResponse::new(products)))
}

/// Catalog listing as one literal statement; both stores accept this grammar.
fn product_listing_sql(query: &ProductQuery) -> AppResult<(String, Vec<Value>)> {
    let mut sql = String::from("SELECT * FROM products WHERE 1=1");
    let mut params = Vec::new();

    match query.active.as_deref().map(str::trim) {
        None | Some("") | Some("1") | Some("true") => {
            sql.push_str(" AND active = ?");
            params.push(Value::Integer(1));
        }
        Some("0") | Some("false") => {
            sql.push_str(" AND active = ?");
            params.push(Value::Integer(0));
        }
        Some("all") => {}
        Some(other) => {
            return Err(AppError::validation(format!(
                "active must be one of 1, 0, true, false, all (got '{other}')"
            )));
        }
    }

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        sql.push_str(" AND category = ?");
        params.push(Value::Text(category.to_string()));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", strip_like_wildcards(search));
        sql.push_str(" AND (name LIKE ? OR description LIKE ?)");
        params.push(Value::Text(pattern.clone()));
        params.push(Value::Text(pattern));
    }

    sql.push_str(" ORDER BY created_at DESC");
    Ok((sql, params))
}

/// Removes `%` and `_` from search text, so "50%" searches for "50".
fn strip_like_wildcards(search: &str) -> String {
    search.chars().filter(|c| !matches!(c, '%' | '_')).collect()
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Record>>> {
    let product = state
        .store
        .find_by_id("products", &path_id(&id))
        .await?
        .ok_or_else(|| AppError::not_found("product not found"))?;
    Ok(Json(ApiResponse::new(product)))
}

pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Record>>)> {
    claims.require_admin()?;

    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name must not be blank"));
    }
    validate_price(payload.price)?;
    validate_stock(payload.stock)?;

    let id = state
        .store
        .insert(
            Insert::into("products")
                .value("name", name)
                .value("description", payload.description)
                .value("price", payload.price)
                .value("category", payload.category)
                .value("image_url", payload.image_url)
                .value("stock", payload.stock.unwrap_or(0))
                .value("active", payload.active.unwrap_or(true)),
        )
        .await?;

    let product = state
        .store
        .find_by_id("products", &id)
        .await?
        .ok_or_else(|| AppError::internal("created product vanished"))?;
    info!(id = %id, "product created");

    Ok((StatusCode::CREATED, Json(ApiResponse::new(product))))
}

pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Record>>> {
    claims.require_admin()?;

    if let Some(name) = payload.name.as_deref()
        && name.trim().is_empty()
    {
        return Err(AppError::validation("name must not be blank"));
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
    }
    validate_stock(payload.stock)?;

    let assignments = payload.into_assignments();
    if assignments.is_empty() {
        return Err(AppError::validation("at least one field must be provided"));
    }

    let id = path_id(&id);
    if !state.store.update_by_id("products", &id, assignments).await? {
        return Err(AppError::not_found("product not found"));
    }

    let product = state
        .store
        .find_by_id("products", &id)
        .await?
        .ok_or_else(|| AppError::not_found("product not found"))?;
    Ok(Json(ApiResponse::new(product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    if !state.store.delete_by_id("products", &path_id(&id)).await? {
        return Err(AppError::not_found("product not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn validate_price(price: f64) -> AppResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(())
}

fn validate_stock(stock: Option<i64>) -> AppResult<()> {
    if let Some(stock) = stock
        && stock < 0
    {
        return Err(AppError::validation("stock must not be negative"));
    }
    Ok(())
}
