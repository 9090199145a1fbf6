use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use http::Method;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::error::expose_error_details;
use super::handlers::{admin, auth, healthcheck, orders, products, users};
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", get(auth::verify))
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/status", patch(orders::update_order_status))
        .route("/api/users/me", get(users::me).put(users::update_me))
        .route(
            "/api/users/me/verification",
            post(users::submit_verification),
        )
        .route(
            "/api/users/me/notifications",
            get(users::get_notifications).put(users::update_notifications),
        )
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/settings", get(admin::list_settings))
        .route("/api/admin/settings/:key", put(admin::put_setting))
        .route("/api/admin/orders", get(admin::orders))
        .layer(from_fn_with_state(state.clone(), expose_error_details))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ]),
        )
        .with_state(state)
}
