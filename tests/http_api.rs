use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use shopfront::{
    Record, StoreError, StoreFacade,
    bootstrap::seed_admin,
    build_router,
    connection::StoreConfig,
    query::{RunResult, Select, Statement},
    storage::{Backend, Store},
    web::{AppState, auth::TokenService},
};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@shop.io";
const ADMIN_PASSWORD: &str = "admin-pass";

async fn app(config: StoreConfig) -> Router {
    let store = StoreFacade::open(&config).await.expect("store should open");
    store.init().await.expect("schema should apply");
    seed_admin(&store, ADMIN_EMAIL, ADMIN_PASSWORD, 4)
        .await
        .expect("admin should be seeded");

    build_router(AppState::new(store, TokenService::new("test-secret", 7), 4))
}

async fn apps() -> Vec<(&'static str, Router)> {
    vec![
        ("relational", app(StoreConfig::relational_in_memory()).await),
        ("document", app(StoreConfig::document_in_memory()).await),
    ]
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match payload {
        Some(payload) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    if body.is_empty() {
        return (status, Value::Null);
    }

    let json = serde_json::from_slice::<Value>(&body).expect("body should be valid JSON");
    (status, json)
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    payload: Value,
) -> (StatusCode, Value) {
    send(app, method, uri, token, Some(payload)).await
}

async fn send_empty(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value) {
    send(app, method, uri, token, None).await
}

/// Path segment for an identifier that is a number (SQLite) or hex text (MongoDB).
fn segment(id: &Value) -> String {
    match id {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send_json(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn register(app: &Router, email: &str, name: &str) -> String {
    let (status, body) = send_json(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        json!({ "email": email, "password": "secret1", "name": name }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn create_product(app: &Router, admin: &str, payload: Value) -> Value {
    let (status, body) = send_json(app, Method::POST, "/api/products", Some(admin), payload).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn health_reports_backend() {
    for (backend, app) in apps().await {
        let (status, body) = send_empty(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["backend"], backend);
    }
}

#[tokio::test]
async fn register_login_and_verify() {
    for (backend, app) in apps().await {
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": " Ann@Shop.io ", "password": "secret1", "name": "Ann" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{backend}: {body}");
        let user = &body["data"]["user"];
        assert_eq!(user["email"], "ann@shop.io");
        assert_eq!(user["role"], "customer");
        assert!(user.get("password_hash").is_none());
        assert!(user.get("_id").is_none());
        assert!(!user["id"].is_null());

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": "ann@shop.io", "password": "secret1", "name": "Ann" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT, "{backend}");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "email": "bob@shop.io", "password": "123", "name": "Bob" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "ann@shop.io", "password": "wrong" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let token = login(&app, "ann@shop.io", "secret1").await;
        let (status, body) =
            send_empty(&app, Method::GET, "/api/auth/verify", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["valid"], true);
        assert_eq!(body["data"]["user"]["name"], "Ann");

        let (status, _) = send_empty(&app, Method::GET, "/api/auth/verify", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            send_empty(&app, Method::GET, "/api/auth/verify", Some("not-a-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn product_catalog_crud() {
    for (backend, app) in apps().await {
        let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let customer = register(&app, "cat@shop.io", "Cat").await;

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/products",
            Some(&customer),
            json!({ "name": "Hammer", "price": 12.5 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{backend}");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/products",
            Some(&admin),
            json!({ "name": "Broken", "price": -1.0 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let hammer = create_product(
            &app,
            &admin,
            json!({ "name": "Hammer", "description": "Claw hammer", "price": 12.5, "category": "tools", "stock": 3 }),
        )
        .await;
        assert_eq!(hammer["active"], true);
        assert_eq!(hammer["created_at"], hammer["updated_at"]);
        let saw = create_product(
            &app,
            &admin,
            json!({ "name": "Hand Saw", "price": 19.0, "category": "tools" }),
        )
        .await;
        create_product(
            &app,
            &admin,
            json!({ "name": "Old Rake", "price": 5.0, "category": "garden", "active": false }),
        )
        .await;

        let (status, body) = send_empty(&app, Method::GET, "/api/products", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names.len(), 2, "{backend}: {names:?}");
        assert!(!names.contains(&"Old Rake".to_string()));

        let (_, body) = send_empty(&app, Method::GET, "/api/products?active=all", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        let (_, body) = send_empty(&app, Method::GET, "/api/products?active=0", None).await;
        assert_eq!(body["data"][0]["name"], "Old Rake");
        let (_, body) = send_empty(&app, Method::GET, "/api/products?search=CLAW", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["name"], "Hammer");
        let (_, body) =
            send_empty(&app, Method::GET, "/api/products?category=garden", None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
        let (status, _) = send_empty(&app, Method::GET, "/api/products?active=maybe", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/products/{}", segment(&saw["id"]));
        let (status, body) = send_json(
            &app,
            Method::PUT,
            &uri,
            Some(&admin),
            json!({ "price": 21.0, "stock": 8 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["price"], 21.0);
        assert_eq!(body["data"]["stock"], 8);
        assert_eq!(body["data"]["name"], "Hand Saw");

        let (status, _) = send_json(&app, Method::PUT, &uri, Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_empty(&app, Method::DELETE, &uri, Some(&admin)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send_empty(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send_empty(&app, Method::DELETE, &uri, Some(&admin)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/api/products/{}", segment(&hammer["id"]));
        let (status, body) = send_empty(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Hammer");
    }
}

#[tokio::test]
async fn order_lifecycle() {
    for (backend, app) in apps().await {
        let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let ann = register(&app, "ann@shop.io", "Ann").await;
        let bob = register(&app, "bob@shop.io", "Bob").await;

        let hammer = create_product(&app, &admin, json!({ "name": "Hammer", "price": 4.35 })).await;
        let retired = create_product(
            &app,
            &admin,
            json!({ "name": "Retired", "price": 1.0, "active": false }),
        )
        .await;

        let (status, _) =
            send_json(&app, Method::POST, "/api/orders", Some(&ann), json!({ "items": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/orders",
            Some(&ann),
            json!({ "items": [{ "product_id": retired["id"], "quantity": 1 }] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{backend}");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/orders",
            Some(&ann),
            json!({ "items": [{ "product_id": hammer["id"], "quantity": 0 }] }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/orders",
            Some(&ann),
            json!({
                "items": [{ "product_id": hammer["id"], "quantity": 3 }],
                "shipping_address": "1 Main St",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{backend}: {body}");
        let order = body["data"].clone();
        assert_eq!(order["status"], "pending");
        assert_eq!(order["total"], 13.05);
        assert_eq!(order["items"].as_array().unwrap().len(), 1);
        assert_eq!(order["items"][0]["product_name"], "Hammer");
        assert_eq!(order["items"][0]["quantity"], 3);

        let uri = format!("/api/orders/{}", segment(&order["id"]));
        let (status, body) = send_empty(&app, Method::GET, &uri, Some(&ann)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["items"][0]["unit_price"], 4.35);

        let (status, _) = send_empty(&app, Method::GET, &uri, Some(&bob)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{backend}");
        let (status, _) = send_empty(&app, Method::GET, &uri, Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send_empty(&app, Method::GET, "/api/orders", Some(&bob)).await;
        assert!(body["data"].as_array().unwrap().is_empty());
        let (_, body) = send_empty(&app, Method::GET, "/api/orders", Some(&ann)).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let status_uri = format!("{uri}/status");
        let (status, _) = send_json(
            &app,
            Method::PATCH,
            &status_uri,
            Some(&ann),
            json!({ "status": "shipped" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send_json(
            &app,
            Method::PATCH,
            &status_uri,
            Some(&admin),
            json!({ "status": "teleported" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = send_json(
            &app,
            Method::PATCH,
            &status_uri,
            Some(&admin),
            json!({ "status": "shipped" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "shipped");
    }
}

#[tokio::test]
async fn profile_verification_and_notifications() {
    for (backend, app) in apps().await {
        let token = register(&app, "dee@shop.io", "Dee").await;

        let (status, body) = send_empty(&app, Method::GET, "/api/users/me", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verification_status"], "unverified");
        assert!(body["data"].get("password_hash").is_none());

        let (status, body) = send_json(
            &app,
            Method::PUT,
            "/api/users/me",
            Some(&token),
            json!({ "name": "Dee Dee", "phone": "555-0100" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{backend}: {body}");
        assert_eq!(body["data"]["name"], "Dee Dee");
        assert_eq!(body["data"]["phone"], "555-0100");

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/users/me/verification",
            Some(&token),
            json!({ "document": "passport", "number": "X123" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verification_status"], "pending");
        let stored: Value =
            serde_json::from_str(body["data"]["verification_data"].as_str().unwrap()).unwrap();
        assert_eq!(stored["document"], "passport");

        let (status, body) = send_empty(
            &app,
            Method::GET,
            "/api/users/me/notifications",
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({ "email_orders": true, "email_promotions": false, "sms_orders": false })
        );

        let (status, body) = send_json(
            &app,
            Method::PUT,
            "/api/users/me/notifications",
            Some(&token),
            json!({ "sms_orders": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{backend}: {body}");
        assert_eq!(body["data"]["sms_orders"], true);
        assert_eq!(body["data"]["email_orders"], true);

        let (_, body) = send_empty(
            &app,
            Method::GET,
            "/api/users/me/notifications",
            Some(&token),
        )
        .await;
        assert_eq!(body["data"]["sms_orders"], true, "{backend}");
    }
}

#[tokio::test]
async fn admin_dashboard() {
    for (backend, app) in apps().await {
        let admin = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
        let ann = register(&app, "ann@shop.io", "Ann").await;

        let (status, _) = send_empty(&app, Method::GET, "/api/admin/stats", Some(&ann)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let lamp = create_product(&app, &admin, json!({ "name": "Lamp", "price": 10.0 })).await;
        for quantity in [1, 2] {
            let (status, _) = send_json(
                &app,
                Method::POST,
                "/api/orders",
                Some(&ann),
                json!({ "items": [{ "product_id": lamp["id"], "quantity": quantity }] }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send_empty(&app, Method::GET, "/api/admin/stats", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK, "{backend}: {body}");
        assert_eq!(body["data"]["daily"]["orders"], 2);
        assert_eq!(body["data"]["daily"]["revenue"], 30.0);
        assert_eq!(body["data"]["weekly"]["orders"], 2);
        assert_eq!(body["data"]["users"], 2);
        assert_eq!(body["data"]["products"], 1);

        let (_, body) = send_empty(&app, Method::GET, "/api/admin/orders", Some(&admin)).await;
        let orders = body["data"].as_array().unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o["items"].as_array().unwrap().len() == 1));

        let cancel_uri = format!("/api/orders/{}/status", segment(&orders[0]["id"]));
        let (status, _) = send_json(
            &app,
            Method::PATCH,
            &cancel_uri,
            Some(&admin),
            json!({ "status": "cancelled" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send_empty(&app, Method::GET, "/api/admin/stats", Some(&admin)).await;
        assert_eq!(body["data"]["daily"]["orders"], 1, "{backend}");

        let (status, body) = send_json(
            &app,
            Method::PUT,
            "/api/admin/settings/store_name",
            Some(&admin),
            json!({ "value": "Corner Shop" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{backend}: {body}");
        assert_eq!(body["data"]["setting_value"], "Corner Shop");

        let (status, _) = send_json(
            &app,
            Method::PUT,
            "/api/admin/settings/store_name",
            Some(&admin),
            json!({ "value": "Main Street Shop" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send_json(
            &app,
            Method::PUT,
            "/api/admin/settings/free_shipping_over",
            Some(&admin),
            json!({ "value": 50 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send_empty(&app, Method::GET, "/api/admin/settings", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"],
            json!({ "free_shipping_over": "50", "store_name": "Main Street Shop" }),
            "{backend}"
        );
    }
}

/// A store whose every operation fails with a connection error naming the host.
struct UnreachableStore;

#[async_trait]
impl Store for UnreachableStore {
    fn backend(&self) -> Backend {
        Backend::Document
    }

    async fn init(&self) -> shopfront::Result<()> {
        Ok(())
    }

    async fn fetch_one(&self, _select: &Select) -> shopfront::Result<Option<Record>> {
        Err(StoreError::Unavailable("mongodb://secret-host:27017".into()))
    }

    async fn fetch_all(&self, _select: &Select) -> shopfront::Result<Vec<Record>> {
        Err(StoreError::Unavailable("mongodb://secret-host:27017".into()))
    }

    async fn execute(&self, _statement: &Statement) -> shopfront::Result<RunResult> {
        Err(StoreError::Unavailable("mongodb://secret-host:27017".into()))
    }
}

fn unreachable_app(expose_errors: bool) -> Router {
    let mut state = AppState::new(
        StoreFacade::from_store(UnreachableStore),
        TokenService::new("test-secret", 7),
        4,
    );
    state.expose_errors = expose_errors;
    build_router(state)
}

#[tokio::test]
async fn server_errors_follow_each_routers_exposure_setting() {
    let production = unreachable_app(false);
    let development = unreachable_app(true);

    let (status, body) = send_empty(&production, Method::GET, "/api/products", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));

    let (status, body) = send_empty(&development, Method::GET, "/api/products", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"].as_str().unwrap().contains("secret-host"),
        "{body}"
    );

    // Building another router must not change what the first one reveals.
    let _later = unreachable_app(true);
    let (status, body) = send_empty(&production, Method::GET, "/api/products", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.to_string().contains("secret-host"), "{body}");

    let (status, body) = send_empty(&production, Method::GET, "/api/products/abc", None).await;
    assert_ne!(status, StatusCode::OK);
    assert!(!body.to_string().contains("secret-host"), "{body}");
}
