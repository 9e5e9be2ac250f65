use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{Method, StatusCode, Uri},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::ledger::InventoryLedger;
use crate::lifecycle::OrderLifecycle;
use crate::statistics::StatisticsAggregator;
use crate::store::OrderStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub lifecycle: OrderLifecycle,
    pub ledger: InventoryLedger,
    pub statistics: StatisticsAggregator,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            lifecycle: OrderLifecycle::new(store.clone()),
            ledger: InventoryLedger::new(store.clone()),
            statistics: StatisticsAggregator::new(store),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct StockUpdateRequest {
    #[serde(default)]
    pub stock: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct DecrementRequest {
    #[serde(default)]
    pub amount: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(err: CoreError) -> ApiError {
    let status = match &err {
        CoreError::Validation(_) | CoreError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (status, Json(ErrorResponse { error: err.to_string() }))
}

/// Unreadable bodies are malformed input.
fn body<T>(extracted: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    extracted
        .map(|Json(value)| value)
        .map_err(|rejection| api_error(CoreError::Validation(rejection.body_text())))
}

/// An id that cannot be parsed names no row.
fn id<T>(extracted: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    extracted
        .map(|Path(value)| value)
        .map_err(|rejection| api_error(CoreError::NotFound(rejection.body_text())))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/menus", get(list_menus))
        .route("/api/menus/:menu_id", get(get_menu))
        .route("/api/orders", post(create_order).get(list_orders))
        .route("/api/orders/statistics", get(order_statistics))
        .route("/api/orders/:order_id/status", put(update_order_status))
        .route("/api/inventory", get(list_inventory))
        .route("/api/inventory/:menu_id", put(set_stock))
        .route("/api/inventory/:menu_id/decrement", post(decrement_stock))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Coffee counter order service",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
    }))
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Cannot {} {}", method, uri.path()),
        }),
    )
}

pub async fn list_menus(State(state): State<AppState>) -> ApiResult<Vec<CatalogItem>> {
    state.catalog.list().await.map(Json).map_err(api_error)
}

pub async fn get_menu(
    State(state): State<AppState>,
    menu_id: Result<Path<i32>, PathRejection>,
) -> ApiResult<CatalogItem> {
    let menu_id = id(menu_id)?;
    state.catalog.lookup(menu_id).await.map(Json).map_err(api_error)
}

pub async fn create_order(
    State(state): State<AppState>,
    request: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let request = body(request)?;
    let order = state.lifecycle.create_order(request).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(State(state): State<AppState>) -> ApiResult<Vec<Order>> {
    state.lifecycle.list_orders().await.map(Json).map_err(api_error)
}

pub async fn order_statistics(State(state): State<AppState>) -> ApiResult<OrderStatistics> {
    state.statistics.current().await.map(Json).map_err(api_error)
}

pub async fn update_order_status(
    State(state): State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
    request: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> ApiResult<OrderSummary> {
    let order_id = id(order_id)?;
    let request = body(request)?;
    let status = request.status.as_str().unwrap_or_default();
    state
        .lifecycle
        .set_order_status(order_id, status)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn list_inventory(State(state): State<AppState>) -> ApiResult<Vec<InventoryRecord>> {
    state.ledger.list().await.map(Json).map_err(api_error)
}

pub async fn set_stock(
    State(state): State<AppState>,
    menu_id: Result<Path<i32>, PathRejection>,
    request: Result<Json<StockUpdateRequest>, JsonRejection>,
) -> ApiResult<InventoryRecord> {
    let menu_id = id(menu_id)?;
    let request = body(request)?;
    let stock = whole_number(&request.stock, "stock").map_err(api_error)?;
    state.ledger.set_stock(menu_id, stock).await.map(Json).map_err(api_error)
}

pub async fn decrement_stock(
    State(state): State<AppState>,
    menu_id: Result<Path<i32>, PathRejection>,
    request: Result<Json<DecrementRequest>, JsonRejection>,
) -> ApiResult<InventoryRecord> {
    let menu_id = id(menu_id)?;
    let request = body(request)?;
    let amount = whole_number(&request.amount, "amount").map_err(api_error)?;
    state.ledger.decrement(menu_id, amount).await.map(Json).map_err(api_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let state = AppState::new(Arc::new(InMemoryStore::new()));
        state.catalog.seed_defaults().await.unwrap();
        create_router(state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn cart() -> Value {
        json!({
            "items": [
                {"menuId": 1, "menuName": "Americano (Ice)", "quantity": 2, "price": 4500, "options": ["Extra shot"]},
                {"menuId": 2, "menuName": "Americano (Hot)", "quantity": 1, "price": 4000}
            ],
            "totalAmount": 13000
        })
    }

    #[tokio::test]
    async fn order_round_trip_over_http() {
        let app = app().await;

        let (status, order) = call(&app, "POST", "/api/orders", Some(cart())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "pending");
        assert_eq!(order["totalAmount"], 13000);
        assert_eq!(order["items"][0]["options"], json!(["Extra shot"]));
        assert_eq!(order["items"][1]["options"], json!([]));

        let id = order["id"].as_str().unwrap().to_string();
        let (status, summary) = call(
            &app,
            "PUT",
            &format!("/api/orders/{}/status", id),
            Some(json!({"status": "completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["status"], "completed");
        assert!(summary.get("items").is_none());

        let (_, inventory) = call(&app, "GET", "/api/inventory", None).await;
        assert_eq!(inventory[0], json!({"menuId": 1, "menuName": "Americano (Ice)", "stock": 8}));
        assert_eq!(inventory[1]["stock"], 9);

        let (_, stats) = call(&app, "GET", "/api/orders/statistics", None).await;
        assert_eq!(stats, json!({"total": 1, "received": 0, "inProgress": 0, "completed": 1}));
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let app = app().await;

        let (status, body) = call(&app, "POST", "/api/orders", Some(json!({"items": [], "totalAmount": 0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());

        let mut bad_total = cart();
        bad_total["totalAmount"] = json!("13000");
        let (status, _) = call(&app, "POST", "/api/orders", Some(bad_total)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, order) = call(&app, "POST", "/api/orders", Some(cart())).await;
        let uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());
        let (status, _) = call(&app, "PUT", &uri, Some(json!({"status": "shipped"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "PUT", &uri, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/api/orders/{}/status", Uuid::new_v4());
        let (status, _) = call(&app, "PUT", &missing, Some(json!({"status": "received"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "PUT", "/api/inventory/1", Some(json!({"stock": -3}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "PUT", "/api/inventory/99", Some(json!({"stock": 3}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, "GET", "/api/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Cannot GET /api/nowhere");
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected_as_bad_requests() {
        let app = app().await;

        let mut not_a_list = cart();
        not_a_list["items"] = json!("latte");
        let mut no_name = cart();
        no_name["items"][0].as_object_mut().unwrap().remove("menuName");
        let mut fractional = cart();
        fractional["items"][0]["quantity"] = json!(1.5);

        for malformed in [not_a_list, no_name, fractional] {
            let (status, body) = call(&app, "POST", "/api/orders", Some(malformed)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().starts_with("validation failed"));
        }
        let (_, orders) = call(&app, "GET", "/api/orders", None).await;
        assert_eq!(orders, json!([]));

        let (status, body) = call(&app, "PUT", "/api/inventory/1", Some(json!("three"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        let (status, _) = call(&app, "POST", "/api/inventory/1/decrement", Some(json!("two"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unparseable_ids_are_not_found() {
        let app = app().await;

        let (status, body) = call(
            &app,
            "PUT",
            "/api/orders/not-a-uuid/status",
            Some(json!({"status": "received"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().starts_with("not found"));

        let (status, body) = call(&app, "GET", "/api/menus/latte", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
        let (status, _) = call(&app, "PUT", "/api/inventory/latte", Some(json!({"stock": 3}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inventory_endpoints_update_and_floor() {
        let app = app().await;

        let (status, record) = call(&app, "PUT", "/api/inventory/3", Some(json!({"stock": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record, json!({"menuId": 3, "menuName": "Caffe Latte", "stock": 3}));

        let (status, record) = call(&app, "POST", "/api/inventory/3/decrement", Some(json!({"amount": 5}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["stock"], 0);
    }

    #[tokio::test]
    async fn menus_are_listed_with_options() {
        let app = app().await;

        let (status, menus) = call(&app, "GET", "/api/menus", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(menus.as_array().unwrap().len(), 6);
        assert_eq!(menus[0]["options"][0], json!({"id": 1, "name": "Extra shot", "price": 500}));

        let (status, _) = call(&app, "GET", "/api/menus/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, health) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");
    }
}
