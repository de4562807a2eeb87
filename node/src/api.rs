//! # REST API
//!
//! Builds the axum router that exposes the registry over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! The caller's identity arrives in the `x-caller-id` header; authenticating
//! it is the job of whatever sits in front of the node. Writes live under
//! `/me` because they always act on the caller's own vault. Reads name the
//! vault owner in the path.
//!
//! ## Endpoints
//!
//! | Method | Path                                                  | Operation           |
//! |--------|-------------------------------------------------------|---------------------|
//! | GET    | `/health`                                             | Liveness probe      |
//! | GET    | `/status`                                             | Version and clock   |
//! | PUT    | `/me/vault`                                           | `update_vault`      |
//! | POST   | `/me/assets`                                          | `register_asset`    |
//! | DELETE | `/me/assets/:asset_id`                                | `delete_asset`      |
//! | PUT    | `/me/assets/:asset_id/value`                          | `update_value`      |
//! | PUT    | `/me/assets/:asset_id/details`                        | `update_details`    |
//! | POST   | `/me/assets/:asset_id/thresholds`                     | `create_threshold`  |
//! | PUT    | `/me/assets/:asset_id/thresholds/:threshold_id`       | `set_threshold`     |
//! | DELETE | `/me/assets/:asset_id/thresholds/:threshold_id`       | `delete_threshold`  |
//! | PUT    | `/me/categories/:category_id`                         | `set_category`      |
//! | DELETE | `/me/categories/:category_id`                         | `delete_category`   |
//! | GET    | `/me/viewers`                                         | `list_viewers`      |
//! | PUT    | `/me/viewers/:viewer`                                 | `authorize_viewer`  |
//! | DELETE | `/me/viewers/:viewer`                                 | `revoke_viewer`     |
//! | GET    | `/vaults/:owner`                                      | `get_vault`         |
//! | GET    | `/vaults/:owner/access`                               | `is_authorized`     |
//! | GET    | `/vaults/:owner/categories`                           | `list_categories`   |
//! | GET    | `/vaults/:owner/categories/:category_id`              | `get_category`      |
//! | GET    | `/vaults/:owner/assets`                               | `list_assets`       |
//! | GET    | `/vaults/:owner/assets/:asset_id`                     | `get_asset`         |
//! | GET    | `/vaults/:owner/assets/:asset_id/access`              | `can_view_asset`    |
//! | GET    | `/vaults/:owner/assets/:asset_id/history`             | `history`           |
//! | GET    | `/vaults/:owner/assets/:asset_id/history/:timestamp`  | `value_at`          |
//! | GET    | `/vaults/:owner/assets/:asset_id/thresholds`          | `list_thresholds`   |
//! | GET    | `/vaults/:owner/assets/:asset_id/thresholds/:id`      | `get_threshold`     |
//! | GET    | `/vaults/:owner/assets/:asset_id/evaluate`            | `evaluate`          |

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use assetvault_registry::{
    Asset, AssetDetails, CallContext, Category, Clock, ErrorKind, GrantStatus, LogicalClock,
    Principal, Registry, RegistryError, RegistryResult, SledStore, Threshold, ThresholdId,
    Timestamp, ValuationEvent, Vault,
};

use crate::metrics::{SharedMetrics, OUTCOME_OK};

/// Header carrying the authenticated caller identity.
pub const CALLER_HEADER: &str = "x-caller-id";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The registry. One lock serializes every operation.
    pub registry: Arc<Mutex<Registry<SledStore>>>,
    /// Logical clock stamped onto every call (advanced by the clock task).
    pub clock: Arc<LogicalClock>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Runs one registry operation on behalf of the request's caller.
    ///
    /// Takes the registry lock, then builds the [`CallContext`] from the
    /// caller header and the clock value read under that lock. Stamps
    /// therefore follow the order in which operations run. The outcome is
    /// recorded in `operations_total`.
    fn call<T>(
        &self,
        operation: &'static str,
        headers: &HeaderMap,
        op: impl FnOnce(&Registry<SledStore>, &CallContext) -> RegistryResult<T>,
    ) -> Result<T, ApiError> {
        let caller = caller_from(headers)?;

        let result = {
            let registry = self.registry.lock();
            let ctx = CallContext::at(caller, self.clock.as_ref());
            op(&registry, &ctx)
        };

        let outcome = match &result {
            Ok(_) => OUTCOME_OK,
            Err(err) => err.kind().as_str(),
        };
        self.metrics.record_operation(operation, outcome);
        result.map_err(ApiError::from)
    }
}

/// Extracts the caller identity, rejecting requests without one.
fn caller_from(headers: &HeaderMap) -> Result<Principal, ApiError> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthenticated",
            message: format!("missing {CALLER_HEADER} header"),
        })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error kind, e.g. `asset_not_found`.
    pub kind: String,
}

/// A failed request, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

/// HTTP status for each registry error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
        ErrorKind::AssetNotFound
        | ErrorKind::VaultNotFound
        | ErrorKind::CategoryNotFound
        | ErrorKind::ThresholdNotFound => StatusCode::NOT_FOUND,
        ErrorKind::AssetExists | ErrorKind::ThresholdExists => StatusCode::CONFLICT,
        ErrorKind::InvalidParameters => StatusCode::BAD_REQUEST,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Storage {
            tracing::error!(error = %err, "registry storage failure");
        }
        ApiError {
            status: status_for(kind),
            kind: kind.as_str(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Current logical clock value.
    pub clock: Timestamp,
    /// ISO-8601 wall-clock timestamp of the response.
    pub timestamp: String,
}

/// Identifier returned by mutations.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

/// Body of `PUT /me/vault`.
#[derive(Debug, Deserialize)]
pub struct UpdateVaultRequest {
    pub name: String,
    #[serde(default)]
    pub public_view: bool,
}

/// Body of `POST /me/assets`: the asset id, its opening value, and the
/// descriptive fields inline.
#[derive(Debug, Deserialize)]
pub struct RegisterAssetRequest {
    pub asset_id: String,
    pub current_value: u64,
    #[serde(flatten)]
    pub details: AssetDetails,
}

/// Body of `PUT /me/assets/:asset_id/value`.
#[derive(Debug, Deserialize)]
pub struct UpdateValueRequest {
    pub value: u64,
}

/// Response of `PUT /me/assets/:asset_id/value`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValueResponse {
    pub asset_id: String,
    pub value: u64,
}

/// Body of `PUT /me/assets/:asset_id/thresholds/:threshold_id`.
#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    /// `gt`, `greater-than`, `lt` or `less-than`.
    pub comparison: String,
    pub value: u64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `POST /me/assets/:asset_id/thresholds`.
#[derive(Debug, Deserialize)]
pub struct CreateThresholdRequest {
    pub threshold_id: String,
    pub comparison: String,
    pub value: u64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `PUT /me/categories/:category_id`.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `PUT /me/viewers/:viewer`. No expiry means a permanent grant.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

/// Response of `GET /vaults/:owner/access`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultAccessResponse {
    pub owner: Principal,
    pub caller: Principal,
    /// Owner or active grant holder.
    pub authorized: bool,
    /// May read vault metadata and categories.
    pub can_view_vault: bool,
}

/// Response of `GET /vaults/:owner/assets/:asset_id/access`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AssetAccessResponse {
    pub owner: Principal,
    pub asset_id: String,
    pub caller: Principal,
    pub can_view: bool,
}

/// Response of `GET /vaults/:owner/assets/:asset_id/history/:timestamp`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValueAtResponse {
    pub asset_id: String,
    pub timestamp: Timestamp,
    pub value: Option<u64>,
}

/// Response of `GET /vaults/:owner/assets/:asset_id/evaluate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub asset_id: String,
    /// Clock value the evaluation ran at.
    pub evaluated_at: Timestamp,
    /// Triggered threshold ids, sorted.
    pub triggered: Vec<ThresholdId>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        // Caller-scoped writes.
        .route("/me/vault", put(update_vault_handler))
        .route("/me/assets", post(register_asset_handler))
        .route("/me/assets/:asset_id", axum::routing::delete(delete_asset_handler))
        .route("/me/assets/:asset_id/value", put(update_value_handler))
        .route("/me/assets/:asset_id/details", put(update_details_handler))
        .route(
            "/me/assets/:asset_id/thresholds",
            post(create_threshold_handler),
        )
        .route(
            "/me/assets/:asset_id/thresholds/:threshold_id",
            put(set_threshold_handler).delete(delete_threshold_handler),
        )
        .route(
            "/me/categories/:category_id",
            put(set_category_handler).delete(delete_category_handler),
        )
        .route("/me/viewers", get(list_viewers_handler))
        .route(
            "/me/viewers/:viewer",
            put(authorize_viewer_handler).delete(revoke_viewer_handler),
        )
        // Owner-addressed reads.
        .route("/vaults/:owner", get(get_vault_handler))
        .route("/vaults/:owner/access", get(vault_access_handler))
        .route("/vaults/:owner/categories", get(list_categories_handler))
        .route(
            "/vaults/:owner/categories/:category_id",
            get(get_category_handler),
        )
        .route("/vaults/:owner/assets", get(list_assets_handler))
        .route("/vaults/:owner/assets/:asset_id", get(get_asset_handler))
        .route(
            "/vaults/:owner/assets/:asset_id/access",
            get(asset_access_handler),
        )
        .route(
            "/vaults/:owner/assets/:asset_id/history",
            get(history_handler),
        )
        .route(
            "/vaults/:owner/assets/:asset_id/history/:timestamp",
            get(value_at_handler),
        )
        .route(
            "/vaults/:owner/assets/:asset_id/thresholds",
            get(list_thresholds_handler),
        )
        .route(
            "/vaults/:owner/assets/:asset_id/thresholds/:threshold_id",
            get(get_threshold_handler),
        )
        .route(
            "/vaults/:owner/assets/:asset_id/evaluate",
            get(evaluate_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Node Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: version and current clock value.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        clock: state.clock.now(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// Write Handlers
// ---------------------------------------------------------------------------

async fn update_vault_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateVaultRequest>,
) -> ApiResult<IdResponse> {
    let id = state.call("update_vault", &headers, |reg, ctx| {
        reg.update_vault(ctx, &req.name, req.public_view)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn register_asset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterAssetRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state.call("register_asset", &headers, |reg, ctx| {
        reg.register_asset(ctx, &req.asset_id, req.details, req.current_value)
    })?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

async fn update_value_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
    Json(req): Json<UpdateValueRequest>,
) -> ApiResult<ValueResponse> {
    let value = state.call("update_value", &headers, |reg, ctx| {
        reg.update_value(ctx, &asset_id, req.value)
    })?;
    Ok(Json(ValueResponse { asset_id, value }))
}

async fn update_details_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
    Json(details): Json<AssetDetails>,
) -> ApiResult<IdResponse> {
    let id = state.call("update_details", &headers, |reg, ctx| {
        reg.update_details(ctx, &asset_id, details)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn delete_asset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
) -> ApiResult<IdResponse> {
    let id = state.call("delete_asset", &headers, |reg, ctx| {
        reg.delete_asset(ctx, &asset_id)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn create_threshold_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
    Json(req): Json<CreateThresholdRequest>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let id = state.call("create_threshold", &headers, |reg, ctx| {
        reg.create_threshold(
            ctx,
            &asset_id,
            &req.threshold_id,
            &req.comparison,
            req.value,
            req.description,
        )
    })?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

async fn set_threshold_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((asset_id, threshold_id)): Path<(String, String)>,
    Json(req): Json<ThresholdRequest>,
) -> ApiResult<IdResponse> {
    let id = state.call("set_threshold", &headers, |reg, ctx| {
        reg.set_threshold(
            ctx,
            &asset_id,
            &threshold_id,
            &req.comparison,
            req.value,
            req.description,
        )
    })?;
    Ok(Json(IdResponse { id }))
}

async fn delete_threshold_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((asset_id, threshold_id)): Path<(String, String)>,
) -> ApiResult<IdResponse> {
    let id = state.call("delete_threshold", &headers, |reg, ctx| {
        reg.delete_threshold(ctx, &asset_id, &threshold_id)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn set_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category_id): Path<String>,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<IdResponse> {
    let id = state.call("set_category", &headers, |reg, ctx| {
        reg.set_category(ctx, &category_id, &req.name, req.description)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn delete_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(category_id): Path<String>,
) -> ApiResult<IdResponse> {
    let id = state.call("delete_category", &headers, |reg, ctx| {
        reg.delete_category(ctx, &category_id)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn list_viewers_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Vec<GrantStatus>> {
    let grants = state.call("list_viewers", &headers, |reg, ctx| reg.list_viewers(ctx))?;
    Ok(Json(grants))
}

async fn authorize_viewer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(viewer): Path<String>,
    Json(req): Json<GrantRequest>,
) -> ApiResult<IdResponse> {
    let id = state.call("authorize_viewer", &headers, |reg, ctx| {
        reg.authorize_viewer(ctx, &viewer, req.expires_at)
    })?;
    Ok(Json(IdResponse { id }))
}

async fn revoke_viewer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(viewer): Path<String>,
) -> ApiResult<IdResponse> {
    let id = state.call("revoke_viewer", &headers, |reg, ctx| {
        reg.revoke_viewer(ctx, &viewer)
    })?;
    Ok(Json(IdResponse { id }))
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

async fn get_vault_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(owner): Path<String>,
) -> ApiResult<Vault> {
    let vault = state.call("get_vault", &headers, |reg, ctx| reg.get_vault(ctx, &owner))?;
    Ok(Json(vault))
}

async fn vault_access_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(owner): Path<String>,
) -> ApiResult<VaultAccessResponse> {
    let resp = state.call("is_authorized", &headers, |reg, ctx| {
        Ok(VaultAccessResponse {
            owner: owner.clone(),
            caller: ctx.caller.clone(),
            authorized: reg.is_authorized(ctx, &owner)?,
            can_view_vault: reg.can_view_vault(ctx, &owner)?,
        })
    })?;
    Ok(Json(resp))
}

async fn list_categories_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(owner): Path<String>,
) -> ApiResult<Vec<Category>> {
    let categories = state.call("list_categories", &headers, |reg, ctx| {
        reg.list_categories(ctx, &owner)
    })?;
    Ok(Json(categories))
}

async fn get_category_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, category_id)): Path<(String, String)>,
) -> ApiResult<Category> {
    let category = state.call("get_category", &headers, |reg, ctx| {
        reg.get_category(ctx, &owner, &category_id)
    })?;
    Ok(Json(category))
}

async fn list_assets_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(owner): Path<String>,
) -> ApiResult<Vec<Asset>> {
    let assets = state.call("list_assets", &headers, |reg, ctx| reg.list_assets(ctx, &owner))?;
    Ok(Json(assets))
}

async fn get_asset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id)): Path<(String, String)>,
) -> ApiResult<Asset> {
    let asset = state.call("get_asset", &headers, |reg, ctx| {
        reg.get_asset(ctx, &owner, &asset_id)
    })?;
    Ok(Json(asset))
}

async fn asset_access_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id)): Path<(String, String)>,
) -> ApiResult<AssetAccessResponse> {
    let resp = state.call("can_view_asset", &headers, |reg, ctx| {
        Ok(AssetAccessResponse {
            owner: owner.clone(),
            asset_id: asset_id.clone(),
            caller: ctx.caller.clone(),
            can_view: reg.can_view_asset(ctx, &owner, &asset_id)?,
        })
    })?;
    Ok(Json(resp))
}

async fn history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id)): Path<(String, String)>,
) -> ApiResult<Vec<ValuationEvent>> {
    let events = state.call("history", &headers, |reg, ctx| {
        reg.history(ctx, &owner, &asset_id)
    })?;
    Ok(Json(events))
}

async fn value_at_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id, timestamp)): Path<(String, String, Timestamp)>,
) -> ApiResult<ValueAtResponse> {
    let value = state.call("value_at", &headers, |reg, ctx| {
        reg.value_at(ctx, &owner, &asset_id, timestamp)
    })?;
    Ok(Json(ValueAtResponse {
        asset_id,
        timestamp,
        value,
    }))
}

async fn list_thresholds_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id)): Path<(String, String)>,
) -> ApiResult<Vec<Threshold>> {
    let thresholds = state.call("list_thresholds", &headers, |reg, ctx| {
        reg.list_thresholds(ctx, &owner, &asset_id)
    })?;
    Ok(Json(thresholds))
}

async fn get_threshold_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id, threshold_id)): Path<(String, String, String)>,
) -> ApiResult<Threshold> {
    let threshold = state.call("get_threshold", &headers, |reg, ctx| {
        reg.get_threshold(ctx, &owner, &asset_id, &threshold_id)
    })?;
    Ok(Json(threshold))
}

/// `GET /vaults/:owner/assets/:asset_id/evaluate`: evaluates every
/// threshold of the asset against its current value.
async fn evaluate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((owner, asset_id)): Path<(String, String)>,
) -> ApiResult<EvaluateResponse> {
    let (evaluated_at, triggered) = state.call("evaluate", &headers, |reg, ctx| {
        Ok((ctx.now, reg.evaluate(ctx, &owner, &asset_id)?))
    })?;
    state
        .metrics
        .thresholds_triggered_total
        .inc_by(triggered.len() as u64);
    Ok(Json(EvaluateResponse {
        asset_id,
        evaluated_at,
        triggered: triggered.into_iter().collect(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Creates a test AppState backed by a temporary database, with the
    /// clock at 10.
    fn test_app_state() -> AppState {
        let store = SledStore::open_temporary().expect("temp db");
        AppState {
            version: "0.1.0-test".into(),
            registry: Arc::new(Mutex::new(Registry::new(store))),
            clock: Arc::new(LogicalClock::new(10)),
            metrics: Arc::new(crate::metrics::NodeMetrics::new()),
        }
    }

    /// Sends a request as `caller` (if any) with an optional JSON body and
    /// returns the (status, body_bytes).
    async fn send(
        router: &Router,
        method: &str,
        path: &str,
        caller: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(caller) = caller {
            builder = builder.header(CALLER_HEADER, caller);
        }
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    async fn get_as(router: &Router, caller: &str, path: &str) -> (StatusCode, Vec<u8>) {
        send(router, "GET", path, Some(caller), None).await
    }

    fn error_kind(body: &[u8]) -> String {
        let err: ErrorResponse = serde_json::from_slice(body).unwrap();
        err.kind
    }

    async fn register(router: &Router, owner: &str, asset_id: &str, value: u64, public: bool) {
        let body = serde_json::json!({
            "asset_id": asset_id,
            "current_value": value,
            "name": format!("Asset {asset_id}"),
            "category": "vehicles",
            "acquisition_date": 1,
            "acquisition_cost": value,
            "public_view": public,
        });
        let (status, _) = send(router, "POST", "/me/assets", Some(owner), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // -- 1. Health and status ----------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = send(&router, "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_clock() {
        let state = test_app_state();
        state.clock.advance();
        let router = create_router(state);
        let (status, body) = send(&router, "GET", "/status", None, None).await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.clock, 11);
        assert_eq!(resp.version, "0.1.0-test");
    }

    // -- 2. Caller identity --------------------------------------------------

    #[tokio::test]
    async fn missing_caller_is_unauthenticated() {
        let router = create_router(test_app_state());
        let (status, body) = send(&router, "GET", "/vaults/alice", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_kind(&body), "unauthenticated");

        let (status, _) = send(&router, "GET", "/vaults/alice", Some("  "), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // -- 3. Asset lifecycle --------------------------------------------------

    #[tokio::test]
    async fn asset_lifecycle_over_http() {
        let state = test_app_state();
        let router = create_router(state.clone());
        register(&router, "alice", "a1", 50_000, false).await;

        state.clock.advance();
        let (status, body) = send(
            &router,
            "PUT",
            "/me/assets/a1/value",
            Some("alice"),
            Some(serde_json::json!({ "value": 60_000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: ValueResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.value, 60_000);

        let (status, _) = send(
            &router,
            "PUT",
            "/me/assets/a1/thresholds/t1",
            Some("alice"),
            Some(serde_json::json!({ "comparison": "greater-than", "value": 55_000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_as(&router, "alice", "/vaults/alice/assets/a1/evaluate").await;
        assert_eq!(status, StatusCode::OK);
        let resp: EvaluateResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.triggered, vec!["t1".to_string()]);
        assert_eq!(resp.evaluated_at, 11);
        assert_eq!(state.metrics.thresholds_triggered_total.get(), 1);

        let (status, body) = get_as(&router, "alice", "/vaults/alice/assets/a1/history").await;
        assert_eq!(status, StatusCode::OK);
        let events: Vec<ValuationEvent> = serde_json::from_slice(&body).unwrap();
        let points: Vec<(Timestamp, u64)> =
            events.iter().map(|e| (e.timestamp, e.value)).collect();
        assert_eq!(points, vec![(10, 50_000), (11, 60_000)]);

        let (status, _) = send(&router, "DELETE", "/me/assets/a1", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &router,
            "PUT",
            "/me/assets/a1/value",
            Some("alice"),
            Some(serde_json::json!({ "value": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_kind(&body), "asset_not_found");

        let (status, _) = get_as(&router, "alice", "/vaults/alice/assets/a1/thresholds/t1").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let router = create_router(test_app_state());
        register(&router, "alice", "a1", 10, false).await;

        let body = serde_json::json!({
            "asset_id": "a1",
            "current_value": 1,
            "name": "Again",
            "category": "misc",
            "acquisition_date": 1,
            "acquisition_cost": 1,
        });
        let (status, body) = send(&router, "POST", "/me/assets", Some("alice"), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_kind(&body), "asset_exists");
    }

    #[tokio::test]
    async fn bad_comparison_is_rejected() {
        let router = create_router(test_app_state());
        register(&router, "alice", "a1", 10, false).await;

        let (status, body) = send(
            &router,
            "POST",
            "/me/assets/a1/thresholds",
            Some("alice"),
            Some(serde_json::json!({ "threshold_id": "t1", "comparison": "eq", "value": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(&body), "invalid_parameters");
    }

    // -- 4. Delegated access -------------------------------------------------

    #[tokio::test]
    async fn grant_expires_with_clock() {
        let state = test_app_state();
        let router = create_router(state.clone());
        register(&router, "alice", "a1", 10, false).await;

        let (status, body) = get_as(&router, "bob", "/vaults/alice/assets/a1").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_kind(&body), "not_authorized");

        let (status, _) = send(
            &router,
            "PUT",
            "/me/viewers/bob",
            Some("alice"),
            Some(serde_json::json!({ "expires_at": 12 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_as(&router, "bob", "/vaults/alice/assets/a1").await;
        assert_eq!(status, StatusCode::OK);
        let asset: Asset = serde_json::from_slice(&body).unwrap();
        assert_eq!(asset.asset_id, "a1");

        state.clock.set(12);
        let (status, _) = get_as(&router, "bob", "/vaults/alice/assets/a1").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = get_as(&router, "alice", "/me/viewers").await;
        let grants: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0]["viewer"], "bob");
        assert_eq!(grants[0]["active"], false);
    }

    #[tokio::test]
    async fn access_endpoints_report_decisions() {
        let router = create_router(test_app_state());
        register(&router, "alice", "shown", 1, true).await;
        register(&router, "alice", "hidden", 1, false).await;

        let (_, body) = get_as(&router, "bob", "/vaults/alice/access").await;
        let resp: VaultAccessResponse = serde_json::from_slice(&body).unwrap();
        assert!(!resp.authorized);
        assert!(!resp.can_view_vault);
        assert_eq!(resp.caller, "bob");

        let (_, body) = get_as(&router, "bob", "/vaults/alice/assets/shown/access").await;
        let resp: AssetAccessResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.can_view);

        let (_, body) = get_as(&router, "bob", "/vaults/alice/assets").await;
        let assets: Vec<Asset> = serde_json::from_slice(&body).unwrap();
        let ids: Vec<&str> = assets.iter().map(|a| a.asset_id.as_str()).collect();
        assert_eq!(ids, vec!["shown"]);
    }

    #[tokio::test]
    async fn public_vault_exposes_categories() {
        let router = create_router(test_app_state());
        let (status, _) = send(
            &router,
            "PUT",
            "/me/categories/art",
            Some("alice"),
            Some(serde_json::json!({ "name": "Art" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_as(&router, "bob", "/vaults/alice/categories").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &router,
            "PUT",
            "/me/vault",
            Some("alice"),
            Some(serde_json::json!({ "name": "Alice's things", "public_view": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_as(&router, "bob", "/vaults/alice/categories/art").await;
        assert_eq!(status, StatusCode::OK);
        let category: Category = serde_json::from_slice(&body).unwrap();
        assert_eq!(category.name, "Art");

        let (_, body) = get_as(&router, "bob", "/vaults/alice").await;
        let vault: Vault = serde_json::from_slice(&body).unwrap();
        assert_eq!(vault.name, "Alice's things");
    }

    // -- 5. History lookups --------------------------------------------------

    #[tokio::test]
    async fn value_at_reads_past_values() {
        let state = test_app_state();
        let router = create_router(state.clone());
        register(&router, "alice", "a1", 100, false).await;
        state.clock.set(20);
        send(
            &router,
            "PUT",
            "/me/assets/a1/value",
            Some("alice"),
            Some(serde_json::json!({ "value": 200 })),
        )
        .await;

        let (_, body) = get_as(&router, "alice", "/vaults/alice/assets/a1/history/15").await;
        let resp: ValueAtResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.value, Some(100));

        let (_, body) = get_as(&router, "alice", "/vaults/alice/assets/a1/history/5").await;
        let resp: ValueAtResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.value, None);
    }

    // -- 6. Metrics ----------------------------------------------------------

    #[tokio::test]
    async fn operations_are_counted_by_outcome() {
        let state = test_app_state();
        let router = create_router(state.clone());
        register(&router, "alice", "a1", 1, false).await;
        send(&router, "DELETE", "/me/assets/zzz", Some("alice"), None).await;

        let ops = &state.metrics.operations_total;
        assert_eq!(ops.with_label_values(&["register_asset", "ok"]).get(), 1);
        assert_eq!(
            ops.with_label_values(&["delete_asset", "asset_not_found"])
                .get(),
            1
        );
    }

    // -- Clock ordering ------------------------------------------------------

    /// Queues an `update_value` call on a separate thread and returns the
    /// clock value it was stamped with.
    fn spawn_update(state: &AppState, value: u64) -> std::thread::JoinHandle<Timestamp> {
        let state = state.clone();
        std::thread::spawn(move || {
            let mut headers = HeaderMap::new();
            headers.insert(CALLER_HEADER, HeaderValue::from_static("alice"));
            state
                .call("update_value", &headers, |reg, ctx| {
                    reg.update_value(ctx, "a1", value)?;
                    Ok(ctx.now)
                })
                .unwrap()
        })
    }

    #[test]
    fn calls_are_stamped_after_taking_the_registry_lock() {
        let state = test_app_state();
        let details = AssetDetails {
            name: "Car".into(),
            category: "vehicles".into(),
            acquisition_date: 1,
            acquisition_cost: 500,
            metadata: None,
            public_view: false,
        };
        state
            .registry
            .lock()
            .register_asset(&CallContext::new("alice", 10), "a1", details, 500)
            .unwrap();

        // Both calls queue on the lock, one on each side of a clock tick.
        let guard = state.registry.lock();
        let first = spawn_update(&state, 700);
        std::thread::sleep(Duration::from_millis(50));
        state.clock.advance();
        state.clock.advance();
        let second = spawn_update(&state, 600);
        std::thread::sleep(Duration::from_millis(50));
        drop(guard);

        assert_eq!(first.join().unwrap(), 12);
        assert_eq!(second.join().unwrap(), 12);

        let reg = state.registry.lock();
        let ctx = CallContext::new("alice", 12);
        let asset = reg.get_asset(&ctx, "alice", "a1").unwrap();
        let history = reg.history(&ctx, "alice", "a1").unwrap();
        assert_eq!(asset.last_updated, 12);
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().map(|e| e.value), Some(asset.current_value));
        assert_eq!(
            reg.value_at(&ctx, "alice", "a1", 12).unwrap(),
            Some(asset.current_value)
        );
    }

    #[test]
    fn status_mapping_covers_every_kind() {
        assert_eq!(status_for(ErrorKind::NotAuthorized), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::VaultNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::ThresholdExists), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::InvalidParameters),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(ErrorKind::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
