// Pricebook HTTP API (axum)
// GET /options, POST /quote, GET /health; price routes also under /api/price

use crate::config::Config;
use crate::db::PricebookPool;
use crate::error::{PricebookError, PricebookResult};
use crate::options::{get_options, PricebookOptions};
use crate::quote::{resolve_quote, validate_request, Quote, QuoteRequest};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

const OPTIONS_FAILED: &str = "Failed to load options";
const QUOTE_FAILED: &str = "Failed to calculate quote";
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared application state. Each request checks out its own pooled
/// connection, so reads run in parallel.
#[derive(Clone)]
pub struct AppState {
    pool: PricebookPool,
}

impl AppState {
    pub fn new(pool: PricebookPool) -> Self {
        Self { pool }
    }

    /// Run a read against a pooled connection on the blocking thread pool
    async fn read<T, F>(&self, f: F) -> PricebookResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> PricebookResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&*conn)
        })
        .await
        .map_err(|e| PricebookError::Infrastructure(format!("read task failed: {}", e)))?
    }

    pub fn close(self) {
        self.pool.close();
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// A resolver error plus the generic message used if it is an infrastructure failure
#[derive(Debug)]
pub struct ApiError {
    context: &'static str,
    error: PricebookError,
}

impl ApiError {
    fn new(context: &'static str, error: PricebookError) -> Self {
        Self { context, error }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self.error {
            PricebookError::Validation(message) => {
                tracing::warn!(%message, "rejected request");
                (StatusCode::BAD_REQUEST, ErrorBody { message, error: None })
            }
            PricebookError::NotFound(message) => {
                tracing::warn!(%message, "nothing to quote");
                (StatusCode::NOT_FOUND, ErrorBody { message, error: None })
            }
            infrastructure => {
                tracing::error!(error = %infrastructure, "{}", self.context);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        message: self.context.to_string(),
                        error: Some(infrastructure.to_string()),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// GET /options - dropdown values for the quote form
async fn options_handler(State(state): State<AppState>) -> Result<Json<PricebookOptions>, ApiError> {
    let options = state
        .read(|conn| get_options(conn))
        .await
        .map_err(|e| ApiError::new(OPTIONS_FAILED, e))?;
    Ok(Json(options))
}

/// POST /quote - resolve one rate
async fn quote_handler(
    State(state): State<AppState>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<Quote>, ApiError> {
    // Malformed bodies are the caller's problem, same as missing fields
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(QUOTE_FAILED, PricebookError::Validation(rejection.body_text()))
    })?;

    // Preconditions are checked before a connection is checked out
    let selection = validate_request(&request).map_err(|e| ApiError::new(QUOTE_FAILED, e))?;
    let quote = state
        .read(move |conn| resolve_quote(conn, &selection))
        .await
        .map_err(|e| ApiError::new(QUOTE_FAILED, e))?;
    Ok(Json(quote))
}

// ============================================================================
// Router
// ============================================================================

fn price_routes() -> Router<AppState> {
    Router::new()
        .route("/options", get(options_handler))
        .route("/quote", post(quote_handler))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_allow
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn app_router(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(price_routes())
        .nest("/api/price", price_routes())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RateRecord, TierRates};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let mut record = RateRecord::new("APAC", "Australia", "USD");
        record.yearly_with_backfill = TierRates::new(48000.0, 60000.0, 72000.0, 84000.0, 96000.0);
        record.yearly_without_backfill =
            TierRates::new(52000.0, 64000.0, 76000.0, 88000.0, 100000.0);

        AppState::new(PricebookPool::in_memory(&[record]).unwrap())
    }

    fn test_router(state: AppState) -> Router {
        let config = Config::from_lookup(|_| None).unwrap();
        app_router(state, &config)
    }

    fn quote_body() -> serde_json::Value {
        serde_json::json!({
            "region": "APAC",
            "country": "Australia",
            "supplier": "Direct",
            "currency": "USD",
            "paymentTerms": "60 Days",
            "serviceLevel": "L1",
            "engagementType": "yearly",
            "withBackfill": true
        })
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(test_router(test_state()), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_options_on_both_paths() {
        for uri in ["/options", "/api/price/options"] {
            let (status, body) = send(test_router(test_state()), get_request(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["regions"], serde_json::json!(["APAC"]));
            assert_eq!(body["countriesByRegion"]["APAC"], serde_json::json!(["Australia"]));
            assert_eq!(body["serviceLevels"].as_array().unwrap().len(), 5);
        }
    }

    #[tokio::test]
    async fn test_quote_success() {
        let (status, body) =
            send(test_router(test_state()), post_json("/quote", &quote_body())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currency"], "USD");
        assert_eq!(body["amount"].as_f64(), Some(48000.0));
        assert_eq!(body["breakdown"]["paymentTerms"], "60 Days");
        assert_eq!(body["breakdown"]["serviceLevel"], "L1");
        assert_eq!(body["breakdown"]["withBackfill"], true);
    }

    #[tokio::test]
    async fn test_quote_under_api_prefix() {
        let (status, body) = send(
            test_router(test_state()),
            post_json("/api/price/quote", &quote_body()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"].as_f64(), Some(48000.0));
    }

    #[tokio::test]
    async fn test_invalid_tier_is_bad_request() {
        let mut body = quote_body();
        body["serviceLevel"] = serde_json::json!("L9");

        let (status, body) = send(test_router(test_state()), post_json("/quote", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "message": "Invalid service level." }));
    }

    #[tokio::test]
    async fn test_missing_fields_is_bad_request() {
        let (status, body) = send(
            test_router(test_state()),
            post_json("/quote", &serde_json::json!({ "region": "APAC" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Missing required commercial fields.");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/quote")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(test_router(test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_country_is_not_found() {
        let mut body = quote_body();
        body["country"] = serde_json::json!("Germany");

        let (status, body) = send(test_router(test_state()), post_json("/quote", &body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["message"],
            "No matching pricebook entry found for the given selection."
        );
    }

    #[tokio::test]
    async fn test_zero_rate_is_not_found() {
        let mut body = quote_body();
        body["engagementType"] = serde_json::json!("monthly_short");

        let (status, body) = send(test_router(test_state()), post_json("/quote", &body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Rate not found for L1 (monthly_short).");
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let state = test_state();
        state
            .pool
            .get()
            .unwrap()
            .execute_batch("DROP TABLE pricebook_entries;")
            .unwrap();

        let (status, body) = send(test_router(state), get_request("/options")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to load options");
        assert!(body["error"].as_str().unwrap().contains("no such table"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reads_do_not_wait_on_a_busy_connection() {
        let state = test_state();
        // A long-running reader keeps its connection checked out
        let busy = state.pool.get().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let router = test_router(state.clone());
                tokio::spawn(async move { send(router, post_json("/quote", &quote_body())).await })
            })
            .collect();
        for handle in handles {
            let (status, body) = handle.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["amount"].as_f64(), Some(48000.0));
        }
        drop(busy);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_with_pool_exhausted() {
        let state = test_state();
        // Hold every connection: validation must still answer without one
        let held: Vec<_> = (0..8).map(|_| state.pool.get().unwrap()).collect();

        let mut body = quote_body();
        body["serviceLevel"] = serde_json::json!("L9");
        let (status, body) = send(test_router(state.clone()), post_json("/quote", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid service level.");
        drop(held);
    }

    #[tokio::test]
    async fn test_state_closes_after_router_dropped() {
        let state = test_state();
        let router = test_router(state.clone());
        drop(router);
        state.close();
    }
}
