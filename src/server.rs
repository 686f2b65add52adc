use crate::domain::{PriceCategory, RestaurantSummary};
use crate::error::RecommenderError;
use crate::ingest::IngestWorkflow;
use crate::recommend::{RecommendError, RecommendationRequest, Recommender};
use crate::storage::RestaurantStore;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const DEFAULT_RESTAURANT_LIMIT: i64 = 20;
const MAX_RESTAURANT_LIMIT: i64 = 100;
const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RestaurantStore>,
    pub recommender: Arc<Recommender>,
}

/// JSON error body `{"detail": ...}` with a status code.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unprocessable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<RecommenderError> for ApiError {
    fn from(err: RecommenderError) -> Self {
        error!("Storage failure: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Internal storage error".to_string(),
        }
    }
}

impl From<RecommendError> for ApiError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::Invalid(detail) => Self::unprocessable(detail),
            RecommendError::NotFound => Self {
                status: StatusCode::NOT_FOUND,
                detail: RecommendError::NotFound.to_string(),
            },
            RecommendError::Upstream(detail) => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                detail,
            },
            RecommendError::Storage(inner) => inner.into(),
        }
    }
}

/// Health check endpoint
async fn root() -> impl IntoResponse {
    Json(json!({"status": "ok", "docs": "/docs"}))
}

async fn list_cities(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_cities().await?))
}

#[derive(Debug, Deserialize)]
pub struct RestaurantsQuery {
    pub city: Option<String>,
    pub price_category: Option<String>,
    pub limit: Option<String>,
}

async fn list_restaurants(
    State(state): State<AppState>,
    Query(query): Query<RestaurantsQuery>,
) -> Result<Json<Vec<RestaurantSummary>>, ApiError> {
    let city = query
        .city
        .ok_or_else(|| ApiError::unprocessable("city is required"))?;
    let price_category: PriceCategory = query
        .price_category
        .ok_or_else(|| ApiError::unprocessable("price_category is required"))?
        .parse()
        .map_err(|_| ApiError::unprocessable("price_category must be $, $$, or $$$"))?;
    let limit = match query.limit {
        None => DEFAULT_RESTAURANT_LIMIT,
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|l| (1..=MAX_RESTAURANT_LIMIT).contains(l))
            .ok_or_else(|| {
                ApiError::unprocessable(format!("limit must be between 1 and {MAX_RESTAURANT_LIMIT}"))
            })?,
    };

    let restaurants = state
        .store
        .find_restaurants(&city, price_category, limit as usize)
        .await?;
    Ok(Json(restaurants))
}

async fn recommendations(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<crate::recommend::RecommendationResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.recommender.recommend(&request).await?))
}

/// Build the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .map(|o| HeaderValue::from_static(*o))
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/cities", get(list_cities))
        .route("/restaurants", get(list_restaurants))
        .route("/recommendations", post(recommendations))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Populate an empty destination before serving. Failure is logged and the
/// server starts anyway.
pub async fn ingest_if_empty(workflow: &IngestWorkflow) {
    match workflow.is_destination_empty().await {
        Ok(false) => return,
        Ok(true) => info!("Database empty - loading dataset (this may take a few minutes)..."),
        Err(e) => {
            warn!("Could not check destination, skipping auto-ingest: {}", e);
            return;
        }
    }
    match workflow.run().await {
        Ok(report) => info!(
            "Data load complete: processed {}, skipped {}, inserted {}",
            report.processed, report.skipped, report.inserted
        ),
        Err(e) => warn!(
            "Auto-ingest failed: {}. Run `restaurant_recommender ingest` manually.",
            e
        ),
    }
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    state.store.ensure_schema().await?;
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{}", port);
    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
