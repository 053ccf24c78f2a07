use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::NaiveDate;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use macrolog_core::context::ClientContext;
use macrolog_core::error::{Error as CoreError, GatewayError};
use macrolog_core::goals::GoalStore;
use macrolog_core::ledger::DailyLedger;
use macrolog_core::models::{DailySummary, FoodEntry, GoalSettings};
use macrolog_core::nutrition::MacroDensity;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    ledger: DailyLedger,
    goals: GoalStore,
    api_key: Option<Arc<str>>,
}

impl AppState {
    fn new(ctx: ClientContext, api_key: Option<String>) -> Self {
        Self {
            ledger: DailyLedger::new(ctx.clone()),
            goals: GoalStore::new(ctx),
            api_key: api_key.map(Arc::from),
        }
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateFoodRequest {
    date: String,
    name: String,
    weight_g: f64,
    proteins_per_100g: f64,
    fats_per_100g: f64,
    carbs_per_100g: f64,
}

#[derive(Deserialize)]
struct SetGoalsRequest {
    proteins: f64,
    fats: f64,
    carbs: f64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => Self::BadRequest(e.to_string()),
            CoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            other => Self::Internal(other.into()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::Internal(err.into())
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key.as_ref());

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn list_foods(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<FoodEntry>>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.ledger.entries(date).await?))
}

/// Server-sent events, one `data:` frame holding the full entry list per change.
async fn live_foods(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let date = parse_date(&date)?;
    let feed = state.ledger.list(date).await?;
    tracing::debug!(%date, "live feed opened");

    let events = feed.into_stream().map(|entries| {
        let event = Event::default()
            .event("entries")
            .json_data(&entries)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to encode entries");
                Event::default().event("error").data("encoding failed")
            });
        Ok::<_, Infallible>(event)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn create_food(
    State(state): State<AppState>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodEntry>), ApiError> {
    let date = parse_date(&req.date)?;
    let density = MacroDensity::new(
        req.proteins_per_100g,
        req.fats_per_100g,
        req.carbs_per_100g,
    );
    let entry = state
        .ledger
        .add(date, &req.name, req.weight_g, density)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.ledger.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn repeat_food(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<FoodEntry>), ApiError> {
    let date = parse_date(&date)?;
    let entry = state
        .ledger
        .entry(date, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Food entry {id} not found on {date}")))?;
    let copy = state.ledger.duplicate(&entry).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn get_goals(State(state): State<AppState>) -> Result<Json<GoalSettings>, ApiError> {
    Ok(Json(state.goals.load().await?))
}

async fn put_goals(
    State(state): State<AppState>,
    Json(req): Json<SetGoalsRequest>,
) -> Result<Json<GoalSettings>, ApiError> {
    let goals = GoalSettings::new(req.proteins, req.fats, req.carbs)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.goals.save(&goals).await?;
    Ok(Json(goals))
}

async fn get_daily_summary(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DailySummary>, ApiError> {
    let date = parse_date(&date)?;
    let goals = state.goals.load().await?;
    Ok(Json(state.ledger.summary(date, goals).await?))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/foods", post(create_food))
        // DELETE carries an entry id in the same segment
        .route("/api/foods/{date}", get(list_foods).delete(delete_food))
        .route("/api/foods/{date}/live", get(live_foods))
        .route("/api/foods/{date}/{id}/repeat", post(repeat_food))
        .route("/api/goals", get(get_goals).put(put_goals))
        .route("/api/summary/{date}", get(get_daily_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
    }
}

// --- Server startup ---

pub async fn start_server(
    ctx: ClientContext,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let user = ctx.user().clone();
    let auth = api_key.is_some();
    let app = build_router(AppState::new(ctx, api_key));

    if !auth {
        tracing::warn!("authentication disabled (--no-auth), the API is open to anyone");
        if bind != "127.0.0.1" && bind != "localhost" {
            tracing::warn!(%bind, "listening beyond localhost with no authentication");
        }
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!(%user, "listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
