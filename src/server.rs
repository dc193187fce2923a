use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::{find_bonsai, CareApi, ClientError, MasterTable};
use crate::config::Config;
use crate::dosage::{compute_dosage, parse_quantity, DosageResult, FieldSelection};
use crate::season::Month;
use crate::session::{Session, SessionError};
use crate::treatment::{
    build_monthly_view, build_outlook, summarize_recommendations, MonthlyRiskView,
    RecommendationSummary, SeasonalOutlook,
};

#[derive(Clone)]
struct ApiState {
    config: Config,
    api: Arc<dyn CareApi>,
    session: Option<Session>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(error: ClientError) -> Self {
        match &error {
            ClientError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: error.to_string(),
            },
            ClientError::Status { status: 401 | 403, .. } => Self::forbidden(error.to_string()),
            ClientError::Rejected(_) => Self::unprocessable(error.to_string()),
            _ => Self::internal(error),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::MissingUser => Self::bad_request(error.to_string()),
            SessionError::NotAdmin(_) => Self::forbidden(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// A form field that may arrive as a JSON number, as typed text, or as a
/// preset drop-down with its `custom` override.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FieldValue {
    Number(f64),
    Text(String),
    Selection(FieldSelection),
}

impl FieldValue {
    fn resolve(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => parse_quantity(text),
            Self::Selection(selection) => selection.resolve(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DosageRequest {
    water: Option<FieldValue>,
    ratio: Option<FieldValue>,
}

#[derive(Debug, Serialize)]
struct DosageResponse {
    water_volume_ml: Option<f64>,
    dilution_ratio: Option<f64>,
    computable: bool,
    result: Option<DosageResult>,
    display: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RiskRequest {
    month: Option<Value>,
    species_id: Option<u64>,
    bonsai_id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn run_server(
    config: Config,
    api: Arc<dyn CareApi>,
    session: Option<Session>,
    bind: SocketAddr,
) -> Result<()> {
    if session.is_none() {
        warn!("no user configured; only /health, /v1/dosage and /v1/config will answer");
    }
    let state = ApiState {
        config,
        api,
        session,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/dosage", post(dosage))
        .route("/v1/risks", post(risks))
        .route("/v1/outlook", post(outlook))
        .route("/v1/recommend", post(recommend))
        .route("/v1/master/:table", get(master))
        .route("/v1/config", get(show_config))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn dosage(Json(request): Json<DosageRequest>) -> ApiResult<DosageResponse> {
    let water = request.water.as_ref().and_then(FieldValue::resolve);
    let ratio = request.ratio.as_ref().and_then(FieldValue::resolve);
    let result = match (water, ratio) {
        (Some(water), Some(ratio)) => compute_dosage(water, ratio),
        _ => None,
    };
    Ok(ok(DosageResponse {
        water_volume_ml: water,
        dilution_ratio: ratio,
        computable: result.is_some(),
        display: result.map(|r| r.to_string()),
        result,
    }))
}

async fn risks(
    State(state): State<ApiState>,
    Json(request): Json<RiskRequest>,
) -> ApiResult<MonthlyRiskView> {
    let (session, month, species_id) = resolve_request(&state, &request).await?;
    let data = state.api.fetch_reference_data(session).await?;
    Ok(ok(build_monthly_view(&data, species_id, month)))
}

async fn outlook(
    State(state): State<ApiState>,
    Json(request): Json<RiskRequest>,
) -> ApiResult<SeasonalOutlook> {
    let (session, month, species_id) = resolve_request(&state, &request).await?;
    let data = state.api.fetch_reference_data(session).await?;
    Ok(ok(build_outlook(&data, species_id, month)))
}

async fn recommend(
    State(state): State<ApiState>,
    Json(request): Json<RiskRequest>,
) -> ApiResult<RecommendationSummary> {
    let (session, month, species_id) = resolve_request(&state, &request).await?;
    let data = state.api.fetch_reference_data(session).await?;
    let logs = match request.bonsai_id {
        Some(id) => state.api.fetch_pesticide_logs(session, Some(id)).await?,
        None => Vec::new(),
    };
    let view = build_monthly_view(&data, species_id, month);
    Ok(ok(summarize_recommendations(
        &view,
        &logs,
        Local::now().date_naive(),
    )))
}

async fn master(
    State(state): State<ApiState>,
    Path(table): Path<String>,
) -> ApiResult<Vec<Value>> {
    let session = require_session(&state)?;
    session.require_admin()?;
    let table: MasterTable = table
        .parse()
        .map_err(|e: crate::api::MasterTableParseError| ApiError::bad_request(e.to_string()))?;
    Ok(ok(state.api.fetch_master(session, table).await?))
}

fn require_session(state: &ApiState) -> std::result::Result<&Session, ApiError> {
    state
        .session
        .as_ref()
        .ok_or_else(|| ApiError::from(SessionError::MissingUser))
}

async fn resolve_request<'a>(
    state: &'a ApiState,
    request: &RiskRequest,
) -> std::result::Result<(&'a Session, Month, Option<u64>), ApiError> {
    let session = require_session(state)?;
    let month = match &request.month {
        None | Some(Value::Null) => Month::current(),
        Some(value) => parse_month_value(value)?,
    };
    let species_id = match (request.species_id, request.bonsai_id) {
        (Some(species), _) => Some(species),
        (None, Some(bonsai)) => find_bonsai(state.api.as_ref(), session, bonsai)
            .await?
            .species_id,
        (None, None) => None,
    };
    Ok((session, month, species_id))
}

fn parse_month_value(value: &Value) -> std::result::Result<Month, ApiError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(Month::new)
            .ok_or_else(|| ApiError::bad_request(format!("invalid month: {n}"))),
        Value::String(s) => s
            .parse::<Month>()
            .map_err(|e| ApiError::bad_request(e.to_string())),
        other => Err(ApiError::bad_request(format!("invalid month: {other}"))),
    }
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}
