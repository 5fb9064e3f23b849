//! HTTP surface
//!
//! Every endpoint answers with a `{success, ...}` envelope. Failures carry
//! `error` and `error_type`, and a status code derived from the error kind.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use daltek_chart::{build_chart, BuildOutcome, BuilderConfig, ChartKind, EChartTransformer, RenderedWidget};
use daltek_ir::{ColumnMeta, DaltekError, MapperConfig, WidgetDto};
use daltek_registry::WidgetValidator;
use daltek_sql::RowSource;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::Level;

use crate::config::Config;
use crate::log_event;
use crate::mapper::{DataMapperService, QueryResult, TransformResponse};
use crate::metrics::Metrics;
use crate::query::QueryService;

/// Immutable per-server state; nothing here holds request data
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mapper: Arc<DataMapperService>,
    pub queries: Arc<QueryService>,
    pub transformer: EChartTransformer,
    pub metrics: Metrics,
}

impl AppState {
    /// Saved queries come from the `saved_queries` config section
    pub fn new(config: Config, source: Arc<dyn RowSource + Send + Sync>) -> Result<Self, prometheus::Error> {
        let pipeline = &config.pipeline;
        let transformer = EChartTransformer::with_sampling(
            pipeline.optimize_large_series,
            pipeline.sample_threshold,
            pipeline.sample_target,
        );
        Ok(Self {
            mapper: Arc::new(DataMapperService::new(pipeline.preview_limit)),
            queries: Arc::new(QueryService::new(source).with_saved(config.saved_queries.clone())),
            transformer,
            metrics: Metrics::new()?,
            config: Arc::new(config),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/query/build", post(query_build))
        .route("/api/query/build-parameterized", post(query_build_parameterized))
        .route("/api/query/validate", post(query_validate))
        .route("/api/query/saved/:id/execute", post(query_execute_saved))
        .route("/api/mapper/transform", post(mapper_transform))
        .route("/api/mapper/preview", post(mapper_preview))
        .route("/api/mapper/validate", post(mapper_validate))
        .route("/api/mapper/operations/:column_type", get(mapper_operations))
        .route("/api/mapper/columns", post(mapper_columns))
        .route("/api/chart/build", post(chart_build))
        .route("/api/chart/types", get(chart_types))
        .route("/api/chart/render", post(chart_render))
        .route("/api/chart/export", post(chart_export))
        .route("/api/widget/validate", post(widget_validate))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub struct ApiError(DaltekError);

impl From<DaltekError> for ApiError {
    fn from(err: DaltekError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(DaltekError::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({"success": false, "error": self.0.to_string(), "error_type": self.0.kind()});
        (status_for(self.0.kind()), Json(body)).into_response()
    }
}

fn status_for(kind: &str) -> StatusCode {
    match kind {
        "NotFoundError" => StatusCode::NOT_FOUND,
        "ExecutionError" => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// A success body flattened next to `success: true`
#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope { success: true, body })
}

type Payload<T> = Result<Json<T>, JsonRejection>;

async fn query_build(State(state): State<AppState>, payload: Payload<Value>) -> Result<Json<Value>, ApiError> {
    let Json(spec) = payload?;
    let sql = state.queries.build(&spec)?;
    Ok(Json(json!({"success": true, "sql": sql})))
}

async fn query_build_parameterized(
    State(state): State<AppState>,
    payload: Payload<Value>,
) -> Result<Json<Value>, ApiError> {
    let Json(spec) = payload?;
    let statement = state.queries.build_parameterized(&spec)?;
    Ok(Json(json!({"success": true, "sql": statement.sql, "params": statement.params})))
}

async fn query_validate(State(state): State<AppState>, payload: Payload<Value>) -> Result<impl IntoResponse, ApiError> {
    let Json(query) = payload?;
    Ok(ok(state.queries.validate(&query)))
}

async fn query_execute_saved(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    Ok(ok(state.queries.execute_saved(&id)?))
}

#[derive(Deserialize)]
struct TransformRequest {
    #[serde(default)]
    query_result: QueryResult,
    #[serde(default)]
    mapper_config: MapperConfig,
    #[serde(default)]
    limit: Option<usize>,
}

fn transform_reply(state: &AppState, widget: &str, started: Instant, response: TransformResponse) -> (StatusCode, Json<TransformResponse>) {
    let elapsed = started.elapsed().as_secs_f64();
    state.metrics.record_transform(widget, response.success, elapsed);
    log_event!(
        level: Level::INFO,
        event: "mapper_transform",
        widget: widget,
        success: response.success,
        seconds: elapsed
    );

    let status = match (&response.success, &response.error_type) {
        (true, _) => StatusCode::OK,
        (false, Some(kind)) => status_for(kind),
        (false, None) => StatusCode::BAD_REQUEST,
    };
    (status, Json(response))
}

async fn mapper_transform(
    State(state): State<AppState>,
    payload: Payload<TransformRequest>,
) -> Result<(StatusCode, Json<TransformResponse>), ApiError> {
    let Json(req) = payload?;
    let started = Instant::now();
    let response = state.mapper.transform(&req.query_result, &req.mapper_config, req.limit);
    Ok(transform_reply(&state, req.mapper_config.widget_mapping.type_name(), started, response))
}

async fn mapper_preview(
    State(state): State<AppState>,
    payload: Payload<TransformRequest>,
) -> Result<(StatusCode, Json<TransformResponse>), ApiError> {
    let Json(req) = payload?;
    let started = Instant::now();
    let response = state.mapper.preview(&req.query_result, &req.mapper_config);
    Ok(transform_reply(&state, req.mapper_config.widget_mapping.type_name(), started, response))
}

#[derive(Deserialize)]
struct ValidateMappingRequest {
    #[serde(default)]
    mapper_config: MapperConfig,
    #[serde(default)]
    columns: Vec<ColumnMeta>,
}

async fn mapper_validate(
    State(state): State<AppState>,
    payload: Payload<ValidateMappingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    Ok(ok(state.mapper.validate_mapping(&req.mapper_config, &req.columns)))
}

async fn mapper_operations(State(state): State<AppState>, Path(column_type): Path<String>) -> impl IntoResponse {
    ok(state.mapper.get_available_operations(&column_type))
}

#[derive(Deserialize)]
struct ColumnsRequest {
    #[serde(default)]
    data: Vec<Value>,
}

async fn mapper_columns(State(state): State<AppState>, payload: Payload<ColumnsRequest>) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let columns = state.mapper.get_column_metadata(&req.data)?;
    Ok(Json(json!({"success": true, "columns": columns})))
}

#[derive(Deserialize)]
struct ChartBuildRequest {
    chart_type: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    config: BuilderConfig,
}

async fn chart_build(payload: Payload<ChartBuildRequest>) -> Result<(StatusCode, Json<BuildOutcome>), ApiError> {
    let Json(req) = payload?;
    let outcome = build_chart(&req.chart_type, &req.data, &req.config);
    let status = if outcome.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    Ok((status, Json(outcome)))
}

async fn chart_types() -> Json<Value> {
    Json(json!({"success": true, "types": ChartKind::available()}))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RenderRequest {
    Batch { widgets: Vec<WidgetDto> },
    Single(Box<WidgetDto>),
}

#[derive(Serialize)]
#[serde(untagged)]
enum Rendered {
    Batch { widgets: Vec<RenderedWidget> },
    Single { widget: Box<RenderedWidget> },
}

async fn chart_render(State(state): State<AppState>, payload: Payload<RenderRequest>) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let rendered = match req {
        RenderRequest::Batch { widgets } => Rendered::Batch {
            widgets: state.transformer.transform_batch(&widgets),
        },
        RenderRequest::Single(widget) => Rendered::Single {
            widget: Box::new(state.transformer.transform_widget(&widget)),
        },
    };
    Ok(ok(rendered))
}

async fn chart_export(State(state): State<AppState>, payload: Payload<WidgetDto>) -> Result<Json<Value>, ApiError> {
    let Json(widget) = payload?;
    if !widget.is_echart() {
        return Err(DaltekError::InvalidSpec(format!("Widget '{}' is not a chart", widget.id)).into());
    }
    Ok(Json(json!({"success": true, "export": state.transformer.export(&widget)})))
}

#[derive(Deserialize)]
struct WidgetValidateRequest {
    #[serde(default)]
    widgets: Vec<Value>,
}

async fn widget_validate(payload: Payload<WidgetValidateRequest>) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    Ok(ok(WidgetValidator.validate_batch(&req.widgets)))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(err) => ApiError(DaltekError::Execution(err.to_string())).into_response(),
    }
}
