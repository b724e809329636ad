//! HTTP server exposing the query engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version and entity count) |
//! | `GET`  | `/entities/list` | Paginated entity listing |
//! | `GET`  | `/entities/search` | Ranked search over entity ids |
//! | `GET`  | `/entities/types` | Entity count per type |
//! | `GET`  | `/entities/{id}` | One entity record |
//! | `GET`  | `/entities/{id}/relationships` | Filtered relationships of an entity |
//! | `GET`  | `/entities/{id}/documents` | Filtered source chunks of an entity |
//! | `GET`  | `/entities/{id}/full` | Composite view with statistics |
//!
//! List-valued query parameters are comma-separated
//! (`?entity_types=person,organization`). Dates are `YYYY-MM-DD` or Unix
//! seconds.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "entity 'Ghost' not found" } }
//! ```
//!
//! Error codes: `invalid_argument` (400), `not_found` (404), `timeout` (408),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::QueryRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use entity_query_core::filters::{
    DateRange, Direction, DocumentFilters, FullQueryOptions, RelationshipFilters, SortBy,
    SortOrder, WeightRange,
};
use entity_query_core::models::{
    ChunkView, Entity, EntityPage, EntitySearchResult, FullEntityView, RelationshipSet,
    TypeSummary,
};
use entity_query_core::{EntityQueryEngine, ErrorKind, QueryError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::params::{parse_optional_date, split_list, DayBound};
use crate::sqlite_store::open_engine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: EntityQueryEngine,
    timeout: Duration,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated, or returns an error if the
/// database cannot be opened or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = open_engine(config).await?;
    let app = router(engine, config.query.timeout());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "entity query server listening");
    println!("Entity query server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router over an engine. Every handler runs under `timeout`.
pub fn router(engine: EntityQueryEngine, timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/entities/list", get(handle_list))
        .route("/entities/search", get(handle_search))
        .route("/entities/types", get(handle_types))
        .route("/entities/{id}", get(handle_details))
        .route("/entities/{id}/relationships", get(handle_relationships))
        .route("/entities/{id}/documents", get(handle_documents))
        .route("/entities/{id}/full", get(handle_full))
        .layer(cors)
        .with_state(AppState { engine, timeout })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if kind == ErrorKind::Internal {
            tracing::error!(error = %err, "query failed");
        }
        AppError {
            status,
            code: kind.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Constructs a 400 error for malformed query parameters.
fn invalid_argument(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: ErrorKind::InvalidArgument.code().to_string(),
        message: message.into(),
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        invalid_argument(rejection.body_text())
    }
}

/// `Query` whose rejection uses the JSON error envelope.
struct Params<T>(T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Params(value))
    }
}

/// Constructs a 408 Request Timeout error.
fn timeout_error(limit: Duration) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: format!("request timed out after {}s", limit.as_secs()),
    }
}

/// Run an engine call under the request deadline. Dropping the future on
/// expiry cancels any in-flight store reads.
async fn deadline<T>(
    limit: Duration,
    fut: impl Future<Output = entity_query_core::Result<T>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(timeout_error(limit)),
    }
}

fn parse_param<T>(raw: Option<&str>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = QueryError>,
{
    raw.map(str::parse::<T>)
        .transpose()
        .map_err(AppError::from)
}

fn date_range(from: Option<&str>, to: Option<&str>) -> Result<DateRange, AppError> {
    let parse = |raw: Option<&str>, bound: DayBound| {
        parse_optional_date(raw, bound).map_err(|e| invalid_argument(e.to_string()))
    };
    Ok(DateRange {
        from: parse(from, DayBound::Start)?,
        to: parse(to, DayBound::End)?,
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    entities: usize,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let entities = deadline(state.timeout, state.engine.entity_count()).await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entities,
    }))
}

// ============ GET /entities/list ============

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    entity_types: Option<String>,
    name_pattern: Option<String>,
    limit: Option<i64>,
    #[serde(default)]
    offset: i64,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

async fn handle_list(
    State(state): State<AppState>,
    Params(params): Params<ListParams>,
) -> Result<Json<EntityPage>, AppError> {
    let mut req = state.engine.defaults().list_request();
    req.type_filter = split_list(params.entity_types.as_deref());
    req.name_substring = params.name_pattern.filter(|p| !p.trim().is_empty());
    if let Some(sort_by) = parse_param::<SortBy>(params.sort_by.as_deref())? {
        req.sort_by = sort_by;
    }
    if let Some(order) = parse_param::<SortOrder>(params.sort_order.as_deref())? {
        req.sort_order = order;
    }
    if let Some(limit) = params.limit {
        req.limit = limit;
    }
    req.offset = params.offset;

    let page = deadline(state.timeout, state.engine.list(&req)).await?;
    Ok(Json(page))
}

// ============ GET /entities/search ============

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    entity_types: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<EntitySearchResult>,
    total_results: usize,
}

async fn handle_search(
    State(state): State<AppState>,
    Params(params): Params<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let mut req = state.engine.defaults().search_request(params.q);
    req.type_filter = split_list(params.entity_types.as_deref());
    if let Some(limit) = params.limit {
        req.limit = limit;
    }

    let results = deadline(state.timeout, state.engine.search(&req)).await?;
    Ok(Json(SearchResponse {
        total_results: results.len(),
        query: req.query,
        results,
    }))
}

// ============ GET /entities/types ============

#[derive(Serialize)]
struct TypesResponse {
    entity_types: TypeSummary,
    total_types: usize,
    total_entities: usize,
}

async fn handle_types(State(state): State<AppState>) -> Result<Json<TypesResponse>, AppError> {
    let summary = deadline(state.timeout, state.engine.types_summary()).await?;
    Ok(Json(TypesResponse {
        total_types: summary.len(),
        total_entities: summary.values().sum(),
        entity_types: summary,
    }))
}

// ============ GET /entities/{id} ============

async fn handle_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, AppError> {
    let entity = deadline(state.timeout, state.engine.details(&id)).await?;
    Ok(Json(entity))
}

// ============ GET /entities/{id}/relationships ============

#[derive(Debug, Default, Deserialize)]
struct RelationshipParams {
    direction: Option<String>,
    relation_types: Option<String>,
    related_entity_types: Option<String>,
    min_weight: Option<f64>,
    max_weight: Option<f64>,
    keywords: Option<String>,
    file_paths: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    limit: Option<i64>,
    #[serde(default)]
    offset: i64,
}

async fn handle_relationships(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Params(params): Params<RelationshipParams>,
) -> Result<Json<RelationshipSet>, AppError> {
    let filters = RelationshipFilters {
        direction: parse_param::<Direction>(params.direction.as_deref())?.unwrap_or_default(),
        relation_types: split_list(params.relation_types.as_deref()),
        related_entity_types: split_list(params.related_entity_types.as_deref()),
        weight_range: WeightRange {
            min: params.min_weight.unwrap_or(0.0),
            max: params.max_weight.unwrap_or(1.0),
        },
        keywords: split_list(params.keywords.as_deref()),
        file_paths: split_list(params.file_paths.as_deref()),
        date_range: date_range(params.date_from.as_deref(), params.date_to.as_deref())?,
        limit: params.limit,
        offset: params.offset,
    };

    let set = deadline(state.timeout, state.engine.relationships(&id, &filters)).await?;
    Ok(Json(set))
}

// ============ GET /entities/{id}/documents ============

#[derive(Debug, Default, Deserialize)]
struct DocumentParams {
    file_paths: Option<String>,
    doc_ids: Option<String>,
    chunk_ids: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    max_chunks: Option<i64>,
    #[serde(default)]
    offset: i64,
    include_full_text: Option<bool>,
    include_metadata: Option<bool>,
}

async fn handle_documents(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Params(params): Params<DocumentParams>,
) -> Result<Json<Vec<ChunkView>>, AppError> {
    let defaults = state.engine.defaults().document_filters();
    let filters = DocumentFilters {
        file_paths: split_list(params.file_paths.as_deref()),
        doc_ids: split_list(params.doc_ids.as_deref()),
        chunk_ids: split_list(params.chunk_ids.as_deref()),
        date_range: date_range(params.date_from.as_deref(), params.date_to.as_deref())?,
        max_chunks: params.max_chunks.unwrap_or(defaults.max_chunks),
        offset: params.offset,
        include_full_text: params
            .include_full_text
            .unwrap_or(defaults.include_full_text),
        include_metadata: params.include_metadata.unwrap_or(defaults.include_metadata),
    };

    let chunks = deadline(state.timeout, state.engine.documents(&id, &filters)).await?;
    Ok(Json(chunks))
}

// ============ GET /entities/{id}/full ============

#[derive(Debug, Default, Deserialize)]
struct FullParams {
    include_entity: Option<bool>,
    include_relationships: Option<bool>,
    include_documents: Option<bool>,
    include_statistics: Option<bool>,
    compute_related_entities: Option<bool>,
    relationship_direction: Option<String>,
    max_relationships: Option<i64>,
    min_weight: Option<f64>,
    max_chunks: Option<i64>,
    max_related_entities: Option<i64>,
}

async fn handle_full(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Params(params): Params<FullParams>,
) -> Result<Json<FullEntityView>, AppError> {
    let d = state.engine.defaults().full_options();
    let options = FullQueryOptions {
        include_entity: params.include_entity.unwrap_or(d.include_entity),
        include_relationships: params
            .include_relationships
            .unwrap_or(d.include_relationships),
        include_documents: params.include_documents.unwrap_or(d.include_documents),
        include_statistics: params.include_statistics.unwrap_or(d.include_statistics),
        compute_related_entities: params
            .compute_related_entities
            .unwrap_or(d.compute_related_entities),
        relationship_direction: parse_param::<Direction>(params.relationship_direction.as_deref())?
            .unwrap_or(d.relationship_direction),
        max_relationships: params.max_relationships.or(d.max_relationships),
        min_weight: params.min_weight.unwrap_or(d.min_weight),
        max_chunks: params.max_chunks.unwrap_or(d.max_chunks),
        max_related_entities: params.max_related_entities.unwrap_or(d.max_related_entities),
    };

    let view = deadline(state.timeout, state.engine.full(&id, &options)).await?;
    Ok(Json(view))
}
