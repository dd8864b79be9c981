use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, Uri},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod config;
pub mod error;
pub mod fixtures;
pub mod handlers;
pub mod models;
pub mod published;
pub mod repository;
pub mod routes;

use error::ViewError;
use routes::public;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the public views, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::index, handlers::category_posts, handlers::post_detail),
    components(
        schemas(
            models::Published, models::Slug, models::User, models::Category, models::Location,
            models::Post, models::PostWithRelated, handlers::IndexContext,
            handlers::CategoryContext, handlers::PostContext,
        )
    ),
    tags(
        (name = "blogicum", description = "Blog publishing: published posts by date and category")
    )
)]
struct ApiDoc;

/// AppState
///
/// The container shared by every request: the repository handle and the loaded
/// configuration. Nothing in it is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

impl AppState {
    /// State backed by an empty in-memory store and the default local configuration.
    pub fn in_memory() -> Self {
        Self {
            repo: std::sync::Arc::new(InMemoryRepository::new()),
            config: AppConfig::default(),
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// Any path no route matched.
async fn fallback(uri: Uri) -> ViewError {
    ViewError::UnknownRoute(uri)
}

/// create_router
///
/// Assembles the routes, the documentation UI, the request-id/tracing stack and CORS.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: any origin, method and header.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routes: docs, the blog views, and a fallback that answers like any other 404.
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .fallback(fallback)
        .with_state(state);

    // 3. Observability: request id, then the trace span that records it, then the id is
    // copied onto the response.
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Keeps an incoming x-request-id, otherwise generates one.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One span per request; responses logged at INFO with latency in ms.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echoes the id back on the response.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS outermost, so preflight requests never reach the router.
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with method, URI and the id `SetRequestIdLayer`
/// attached to the request. Every log line emitted while a view runs (including error
/// replies) carries these fields.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
