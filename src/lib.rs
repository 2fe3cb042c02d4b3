use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Identity, configuration and persistence.
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;

// The comment engine: read visibility, delete moderation, and the service tying them together.
pub mod moderation;
pub mod service;
pub mod visibility;

// HTTP surface.
pub mod handlers;
pub mod routes;

use auth::CallerIdentity;
use error::CommentError;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use service::CommentService;

/// ApiDoc
///
/// OpenAPI description of the comment API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::find_comments, handlers::create_comment,
        handlers::edit_comment, handlers::delete_comment
    ),
    components(
        schemas(
            models::Comment, models::CommentState, models::CommentResponse,
            models::CreateCommentRequest, models::EditCommentRequest, service::Lookup,
        )
    ),
    tags(
        (name = "blog-comments", description = "Blog comment moderation API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container of the services every request needs.
#[derive(Clone)]
pub struct AppState {
    /// Storage collaborator, also used by identity resolution.
    pub repo: RepositoryState,
    /// The comment engine, built over the same repository.
    pub comments: CommentService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            comments: CommentService::new(repo.clone()),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CommentService {
    fn from_ref(app_state: &AppState) -> CommentService {
        app_state.comments.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_identity
///
/// Guards the authenticated routes. Identity resolution itself rejects bad tokens with
/// 401; this layer additionally turns away callers who sent no credentials at all.
async fn require_identity(
    identity: CallerIdentity,
    request: Request,
    next: Next,
) -> Result<Response, CommentError> {
    identity.require_authenticated()?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles routing, the authentication guard, observability layers and state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_identity,
            )),
        )
        .with_state(state);

    // Request ids are generated first so the trace span can record them.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// One span per request, tagged with method, URI and the `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
