use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
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

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub mod routes;
use routes::{comments, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use guard::RouteRoles;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::CommentService;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_comment, handlers::find_all_comments, handlers::find_comment,
        handlers::reply_to_comment, handlers::find_replies, handlers::find_thread,
        handlers::update_comment, handlers::remove_comment, handlers::find_my_comments,
        handlers::find_comments_by_user, handlers::find_comments_by_content
    ),
    components(
        schemas(
            models::Comment, models::CommentNode, models::CreateCommentRequest,
            models::UpdateCommentRequest, models::User, auth::ValidRole, error::ErrorBody,
        )
    ),
    tags(
        (name = "comments", description = "Threaded comments on content items")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cheaply clonable container shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence, used directly only for subject resolution.
    pub repo: RepositoryState,
    /// Comment business rules on top of `repo`.
    pub comments: CommentService,
    /// Route → acceptable roles, consulted by the role guard.
    pub route_roles: Arc<RouteRoles>,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the service and the comments role table around a repository.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            comments: CommentService::new(repo.clone()),
            route_roles: Arc::new(comments::comment_route_roles()),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Handlers only need the comment service, so they extract it directly.
impl FromRef<AppState> for CommentService {
    fn from_ref(app_state: &AppState) -> CommentService {
        app_state.comments.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, the access-control layers and the observability
/// stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Route layers run outermost-last-added: `authenticate` resolves the subject,
    // then `role_guard` checks it against the matched route's requirements.
    let api = comments::comment_routes()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::role_guard,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(api)
        .with_state(state);

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
/// Opens the per-request span, tagged with the `x-request-id` set by the layer above
/// so every log line of a request can be correlated.
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
