//! Web API router construction.

use axum::{
    Router,
    http::{HeaderValue, Method},
    response::Response,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{cache, costs, cron, status};

/// Dashboard data changes under the client's feet; browsers and proxies must
/// always come back to the server, which has its own cache.
pub const NO_STORE: &str = "private, no-store, must-revalidate";

/// Upper bound on any request. Long enough for the slowest CLI command
/// (`cron run`) to finish on its own timeout first.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/costs", get(costs::costs))
        .route("/cron", get(cron::list_cron))
        .route("/cron/{id}/run", post(cron::run_cron))
        .route("/cache", get(cache::cache_state))
        .route("/cache/{dataset}/invalidate", post(cache::invalidate))
        .layer(axum::middleware::map_response(
            |mut resp: Response| async move {
                resp.headers_mut().insert(
                    axum::http::header::CACHE_CONTROL,
                    HeaderValue::from_static(NO_STORE),
                );
                resp
            },
        ))
        .with_state(app_state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        cors,
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(REQUEST_TIMEOUT),
    ))
}
