use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only endpoints reachable without signing in. An anonymous caller gets the
/// active-only view; a signed-in caller presenting a token gets the view their role allows.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /comments?id=|owner=|post=|createDate=&page=&size=
        // Single lookup or paginated listing, filtered by the caller's identity.
        .route("/comments", get(handlers::find_comments))
}
