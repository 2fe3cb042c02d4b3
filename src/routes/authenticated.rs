use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post},
};

/// Authenticated Router Module
///
/// Write endpoints. The `require_identity` layer above this router rejects anonymous
/// callers with 401 before any handler runs; ownership and role checks happen in the
/// comment service.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /comments?post={id}   create a comment owned by the caller
        // PUT  /comments             owner-only content edit
        .route(
            "/comments",
            post(handlers::create_comment).put(handlers::edit_comment),
        )
        // DELETE /comments/{id}
        // One moderation step: soft delete, admin redaction, or permanent removal.
        .route("/comments/{id}", delete(handlers::delete_comment))
}
