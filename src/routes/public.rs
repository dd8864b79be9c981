use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// The three blog views plus the health probe. Nothing here writes.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers; does not touch the store.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Front page: the first visible posts by publication date.
        .route("/", get(handlers::index))
        // GET /category/{category_slug}
        // A published category and its visible posts. Unknown and unpublished
        // categories both answer 404.
        .route("/category/{category_slug}", get(handlers::category_posts))
        // GET /posts/{id}
        // A single post, only while it passes the visibility rules.
        .route("/posts/{id}", get(handlers::post_detail))
}
