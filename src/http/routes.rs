use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/v1/posts", post(handlers::create_post))
        .route("/v1/posts/:id", get(handlers::get_post))
        .route(
            "/v1/posts/:id/like",
            post(handlers::like_post).delete(handlers::unlike_post),
        )
        .route(
            "/v1/posts/:id/comments",
            post(handlers::add_comment).get(handlers::list_comments),
        )
        .route("/v1/posts/:id/perpetuate", post(handlers::perpetuate_post))
}

pub fn feed() -> Router<AppState> {
    Router::new()
        .route("/v1/feed/me", get(handlers::my_feed))
        .route("/v1/feed/trending", get(handlers::trending_feed))
}

pub fn account() -> Router<AppState> {
    Router::new()
        .route("/v1/account/eligibility", get(handlers::get_eligibility))
        .route("/v1/account/engagement", get(handlers::get_engagement))
}
