//! HTTP route handlers.

pub mod meta;
pub mod signing;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

/// Builds the application router.
///
/// Axum's default 2 MB body cap is replaced by the configured upload limit,
/// since archives routinely exceed it.
pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(meta::health_check))
        .route("/version", get(meta::version))
        .route("/sign-ipa", post(signing::sign_ipa))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_upload_bytes)),
        )
        .with_state(state)
}
