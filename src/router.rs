use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        // パスワードリセット
        .route("/forgot-password", post(handlers::forgot_password))
        .route(
            "/verify-reset-token/{token}",
            get(handlers::verify_reset_token),
        )
        .route("/reset-password/{token}", post(handlers::reset_password));

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .nest("/auth", auth_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
