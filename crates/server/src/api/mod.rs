pub mod auth;
pub mod error;
pub mod servers;

use axum::{
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    app_state::AppState,
    middleware::auth_middleware,
};

/// 所有 API 路由（统一入口）
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(status_handler))
        // 不需要认证的路由
        .nest("/auth", auth::auth_routes())
        // 需要认证的路由
        .nest("/servers",
            servers::server_routes()
                .layer(from_fn_with_state(state, auth_middleware))
        )
}

/// 完整的应用路由
pub fn build_router(state: AppState) -> Router {
    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .nest("/api", api_routes(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "VPS Panel Server API v1"
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn status_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
