/// 认证接口（无需登录）

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::db::models::user::{LoginDto, LoginResponse, RegisterDto};
use crate::services::user_service::UserService;

/// 认证路由
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// 注册
///
/// POST /api/auth/register
/// Body: RegisterDto
pub async fn register(
    State(state): State<AppState>,
    Json(dto): Json<RegisterDto>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let service = UserService::new(state);
    let user = service.register(dto).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("用户 {} 注册成功", user.email)
        })),
    ))
}

/// 登录
///
/// POST /api/auth/login
/// Body: LoginDto
pub async fn login(
    State(state): State<AppState>,
    Json(dto): Json<LoginDto>,
) -> Result<Json<LoginResponse>, ApiError> {
    let service = UserService::new(state);
    let result = service.login(dto).await?;

    Ok(Json(result))
}
