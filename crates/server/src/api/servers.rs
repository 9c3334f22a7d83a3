/// 服务器列表与电源控制接口（需要登录）

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use panel_common::{PowerAction, ServerId, ServerRecord, ServerStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;

use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::extractors::CurrentUser;

/// 直接设置状态请求
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    #[serde(default)]
    pub status: String,
}

/// 服务器路由
pub fn server_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_servers))
        .route("/:id", get(get_server))
        .route("/:id/power-on", post(power_on))
        .route("/:id/power-off", post(power_off))
        .route("/:id/reboot", post(reboot))
        .route("/:id/status", post(set_status))
}

fn parse_id(raw: &str) -> Result<ServerId, ApiError> {
    Ok(ServerId::from_str(raw)?)
}

/// 获取服务器列表，真实 VPS 在第一位
///
/// GET /api/servers
pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<ServerRecord>> {
    Json(state.fleet().list_servers().await)
}

/// 获取单台服务器
///
/// GET /api/servers/:id
pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServerRecord>, ApiError> {
    let id = parse_id(&id)?;
    let record = state.fleet().get_server(&id).await?;

    Ok(Json(record))
}

/// 开机
///
/// POST /api/servers/:id/power-on
pub async fn power_on(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    run_power_action(state, user, &id, PowerAction::On).await
}

/// 关机
///
/// POST /api/servers/:id/power-off
pub async fn power_off(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    run_power_action(state, user, &id, PowerAction::Off).await
}

/// 重启
///
/// POST /api/servers/:id/reboot
pub async fn reboot(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    run_power_action(state, user, &id, PowerAction::Reboot).await
}

async fn run_power_action(
    state: AppState,
    user: CurrentUser,
    raw_id: &str,
    action: PowerAction,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(raw_id)?;
    info!("用户 {} 请求对服务器 {} 执行 {}", user.email, id, action);

    let (cancel, _guard) = state.request_token();
    let power = state.fleet().power(&id, action, &cancel).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("服务器 {} 已完成 {}", id, action),
        "state": power
    })))
}

/// 直接设置模拟服务器状态
///
/// POST /api/servers/:id/status
/// Body: { "status": "online" | "offline" }
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<ServerRecord>, ApiError> {
    let id = parse_id(&id)?;
    state.fleet().ensure_mock(&id).await?;
    let status = ServerStatus::from_str(&req.status)?;
    let record = state.fleet().set_mock_status(&id, status).await?;

    Ok(Json(record))
}
