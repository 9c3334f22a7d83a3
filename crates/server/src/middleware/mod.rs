/// 认证中间件

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::api::error::ApiError;
use crate::app_state::AppState;
use crate::auth::verify_token;
use crate::extractors::CurrentUser;

/// 校验 `Authorization: Bearer <token>`，通过后把当前用户放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("未提供令牌".to_string()))?;

    let claims = verify_token(token, &state.config.jwt_secret).map_err(|e| {
        debug!("令牌校验失败: {}", e);
        ApiError::Unauthorized("令牌无效或已过期".to_string())
    })?;

    req.extensions_mut().insert(CurrentUser::from(claims));
    Ok(next.run(req).await)
}
