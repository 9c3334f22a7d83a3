/// 请求提取器

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::api::error::ApiError;
use crate::auth::Claims;

/// 当前登录用户（由认证中间件写入请求扩展）
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub email: String,
    pub role: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.sub,
            role: claims.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("未登录".to_string()))
    }
}
