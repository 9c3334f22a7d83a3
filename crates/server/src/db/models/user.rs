use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 用户模型
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub type User = Model;

/// 默认角色
pub const DEFAULT_ROLE: &str = "user";

/// 注册 DTO
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterDto {
    #[serde(default)]
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "密码不能为空"))]
    pub password: String,

    #[serde(default, alias = "rol")]
    #[validate(length(min = 1, max = 32))]
    pub role: Option<String>,
}

/// 登录 DTO
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginDto {
    #[serde(default)]
    #[validate(length(min = 1, message = "邮箱不能为空"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "密码不能为空"))]
    pub password: String,
}

/// 用户响应 DTO
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// 登录响应
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
