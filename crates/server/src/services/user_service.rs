/// 用户注册与登录

use chrono::Utc;
use panel_common::utils::generate_id;
use panel_common::{Error, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{info, warn};
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{hash_password, issue_token, verify_password};
use crate::db::models::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, LoginDto,
    LoginResponse, RegisterDto, User, UserResponse, DEFAULT_ROLE,
};

pub struct UserService {
    state: AppState,
}

impl UserService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// 按邮箱查找用户
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(&self.state.sea_db())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// 注册新用户
    pub async fn register(&self, dto: RegisterDto) -> Result<UserResponse> {
        dto.validate()
            .map_err(|e| Error::InvalidArgument(format!("缺少或无效的凭据: {}", e)))?;

        let email = dto.email.trim().to_lowercase();
        if self.find_by_email(&email).await?.is_some() {
            return Err(Error::AlreadyExists(format!("用户 {} 已注册", email)));
        }

        let password_hash = hash_password(&dto.password, self.state.config.bcrypt_cost).await?;
        let role = dto.role.unwrap_or_else(|| DEFAULT_ROLE.to_string());

        let user = UserActiveModel {
            id: Set(generate_id()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            role: Set(role),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.state.sea_db())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        info!("👤 新用户注册: {} ({})", user.email, user.role);
        Ok(UserResponse::from(user))
    }

    /// 登录，成功返回 JWT
    pub async fn login(&self, dto: LoginDto) -> Result<LoginResponse> {
        dto.validate()
            .map_err(|e| Error::InvalidArgument(format!("缺少凭据: {}", e)))?;

        let email = dto.email.trim().to_lowercase();
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::Authentication("用户不存在".to_string()))?;

        if !verify_password(&dto.password, &user.password_hash).await? {
            warn!("用户 {} 登录失败: 密码错误", email);
            return Err(Error::Authentication("密码错误".to_string()));
        }

        let config = &self.state.config;
        let token = issue_token(&user.email, &user.role, &config.jwt_secret, config.jwt_ttl_hours)?;

        info!("用户 {} 登录成功", user.email);
        Ok(LoginResponse { token })
    }
}
