/// 认证：密码哈希与 JWT

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use panel_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// JWT 载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// 用户邮箱
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// 签发令牌
pub fn issue_token(email: &str, role: &str, secret: &str, ttl_hours: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: email.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("签发令牌失败: {}", e)))
}

/// 校验令牌（签名与过期时间）
pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| Error::Authentication(format!("令牌无效或已过期: {}", e)))
}

/// 计算密码哈希（bcrypt 计算量大，放到阻塞线程池）
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .map_err(|e| Error::Internal(format!("密码加密失败: {}", e)))
}

/// 校验密码
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        .map_err(|e| Error::Internal(format!("密码校验失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = issue_token("admin@example.com", "admin", "secret", 2).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "admin@example.com");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 2 * 3600);
    }

    #[test]
    fn test_token_with_wrong_secret_is_rejected() {
        let token = issue_token("admin@example.com", "admin", "secret", 2).unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = issue_token("admin@example.com", "admin", "secret", -1).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[tokio::test]
    async fn test_password_hash() {
        let hash = hash_password("hunter2", 4).await.unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash).await.unwrap());
        assert!(!verify_password("hunter3", &hash).await.unwrap());
    }
}
