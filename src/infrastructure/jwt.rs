//! JWT Token 生成和验证模块

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub email: String, // 登录邮箱
    pub exp: i64,      // Expiration time
    pub iat: i64,      // Issued at
    pub jti: String,   // JWT ID - 确保每个token唯一
}

impl Claims {
    pub fn new(user_id: &str, email: &str, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(), // ✅ 每个token生成唯一ID
        }
    }
}

/// HS256 签名密钥
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expires_in_secs: i64,
}

impl JwtKeys {
    pub fn new(secret: &str, expires_in_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expires_in_secs,
        }
    }

    pub fn from_config(config: &JwtConfig) -> Self {
        Self::new(&config.secret, config.token_expiry_secs as i64)
    }

    /// 生成JWT Token
    pub fn generate_token(&self, user_id: &str, email: &str) -> Result<String> {
        let claims = Claims::new(user_id, email, self.expires_in_secs);
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to encode token: {}", e))
    }

    /// 验证JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        tracing::debug!(token_len = token.len(), "JWT: starting verification");

        let mut validation = Validation::default();
        validation.validate_exp = true; // ✅强制验证过期时间
        validation.leeway = 10; // 允许10秒时钟偏差

        let token_data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::warn!(error = %e, "JWT: token verification failed");
            anyhow!("Token verification failed: {}", e)
        })?;

        let claims = token_data.claims;
        if claims.sub.is_empty() {
            return Err(anyhow!("Token has an empty subject"));
        }

        tracing::debug!(sub = %claims.sub, "JWT: claims decoded");
        Ok(claims)
    }
}
