//! 账户认证提供方
//!
//! 默认使用进程内 bcrypt 账户表；配置了 `auth_provider.url` 时转发到外部认证服务。
//! Token 由调用方用 JwtKeys 签发，这里只负责校验凭据

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AuthProviderConfig,
    domain::errors::{AuthError, ValidationError},
    infrastructure::password::{hash_password, verify_password, Password},
};

/// 最短密码长度
pub const MIN_PASSWORD_LEN: usize = 6;

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &Password) -> Result<AuthUser, AuthError>;

    async fn sign_in(&self, email: &str, password: &Password) -> Result<AuthUser, AuthError>;

    fn name(&self) -> &'static str;
}

/// 规范化邮箱并检查凭据格式
pub fn validate_credentials(email: &str, password: &Password) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ValidationError::new("Invalid email address"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(email)
}

struct StoredAccount {
    user: AuthUser,
    password_hash: String,
}

/// 进程内账户表
pub struct InMemoryAuthProvider {
    accounts: RwLock<HashMap<String, StoredAccount>>,
    bcrypt_cost: u32,
}

impl InMemoryAuthProvider {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            bcrypt_cost,
        }
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self::new(crate::infrastructure::password::DEFAULT_COST)
    }
}

// bcrypt 是 CPU 密集操作，放到阻塞线程池
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Provider(e.to_string()))?
        .map_err(|e| AuthError::Provider(e.to_string()))
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_up(&self, email: &str, password: &Password) -> Result<AuthUser, AuthError> {
        let email = validate_credentials(email, password)?;
        if self.accounts.read().await.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }

        let plain = Password::new(password.as_str().to_string());
        let cost = self.bcrypt_cost;
        let password_hash = blocking(move || hash_password(&plain, cost)).await?;

        let mut accounts = self.accounts.write().await;
        // 哈希期间可能有并发注册
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        accounts.insert(
            email,
            StoredAccount {
                user: user.clone(),
                password_hash,
            },
        );

        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &Password) -> Result<AuthUser, AuthError> {
        let email = validate_credentials(email, password)?;
        let (user, password_hash) = {
            let accounts = self.accounts.read().await;
            let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
            (account.user.clone(), account.password_hash.clone())
        };

        let plain = Password::new(password.as_str().to_string());
        let matches = blocking(move || verify_password(&plain, &password_hash)).await?;
        if !matches {
            tracing::warn!(user_id = %user.id, "Sign-in rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ProviderResponse {
    user: AuthUser,
}

/// 外部认证服务
pub struct HttpAuthProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpAuthProvider {
    pub fn new(config: &AuthProviderConfig) -> Result<Self> {
        let base_url = config
            .url
            .as_deref()
            .context("AUTH_PROVIDER_URL is not configured")?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .context("Failed to create HTTP client")?,
        })
    }

    async fn post_credentials(
        &self,
        path: &str,
        email: &str,
        password: &Password,
    ) -> Result<AuthUser, AuthError> {
        let email = validate_credentials(email, password)?;
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.client.post(&url).json(&CredentialsBody {
            email: &email,
            password: password.as_str(),
        });
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Auth provider request failed");
            AuthError::Provider(e.to_string())
        })?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            400 | 401 | 403 => return Err(AuthError::InvalidCredentials),
            409 | 422 if path == "signup" => return Err(AuthError::EmailTaken),
            _ => {
                let text = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %text, "Auth provider returned an error");
                return Err(AuthError::Provider(format!("status {}", status)));
            }
        }

        response
            .json::<ProviderResponse>()
            .await
            .map(|r| r.user)
            .map_err(|e| AuthError::Provider(format!("Invalid provider response: {}", e)))
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn sign_up(&self, email: &str, password: &Password) -> Result<AuthUser, AuthError> {
        self.post_credentials("signup", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &Password) -> Result<AuthUser, AuthError> {
        self.post_credentials("login", email, password).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
