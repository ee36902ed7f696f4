//! 密码哈希和验证模块
//! 使用 bcrypt 进行密码哈希

use anyhow::{anyhow, Result};
use bcrypt::{hash, verify};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use bcrypt::DEFAULT_COST;

/// 密码包装器（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// 哈希密码
///
/// # Arguments
/// * `password` - 明文密码
/// * `cost` - bcrypt cost
pub fn hash_password(password: &Password, cost: u32) -> Result<String> {
    hash(password.as_str(), cost).map_err(|e| anyhow!("Failed to hash password: {}", e))
}

/// 验证密码
///
/// 如果密码匹配返回true，否则返回false
pub fn verify_password(password: &Password, hash: &str) -> Result<bool> {
    verify(password.as_str(), hash).map_err(|e| anyhow!("Failed to verify password: {}", e))
}
