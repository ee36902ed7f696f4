//! 领域错误定义
//!
//! 模拟层的错误都是一次性终态错误，不做自动重试；
//! 真实链桥接的错误由 EvmClient 自己做退避重试

use thiserror::Error;

/// 参数校验错误（地址、金额、哈希格式等）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 钱包连接错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("{reason}")]
    Rejected { reason: String },

    #[error("Wallet session {0} is not connected")]
    NotConnected(String),

    #[error("Wallet operation cancelled")]
    Cancelled,

    #[error("Too many wallet sessions (limit {0})")]
    TooManySessions(usize),
}

impl ConnectionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// 签名错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("User rejected the signature request")]
    UserRejected,

    #[error("Wallet session {0} is not connected")]
    NotConnected(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Signature request cancelled")]
    Cancelled,
}

/// 报价错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuoteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to get swap quote")]
    Unavailable,

    #[error("Quote {0} has expired")]
    Expired(String),

    #[error("Quote {0} not found")]
    NotFound(String),

    #[error("Quote request cancelled")]
    Cancelled,
}

/// 交易提交错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Rejected(String),

    #[error("Transaction submission cancelled")]
    Cancelled,
}

/// 交易状态查询错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Status query cancelled")]
    Cancelled,
}

/// 链桥接错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvmError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Chain call timed out after {0}s")]
    Timeout(u64),

    #[error("Chain call cancelled")]
    Cancelled,
}

impl From<SubmissionError> for EvmError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(v) => Self::InvalidAmount(v.message),
            SubmissionError::Rejected(msg) => Self::Chain(msg),
            SubmissionError::Cancelled => Self::Cancelled,
        }
    }
}

/// 认证错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Auth provider error: {0}")]
    Provider(String),
}
