use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::errors::{
    AuthError, ConnectionError, EvmError, QuoteError, SigningError, StatusError,
    SubmissionError, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Timeout,
    Internal,

    // 业务错误码
    ValidationFailed,
    InvalidAddress,
    InvalidAmount,
    InvalidCredentials,
    UserAlreadyExists,
    TokenInvalid,
    ConnectionFailed,
    WalletNotConnected,
    SignatureRejected,
    QuoteFailed,
    QuoteExpired,
    TransactionFailed,
    RpcError,
    ExternalServiceError,
    Cancelled,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::Forbidden => "forbidden",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Timeout => "timeout",
            AppErrorCode::Internal => "internal",

            AppErrorCode::ValidationFailed => "validation_failed",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::InvalidAmount => "invalid_amount",
            AppErrorCode::InvalidCredentials => "invalid_credentials",
            AppErrorCode::UserAlreadyExists => "user_already_exists",
            AppErrorCode::TokenInvalid => "token_invalid",
            AppErrorCode::ConnectionFailed => "connection_failed",
            AppErrorCode::WalletNotConnected => "wallet_not_connected",
            AppErrorCode::SignatureRejected => "signature_rejected",
            AppErrorCode::QuoteFailed => "quote_failed",
            AppErrorCode::QuoteExpired => "quote_expired",
            AppErrorCode::TransactionFailed => "transaction_failed",
            AppErrorCode::RpcError => "rpc_error",
            AppErrorCode::ExternalServiceError => "external_service_error",
            AppErrorCode::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                code = self.code.as_str(),
                status = self.status.as_u16(),
                trace_id = ?self.trace_id,
                "{}",
                self.message
            );
        }
        let mut response = self.render();
        // trace_id 中间件据此补写响应体中的 trace_id
        if self.trace_id.is_none() {
            response.extensions_mut().insert(self);
        }
        response
    }
}

impl AppError {
    /// 只渲染响应，不记录日志
    pub(crate) fn render(&self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            code: self.code.as_str(),
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl AppError {
    fn with_code(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(
            AppErrorCode::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            msg,
        )
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::Forbidden, StatusCode::FORBIDDEN, msg)
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::ValidationFailed, StatusCode::BAD_REQUEST, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::InvalidAddress, StatusCode::BAD_REQUEST, msg)
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::InvalidAmount, StatusCode::BAD_REQUEST, msg)
    }

    pub fn transaction_failed(msg: impl Into<String>) -> Self {
        Self::with_code(
            AppErrorCode::TransactionFailed,
            StatusCode::INTERNAL_SERVER_ERROR,
            msg,
        )
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self::with_code(AppErrorCode::RpcError, StatusCode::BAD_GATEWAY, msg)
    }

    pub fn external_service_error(msg: impl Into<String>) -> Self {
        Self::with_code(
            AppErrorCode::ExternalServiceError,
            StatusCode::BAD_GATEWAY,
            msg,
        )
    }

    /// 服务关闭过程中被取消的模拟操作
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::with_code(
            AppErrorCode::Cancelled,
            StatusCode::SERVICE_UNAVAILABLE,
            msg,
        )
    }
}

// 领域错误 → HTTP 错误

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::validation_failed(err.message)
    }
}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Rejected { reason } => Self::with_code(
                AppErrorCode::ConnectionFailed,
                StatusCode::INTERNAL_SERVER_ERROR,
                reason,
            ),
            ConnectionError::NotConnected(_) => Self::with_code(
                AppErrorCode::WalletNotConnected,
                StatusCode::NOT_FOUND,
                err.to_string(),
            ),
            ConnectionError::Cancelled => Self::cancelled(err.to_string()),
            ConnectionError::TooManySessions(_) => Self::with_code(
                AppErrorCode::ConnectionFailed,
                StatusCode::SERVICE_UNAVAILABLE,
                err.to_string(),
            ),
        }
    }
}

impl From<SigningError> for AppError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::UserRejected => Self::with_code(
                AppErrorCode::SignatureRejected,
                StatusCode::FORBIDDEN,
                err.to_string(),
            ),
            SigningError::NotConnected(_) => Self::with_code(
                AppErrorCode::WalletNotConnected,
                StatusCode::NOT_FOUND,
                err.to_string(),
            ),
            SigningError::Validation(v) => v.into(),
            SigningError::Cancelled => Self::cancelled(err.to_string()),
        }
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::Validation(v) => v.into(),
            QuoteError::Unavailable => Self::with_code(
                AppErrorCode::QuoteFailed,
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            ),
            QuoteError::Expired(_) | QuoteError::NotFound(_) => Self::with_code(
                AppErrorCode::QuoteExpired,
                StatusCode::BAD_REQUEST,
                err.to_string(),
            ),
            QuoteError::Cancelled => Self::cancelled(err.to_string()),
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(v) => v.into(),
            SubmissionError::Rejected(msg) => Self::transaction_failed(msg),
            SubmissionError::Cancelled => Self::cancelled(err.to_string()),
        }
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::Validation(v) => v.into(),
            StatusError::Cancelled => Self::cancelled(err.to_string()),
        }
    }
}

impl From<EvmError> for AppError {
    fn from(err: EvmError) -> Self {
        match err {
            EvmError::InvalidAddress(_) => Self::invalid_address(err.to_string()),
            EvmError::InvalidAmount(_) => Self::invalid_amount(err.to_string()),
            EvmError::Chain(msg) => Self::transaction_failed(msg),
            EvmError::Timeout(_) => Self::rpc_error(err.to_string()),
            EvmError::Cancelled => Self::cancelled(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(v) => v.into(),
            AuthError::InvalidCredentials => Self::with_code(
                AppErrorCode::InvalidCredentials,
                StatusCode::UNAUTHORIZED,
                err.to_string(),
            ),
            AuthError::EmailTaken => Self::with_code(
                AppErrorCode::UserAlreadyExists,
                StatusCode::CONFLICT,
                err.to_string(),
            ),
            AuthError::InvalidToken(_) => Self::with_code(
                AppErrorCode::TokenInvalid,
                StatusCode::UNAUTHORIZED,
                err.to_string(),
            ),
            AuthError::Provider(msg) => Self::external_service_error(msg),
        }
    }
}

// 请求体 / 查询参数解析失败统一为 400

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_failed(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_failed(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON serialization error: {}", err))
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{}", err))
    }
}
