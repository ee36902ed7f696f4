//! 请求提取与分页
//!
//! 成功响应直接返回业务 JSON；解析失败统一转换为 AppError（400 + `{error, code}`）

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

pub mod pagination;

/// JSON 请求体，解析失败返回 400
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// 查询参数，解析失败返回 400
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// 路径参数
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
