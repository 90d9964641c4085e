//! 标准化错误处理
//!
//! 定义代理层专用的错误类型，以及到 HTTP 状态码的统一映射

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CRM 返回的单条错误详情
///
/// 对应远端错误体 `[{"message": ..., "errorCode": ..., "fields": [...]}]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "errorCode", alias = "statusCode", default)]
    pub error_code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl ApiErrorDetail {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: error_code.into(),
            fields: Vec::new(),
        }
    }
}

/// 项目主要错误类型
#[derive(Error, Debug)]
pub enum CrmError {
    /// 尚未建立会话，且无法自动登录
    #[error("Not connected to CRM")]
    NotConnected,

    /// 登录失败
    #[error("Login failed: {0}")]
    LoginError(String),

    /// 输入校验错误（对象名、字段名、记录 ID、请求体）
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 记录不存在
    #[error("Record not found: {0}")]
    NotFound(String),

    /// CRM 拒绝了请求
    #[error("CRM API error ({status}): {}", summarize(.errors))]
    ApiError {
        status: u16,
        errors: Vec<ApiErrorDetail>,
    },

    /// 网络请求错误
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// 响应解析错误
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn summarize(errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| {
            if e.error_code.is_empty() {
                e.message.clone()
            } else {
                format!("{}: {}", e.error_code, e.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl CrmError {
    /// 映射为对外的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrmError::ValidationError(_) => StatusCode::BAD_REQUEST,
            CrmError::NotFound(_) => StatusCode::NOT_FOUND,
            CrmError::ApiError { status, .. } => match *status {
                400 => StatusCode::BAD_REQUEST,
                404 => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// CRM 返回的错误详情（仅 `ApiError` 携带）
    pub fn details(&self) -> &[ApiErrorDetail] {
        match self {
            CrmError::ApiError { errors, .. } => errors,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::DecodeError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CrmError {
    fn from(err: serde_yaml::Error) -> Self {
        CrmError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for CrmError {
    fn from(err: std::io::Error) -> Self {
        CrmError::ConfigError(err.to_string())
    }
}

/// 项目结果类型别名
pub type Result<T> = std::result::Result<T, CrmError>;
