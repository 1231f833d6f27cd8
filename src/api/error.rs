// ==========================================
// 产线排产系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 约定: 失败响应统一为 {error_code: -1, code, message[, errors]}
// 状态码: 校验/业务规则 422, 未找到 404, 其余 500
// ==========================================

use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// 字段级校验失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入与业务规则错误
    // ==========================================
    /// 请求字段校验失败（一次性返回全部违规字段）
    #[error("参数校验失败: {reason}")]
    ValidationFailed {
        reason: String,
        violations: Vec<FieldViolation>,
    },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl ApiError {
    /// 单字段校验失败
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationFailed {
            reason: format!("字段 {} 不合法", field),
            violations: vec![FieldViolation {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    /// 错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::ValidationFailed { .. }
            | ApiError::InvalidInput(_)
            | ApiError::BusinessRuleViolation(_) => 422,
            ApiError::NotFound(_) => 404,
            _ => 500,
        }
    }

    /// 失败响应体
    ///
    /// 内部错误只返回概要信息, 细节写日志
    pub fn to_envelope(&self) -> serde_json::Value {
        let message = match self.http_status() {
            500 => {
                tracing::error!(code = self.code(), error = %self, "请求处理失败");
                "服务器内部错误".to_string()
            }
            _ => self.to_string(),
        };

        let mut body = serde_json::json!({
            "error_code": -1,
            "code": self.code(),
            "message": message,
        });

        if let ApiError::ValidationFailed { violations, .. } = self {
            let errors: BTreeMap<&str, &str> = violations
                .iter()
                .map(|v| (v.field.as_str(), v.message.as_str()))
                .collect();
            body["errors"] = serde_json::json!(errors);
        }
        body
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "Order".to_string(),
            id: "O001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match &api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Order"));
                assert!(msg.contains("O001"));
            }
            _ => panic!("Expected NotFound"),
        }
        assert_eq!(api_err.http_status(), 404);

        let api_err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert_eq!(api_err.http_status(), 500);
    }

    #[test]
    fn test_validation_envelope_lists_fields() {
        let err = ApiError::ValidationFailed {
            reason: "2 个字段不合法".to_string(),
            violations: vec![
                FieldViolation {
                    field: "minute".to_string(),
                    message: "必须为 0".to_string(),
                },
                FieldViolation {
                    field: "workers".to_string(),
                    message: "必须大于 0".to_string(),
                },
            ],
        };
        assert_eq!(err.http_status(), 422);

        let body = err.to_envelope();
        assert_eq!(body["error_code"], -1);
        assert_eq!(body["errors"]["minute"], "必须为 0");
        assert_eq!(body["errors"]["workers"], "必须大于 0");
    }

    #[test]
    fn test_internal_error_hides_details() {
        let body = ApiError::DatabaseError("no such table: secret".to_string()).to_envelope();
        assert_eq!(body["error_code"], -1);
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }
}
