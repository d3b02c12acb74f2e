// ==========================================
// 住院医师排班系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换下层错误为用户友好的错误消息
// 约束: 所有错误信息必须包含显式原因 (可解释性)
// ==========================================

use thiserror::Error;

use crate::engine::holiday_coverage::CoverageError;
use crate::engine::orchestrator::OrchestratorError;
use crate::repository::error::RepositoryError;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入与业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}: {reasons:?}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reasons: Vec<String>,
    },

    #[error("数据验证失败: {0}")]
    ValidationError(String),

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
    // 配置错误
    // ==========================================
    #[error("配置读取失败: {0}")]
    ConfigError(String),

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
// 目的: 将仓储层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition {
                    from,
                    to,
                    reasons: Vec::new(),
                }
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 OrchestratorError 转换
// ==========================================
impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(msg) => ApiError::InvalidInput(msg),
            OrchestratorError::InvalidTransition { from, to, reasons } => {
                ApiError::InvalidStateTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                    reasons,
                }
            }
            OrchestratorError::Config(msg) => ApiError::ConfigError(msg),
            OrchestratorError::Repository(err) => err.into(),
        }
    }
}

// ==========================================
// 从 CoverageError 转换
// ==========================================
impl From<CoverageError> for ApiError {
    fn from(err: CoverageError) -> Self {
        ApiError::ValidationError(err.to_string())
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
            entity: "Resident".to_string(),
            id: "R001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Resident"));
                assert!(msg.contains("R001"));
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn test_orchestrator_transition_error_keeps_reasons() {
        use crate::domain::types::WorkflowState;
        let err = OrchestratorError::InvalidTransition {
            from: WorkflowState::Created,
            to: WorkflowState::ResidentsRegistered,
            reasons: vec!["在岗住院医师不足".to_string()],
        };
        let api_err: ApiError = err.into();
        match api_err {
            ApiError::InvalidStateTransition { reasons, .. } => {
                assert_eq!(reasons.len(), 1);
            }
            _ => panic!("Expected InvalidStateTransition"),
        }
    }
}
