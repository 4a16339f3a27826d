// ==========================================
// 实验室产能排程系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: ResourceConflict 只在分配器内部消化，不外抛
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 受理校验 =====
    #[error("需求校验失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("{entity} 不存在: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} 已存在: {id}")]
    Duplicate { entity: String, id: String },

    #[error("非法状态转换 ({entity}={id}): {from} -> {to}")]
    InvalidTransition {
        entity: String,
        id: String,
        from: String,
        to: String,
    },

    // ===== 基础设施 =====
    #[error("锁获取失败: {0}")]
    LockError(String),

    #[error("仓储错误: {0}")]
    Repository(RepositoryError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

// 仓储层的 NotFound / Duplicate 统一映射为受理错误
impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            RepositoryError::Duplicate { entity, id } => EngineError::Duplicate { entity, id },
            RepositoryError::LockError(msg) => EngineError::LockError(msg),
            other => EngineError::Repository(other),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
