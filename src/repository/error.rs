// ==========================================
// 实验室产能排程系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use chrono::NaiveDateTime;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("记录已存在: {entity} with id={id}")]
    Duplicate { entity: String, id: String },

    // ===== 并发控制错误 =====
    #[error("资源占用冲突: {resource_id} 在 [{start}, {end}) 已被批次 {holder} 占用")]
    ResourceConflict {
        resource_id: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        holder: String,
    },

    #[error("锁获取失败: {0}")]
    LockError(String),

    // ===== 序列化错误 =====
    #[error("快照序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::ResourceConflict { .. })
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
