// ==========================================
// 实验室产能排程系统 - 配置层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("锁获取失败: {0}")]
    LockError(String),

    #[error("配置快照格式错误: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("配置值非法 (key={key}): {value}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
