// ==========================================
// 实验室产能排程系统 - 配置层
// ==========================================
// 职责: 排程参数管理,支持 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod planning_config;
pub mod planning_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use planning_config::{
    OvertimePrecedence, PlanningConfig, PlanningPolicy, RequestOrdering, MAX_WINDOW_DAYS,
};
pub use planning_config_trait::PlanningConfigReader;
