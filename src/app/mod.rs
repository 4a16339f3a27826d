// ==========================================
// 实验室产能排程系统 - 应用层
// ==========================================
// 职责: 组装配置库与调度器，提供场景运行入口
// ==========================================

pub mod scenario;
pub mod state;

// 重导出
pub use scenario::{RejectedDemand, Scenario, ScenarioOutput, ScenarioRunner};
pub use state::{get_default_db_path, AppState};
