// ==========================================
// 实验室产能排程系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态（配置库 + 调度器）
// ==========================================

use crate::config::{ConfigManager, PlanningConfigReader};
use crate::domain::calendar::CalendarConfig;
use crate::engine::LabScheduler;
use anyhow::Context;
use std::sync::Arc;

/// 应用状态
pub struct AppState {
    /// 配置库路径（":memory:" 表示内存库）
    pub db_path: String,

    pub config_manager: Arc<ConfigManager>,

    pub scheduler: Arc<LabScheduler>,
}

impl AppState {
    /// 打开配置库、读取排程参数并创建调度器
    pub async fn new(db_path: &str, calendar: CalendarConfig) -> anyhow::Result<Self> {
        tracing::info!(db_path, "初始化AppState");

        let config_manager = if db_path == ":memory:" {
            ConfigManager::in_memory()
        } else {
            ConfigManager::new(db_path)
        }
        .with_context(|| format!("无法打开配置库: {}", db_path))?;

        Self::from_config_manager(db_path, Arc::new(config_manager), calendar).await
    }

    pub async fn from_config_manager(
        db_path: &str,
        config_manager: Arc<ConfigManager>,
        calendar: CalendarConfig,
    ) -> anyhow::Result<Self> {
        let planning = config_manager
            .load_planning_config()
            .await
            .context("读取排程参数失败")?;
        tracing::info!(
            horizon_days = planning.horizon_days,
            min_proficiency = %planning.min_proficiency,
            request_ordering = %planning.policy.request_ordering,
            "排程参数已加载"
        );

        Ok(Self {
            db_path: db_path.to_string(),
            config_manager,
            scheduler: Arc::new(LabScheduler::new(planning, calendar)),
        })
    }
}

/// 默认配置库路径
///
/// 可通过环境变量 LAB_CAPACITY_APS_DB_PATH 显式指定
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("LAB_CAPACITY_APS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    "./lab_capacity_aps.db".to_string()
}
