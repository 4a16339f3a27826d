// ==========================================
// 实验室产能排程系统 - 排程配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::planning_config::{
    OvertimePrecedence, PlanningConfig, PlanningPolicy, RequestOrdering,
};
use crate::domain::types::ProficiencyLevel;
use async_trait::async_trait;

// ==========================================
// PlanningConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PlanningConfigReader: Send + Sync {
    // ===== 排程窗口 =====

    /// 排程窗口天数
    ///
    /// # 默认值
    /// - 90
    async fn get_horizon_days(&self) -> ConfigResult<i64>;

    /// 下一工作日查找上限（天）
    async fn get_calendar_search_limit_days(&self) -> ConfigResult<i64>;

    // ===== 资格与加班 =====

    /// 最低熟练等级
    ///
    /// # 默认值
    /// - beginner
    async fn get_min_proficiency(&self) -> ConfigResult<ProficiencyLevel>;

    /// 加班延长分钟数
    ///
    /// # 默认值
    /// - 120
    async fn get_overtime_extension_minutes(&self) -> ConfigResult<i64>;

    async fn get_max_reservation_rounds(&self) -> ConfigResult<u32>;

    // ===== 产能分析 =====

    async fn get_operating_hours_per_day(&self) -> ConfigResult<f64>;
    async fn get_analysis_window_days(&self) -> ConfigResult<i64>;
    async fn get_saturation_threshold(&self) -> ConfigResult<f64>;
    async fn get_balance_tolerance(&self) -> ConfigResult<f64>;

    // ===== 策略 =====

    async fn get_request_ordering(&self) -> ConfigResult<RequestOrdering>;
    async fn get_overtime_precedence(&self) -> ConfigResult<OvertimePrecedence>;

    /// 组装完整排程参数
    async fn load_planning_config(&self) -> ConfigResult<PlanningConfig> {
        Ok(PlanningConfig {
            horizon_days: self.get_horizon_days().await?,
            min_proficiency: self.get_min_proficiency().await?,
            operating_hours_per_day: self.get_operating_hours_per_day().await?,
            analysis_window_days: self.get_analysis_window_days().await?,
            saturation_threshold: self.get_saturation_threshold().await?,
            balance_tolerance: self.get_balance_tolerance().await?,
            overtime_extension_minutes: self.get_overtime_extension_minutes().await?,
            max_reservation_rounds: self.get_max_reservation_rounds().await?,
            calendar_search_limit_days: self.get_calendar_search_limit_days().await?,
            policy: PlanningPolicy {
                request_ordering: self.get_request_ordering().await?,
                overtime_precedence: self.get_overtime_precedence().await?,
            },
        })
    }
}
