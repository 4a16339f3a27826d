// ==========================================
// 实验室产能排程系统 - 排程参数
// ==========================================
// 职责: 排程窗口 / 资格门槛 / 分析口径 / 排序策略
// 来源: 默认值 + config_kv 覆写（见 ConfigManager）
// ==========================================

use crate::domain::types::ProficiencyLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// RequestOrdering - 需求排序策略
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestOrdering {
    #[default]
    PriorityFirst, // 优先级 → 交期 → 提交顺序
    DueDateFirst,  // 交期 → 优先级 → 提交顺序
}

impl fmt::Display for RequestOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOrdering::PriorityFirst => write!(f, "priority_first"),
            RequestOrdering::DueDateFirst => write!(f, "due_date_first"),
        }
    }
}

impl RequestOrdering {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "priority_first" => Some(RequestOrdering::PriorityFirst),
            "due_date_first" => Some(RequestOrdering::DueDateFirst),
            _ => None,
        }
    }
}

// ==========================================
// OvertimePrecedence - 加班取舍策略
// ==========================================
// 仅在开始时间、仪器偏好、熟练度、负载均相同时生效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OvertimePrecedence {
    #[default]
    Neutral,       // 不区分
    PreferRegular, // 正常班优先于加班
}

impl fmt::Display for OvertimePrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OvertimePrecedence::Neutral => write!(f, "neutral"),
            OvertimePrecedence::PreferRegular => write!(f, "prefer_regular"),
        }
    }
}

impl OvertimePrecedence {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Some(OvertimePrecedence::Neutral),
            "prefer_regular" => Some(OvertimePrecedence::PreferRegular),
            _ => None,
        }
    }
}

// ==========================================
// PlanningPolicy - 排序/取舍策略组合
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanningPolicy {
    #[serde(default)]
    pub request_ordering: RequestOrdering,
    #[serde(default)]
    pub overtime_precedence: OvertimePrecedence,
}

// ==========================================
// PlanningConfig - 排程参数全集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// 排程窗口（天），超出即 CALENDAR_EXHAUSTED
    pub horizon_days: i64,
    /// 最低熟练等级
    pub min_proficiency: ProficiencyLevel,
    /// 仪器日运行小时（产能口径）
    pub operating_hours_per_day: f64,
    /// 利用率分析窗口（天）
    pub analysis_window_days: i64,
    /// 饱和阈值（利用率 ≥ 该值视为饱和）
    pub saturation_threshold: f64,
    /// 瓶颈判定容差（两侧负荷差 ≤ 该值视为均衡）
    pub balance_tolerance: f64,
    /// 已批准加班操作员可超出班次的分钟数
    pub overtime_extension_minutes: i64,
    /// 预留冲突后重新搜索的轮数上限
    pub max_reservation_rounds: u32,
    /// 查找下一个工作日的天数上限
    pub calendar_search_limit_days: i64,
    pub policy: PlanningPolicy,
}

/// 排程窗口 / 分析窗口的天数上限
pub const MAX_WINDOW_DAYS: i64 = 3650;

impl PlanningConfig {
    /// 限制在 [1, MAX_WINDOW_DAYS] 内的排程窗口天数
    pub fn effective_horizon_days(&self) -> i64 {
        self.horizon_days.clamp(1, MAX_WINDOW_DAYS)
    }

    pub fn effective_analysis_window_days(&self) -> i64 {
        self.analysis_window_days.clamp(1, MAX_WINDOW_DAYS)
    }

    /// 加班延长分钟数，限制在 [0, 一天] 内
    pub fn effective_overtime_extension_minutes(&self) -> i64 {
        self.overtime_extension_minutes.clamp(0, 24 * 60)
    }
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            horizon_days: 90,
            min_proficiency: ProficiencyLevel::Beginner,
            operating_hours_per_day: 8.0,
            analysis_window_days: 7,
            saturation_threshold: 0.85,
            balance_tolerance: 0.10,
            overtime_extension_minutes: 120,
            max_reservation_rounds: 3,
            calendar_search_limit_days: 366,
            policy: PlanningPolicy::default(),
        }
    }
}
