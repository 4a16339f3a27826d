// ==========================================
// 实验室产能排程系统 - 产能分析领域模型
// ==========================================
// 职责: 产能概览 / 风险需求 / 建议 / 资源利用率
// 红线: 只读报表对象，不参与排程决策
// ==========================================

use crate::domain::types::{BottleneckFactor, Priority};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// MethodCapacity - 方法级产能
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCapacity {
    pub method_id: String,
    pub method_name: String,

    // ===== 产能 (样品数) =====
    pub daily_capacity: f64,
    pub weekly_capacity: f64,
    pub available_capacity: f64, // weekly × (1 - utilization)

    // ===== 负荷 =====
    pub current_utilization: f64, // 0.0 ~ 1.0+
    pub scheduled_hours: f64,
    pub queued_hours: f64,

    // ===== 资源 =====
    pub qualified_operators: usize,
    pub available_instruments: usize,
    pub bottleneck_factor: BottleneckFactor,
}

// ==========================================
// OverallMetrics - 全局指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub total_daily_capacity: f64,
    pub total_weekly_capacity: f64,
    pub current_demand: u64, // 未完成需求的样品数
    pub capacity_utilization: f64,
    pub projected_bottlenecks: Vec<String>, // 饱和方法ID
    pub optimization_opportunities: usize,  // 建议条数
    pub on_time_rate: f64,                  // 已排程批次中未延期的比例
}

// ==========================================
// AtRiskDemand - 风险需求
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtRiskCause {
    LateAssignment,   // 已排程但晚于交期
    LeadTimeExceeded, // 尚未排程且前置期已不足
    Unschedulable,    // 当前无法排程
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskDemand {
    pub request_id: String,
    pub method_id: String,
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub projected_completion: Option<NaiveDateTime>,
    pub lateness_min: i64,
    pub cause: AtRiskCause,
}

// ==========================================
// Recommendation - 优化建议
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    CrossTraining, // 交叉培训
    Procurement,   // 采购仪器
    Overtime,      // 批准加班
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub method_id: String,
    pub resource_ids: Vec<String>,
    pub message: String,
}

// ==========================================
// ResourceUtilization - 资源利用率行
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instrument,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUtilization {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub scheduled_hours: f64,
    pub available_hours: f64,
    pub utilization: f64,
}

// ==========================================
// CapacityOverview - 产能概览
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityOverview {
    pub generated_at: NaiveDateTime,
    pub by_method: Vec<MethodCapacity>,
    pub overall_metrics: OverallMetrics,
    pub at_risk: Vec<AtRiskDemand>,
    pub recommendations: Vec<Recommendation>,
    pub instrument_utilization: Vec<ResourceUtilization>,
    pub operator_utilization: Vec<ResourceUtilization>,
}

impl CapacityOverview {
    pub fn method(&self, method_id: &str) -> Option<&MethodCapacity> {
        self.by_method.iter().find(|m| m.method_id == method_id)
    }
}
