// ==========================================
// 实验室产能排程系统 - 引擎层事件
// ==========================================
// 职责:
// - ResourceEvent: 资源状态变更事件，入队后于下个周期开始时统一应用
// - PlanningEvent: 周期结果事件，通过发布 trait 通知下游
// 说明: Engine 层定义 trait，外层实现适配器
// ==========================================

use crate::domain::calendar::CalendarConfig;
use crate::domain::personnel::{LeaveInterval, ProficiencyRecord};
use crate::domain::resource::{CompatibilityRule, Method};
use crate::domain::types::InstrumentStatus;
use crate::domain::window::TimeWindow;
use crate::engine::calendar::CalendarService;
use crate::engine::error::EngineResult;
use crate::engine::personnel_roster::PersonnelRoster;
use crate::engine::resource_catalog::ResourceCatalog;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 资源状态变更事件
// ==========================================

/// 资源状态变更
///
/// 周期运行期间到达的变更先入队，下个周期开始时按到达顺序应用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceEvent {
    InstrumentStatusChanged {
        instrument_id: String,
        status: InstrumentStatus,
    },
    InstrumentDowntimeAdded {
        instrument_id: String,
        window: TimeWindow,
    },
    CalibrationUpdated {
        instrument_id: String,
        calibration: Option<TimeWindow>,
    },
    OperatorLeaveAdded {
        operator_id: String,
        leave: LeaveInterval,
    },
    OperatorDeactivated {
        operator_id: String,
    },
    OvertimeApprovalChanged {
        operator_id: String,
        approved: bool,
    },
    ProficiencyUpdated {
        record: ProficiencyRecord,
    },
    MethodUpdated {
        method: Method,
    },
    MethodDeactivated {
        method_id: String,
    },
    RuleRegistered {
        rule: CompatibilityRule,
    },
    RuleRemoved {
        method_id: String,
        instrument_id: String,
    },
    CalendarUpdated {
        config: CalendarConfig,
    },
}

impl ResourceEvent {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceEvent::InstrumentStatusChanged { .. } => "InstrumentStatusChanged",
            ResourceEvent::InstrumentDowntimeAdded { .. } => "InstrumentDowntimeAdded",
            ResourceEvent::CalibrationUpdated { .. } => "CalibrationUpdated",
            ResourceEvent::OperatorLeaveAdded { .. } => "OperatorLeaveAdded",
            ResourceEvent::OperatorDeactivated { .. } => "OperatorDeactivated",
            ResourceEvent::OvertimeApprovalChanged { .. } => "OvertimeApprovalChanged",
            ResourceEvent::ProficiencyUpdated { .. } => "ProficiencyUpdated",
            ResourceEvent::MethodUpdated { .. } => "MethodUpdated",
            ResourceEvent::MethodDeactivated { .. } => "MethodDeactivated",
            ResourceEvent::RuleRegistered { .. } => "RuleRegistered",
            ResourceEvent::RuleRemoved { .. } => "RuleRemoved",
            ResourceEvent::CalendarUpdated { .. } => "CalendarUpdated",
        }
    }

    /// 将变更写入目录 / 名册 / 日历
    pub fn apply(
        &self,
        catalog: &ResourceCatalog,
        roster: &PersonnelRoster,
        calendar: &mut CalendarService,
    ) -> EngineResult<()> {
        match self {
            ResourceEvent::InstrumentStatusChanged {
                instrument_id,
                status,
            } => {
                catalog.set_instrument_status(instrument_id, *status)?;
            }
            ResourceEvent::InstrumentDowntimeAdded {
                instrument_id,
                window,
            } => {
                catalog.add_downtime(instrument_id, *window)?;
            }
            ResourceEvent::CalibrationUpdated {
                instrument_id,
                calibration,
            } => {
                catalog.set_calibration(instrument_id, *calibration)?;
            }
            ResourceEvent::OperatorLeaveAdded { operator_id, leave } => {
                roster.add_leave(operator_id, leave.clone())?;
            }
            ResourceEvent::OperatorDeactivated { operator_id } => {
                roster.deactivate_operator(operator_id)?;
            }
            ResourceEvent::OvertimeApprovalChanged {
                operator_id,
                approved,
            } => {
                roster.set_overtime_approval(operator_id, *approved)?;
            }
            ResourceEvent::ProficiencyUpdated { record } => {
                roster.upsert_proficiency(record.clone())?;
            }
            ResourceEvent::MethodUpdated { method } => {
                catalog.update_method(method.clone())?;
            }
            ResourceEvent::MethodDeactivated { method_id } => {
                catalog.deactivate_method(method_id)?;
            }
            ResourceEvent::RuleRegistered { rule } => {
                catalog.register_rule(rule.clone())?;
            }
            ResourceEvent::RuleRemoved {
                method_id,
                instrument_id,
            } => {
                catalog.remove_rule(method_id, instrument_id)?;
            }
            ResourceEvent::CalendarUpdated { config } => {
                calendar.set_config(config.clone());
            }
        }
        Ok(())
    }
}

// ==========================================
// 周期结果事件
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanningEventType {
    /// 周期完成
    CycleCompleted,
    /// 已承诺分配失效
    AssignmentsInvalidated,
    /// 存在无法排程的批次
    BatchesUnschedulable,
    /// 需求撤回
    RequestWithdrawn,
}

impl PlanningEventType {
    pub fn as_str(&self) -> &str {
        match self {
            PlanningEventType::CycleCompleted => "CycleCompleted",
            PlanningEventType::AssignmentsInvalidated => "AssignmentsInvalidated",
            PlanningEventType::BatchesUnschedulable => "BatchesUnschedulable",
            PlanningEventType::RequestWithdrawn => "RequestWithdrawn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningEvent {
    /// 周期 ID（撤回等周期外事件为空）
    pub cycle_id: Option<String>,
    pub event_type: PlanningEventType,
    /// 受影响的需求
    pub affected_requests: Vec<String>,
}

impl PlanningEvent {
    pub fn new(
        cycle_id: Option<String>,
        event_type: PlanningEventType,
        affected_requests: Vec<String>,
    ) -> Self {
        Self {
            cycle_id,
            event_type,
            affected_requests,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 周期事件发布者
///
/// # 返回
/// - `Ok(task_id)`: 下游任务 ID（如果支持）或空字符串
/// - `Err`: 发布失败（调度器记录 warn 后继续）
pub trait PlanningEventPublisher: Send + Sync {
    fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl PlanningEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            event_type = event.event_type.as_str(),
            affected = event.affected_requests.len(),
            "NoOpEventPublisher: 跳过事件发布"
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn PlanningEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn PlanningEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, event: PlanningEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => Ok(String::new()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
