// ==========================================
// 实验室产能排程系统 - 排程结果领域模型
// ==========================================
// 职责: 排程分配 / 无法排程记录
// 红线: 每个未取消批次至多一条占用资源的分配
// ==========================================

use crate::domain::demand::{Batch, DemandRequest};
use crate::domain::types::{AssignmentStatus, UnschedulableReason};
use crate::domain::window::TimeWindow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ScheduleAssignment - 排程分配
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAssignment {
    pub batch_id: String,
    pub request_id: String,
    pub method_id: String,
    pub method_version: u32,
    pub sample_count: u32,

    // ===== 资源 =====
    pub instrument_id: String,
    pub operator_id: String,

    // ===== 时间窗 [start, end) =====
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,

    // ===== 状态 =====
    pub status: AssignmentStatus,
    pub at_risk: bool,  // 预计晚于交期
    pub overtime: bool, // 落在班次外或非工作日
}

impl ScheduleAssignment {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }

    pub fn duration_min(&self) -> i64 {
        self.window().duration_min()
    }
}

// ==========================================
// UnschedulableBatch - 无法排程记录
// ==========================================
// batch_id 为空表示需求在拆分阶段即失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnschedulableBatch {
    pub batch_id: Option<String>,
    pub request_id: String,
    pub reason_code: UnschedulableReason,
    pub detail: String,
}

// ==========================================
// ScheduleSnapshot - 已提交排程快照
// ==========================================
// 每个周期结束时整体替换，供产能分析并发读取
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub cycle_id: Option<String>,
    pub as_of: Option<NaiveDateTime>,
    pub assignments: Vec<ScheduleAssignment>, // 仍占用资源的分配
    pub unschedulable: Vec<UnschedulableBatch>,
    pub pending_batches: Vec<Batch>, // 已拆分但未分配
    pub requests: Vec<DemandRequest>, // 未完成需求
}

impl ScheduleSnapshot {
    pub fn assignments_for_request<'a>(
        &'a self,
        request_id: &'a str,
    ) -> impl Iterator<Item = &'a ScheduleAssignment> + 'a {
        self.assignments
            .iter()
            .filter(move |a| a.request_id == request_id)
    }

    pub fn assignment_for_batch(&self, batch_id: &str) -> Option<&ScheduleAssignment> {
        self.assignments.iter().find(|a| a.batch_id == batch_id)
    }
}
