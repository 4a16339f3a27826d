// ==========================================
// 实验室产能排程系统 - 领域类型定义
// ==========================================
// 职责: 枚举类型（优先级/状态/原因码/策略）
// 序列化格式: 状态与策略使用 snake_case，原因码使用 SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 需求优先级 (Priority)
// ==========================================
// 顺序: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,      // 低
    Medium,   // 中
    High,     // 高
    Critical, // 紧急
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl Priority {
    /// 从字符串解析优先级（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

// ==========================================
// 仪器状态 (Instrument Status)
// ==========================================
// 只有 Active 状态的仪器可以承接批次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentStatus {
    Active,      // 可用
    Maintenance, // 维护中
    Repair,      // 维修中
    Inactive,    // 停用
}

impl fmt::Display for InstrumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentStatus::Active => write!(f, "active"),
            InstrumentStatus::Maintenance => write!(f, "maintenance"),
            InstrumentStatus::Repair => write!(f, "repair"),
            InstrumentStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl InstrumentStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, InstrumentStatus::Active)
    }
}

// ==========================================
// 熟练等级 (Proficiency Level)
// ==========================================
// 顺序: Beginner < Intermediate < Expert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyLevel {
    Beginner,     // 初级
    Intermediate, // 中级
    Expert,       // 专家
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProficiencyLevel::Beginner => write!(f, "beginner"),
            ProficiencyLevel::Intermediate => write!(f, "intermediate"),
            ProficiencyLevel::Expert => write!(f, "expert"),
        }
    }
}

impl ProficiencyLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(ProficiencyLevel::Beginner),
            "intermediate" => Some(ProficiencyLevel::Intermediate),
            "expert" => Some(ProficiencyLevel::Expert),
            _ => None,
        }
    }
}

// ==========================================
// 需求状态 (Demand Status)
// ==========================================
// 流转: Pending → Decomposed → Scheduled → Completed
//       任意未完成状态 → Cancelled / Unschedulable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandStatus {
    Pending,       // 待拆分
    Decomposed,    // 已拆分批次
    Scheduled,     // 全部批次已排程
    Completed,     // 已完成
    Cancelled,     // 已撤回
    Unschedulable, // 无法排程（保留在队列中，下个周期重试）
}

impl fmt::Display for DemandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandStatus::Pending => write!(f, "pending"),
            DemandStatus::Decomposed => write!(f, "decomposed"),
            DemandStatus::Scheduled => write!(f, "scheduled"),
            DemandStatus::Completed => write!(f, "completed"),
            DemandStatus::Cancelled => write!(f, "cancelled"),
            DemandStatus::Unschedulable => write!(f, "unschedulable"),
        }
    }
}

impl DemandStatus {
    /// 是否仍处于排程队列中
    pub fn is_open(&self) -> bool {
        !matches!(self, DemandStatus::Completed | DemandStatus::Cancelled)
    }
}

// ==========================================
// 排程分配状态 (Assignment Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Scheduled,   // 已排程（未开始，可重排）
    InProgress,  // 执行中（不可变）
    Completed,   // 已完成（不可变）
    Invalidated, // 资源失效后作废
    Cancelled,   // 需求撤回后取消
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentStatus::Scheduled => write!(f, "scheduled"),
            AssignmentStatus::InProgress => write!(f, "in_progress"),
            AssignmentStatus::Completed => write!(f, "completed"),
            AssignmentStatus::Invalidated => write!(f, "invalidated"),
            AssignmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl AssignmentStatus {
    /// 是否占用资源（计入忙碌区间）
    pub fn holds_resources(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Scheduled | AssignmentStatus::InProgress | AssignmentStatus::Completed
        )
    }

    /// 是否冻结（重排时不可调整）
    pub fn is_frozen(&self) -> bool {
        matches!(self, AssignmentStatus::InProgress | AssignmentStatus::Completed)
    }
}

// ==========================================
// 无法排程原因码 (Unschedulable Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnschedulableReason {
    NoQualifiedOperator,    // 无合格操作员
    NoCompatibleInstrument, // 无兼容仪器
    CalendarExhausted,      // 排程窗口内无可用时段
}

impl fmt::Display for UnschedulableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnschedulableReason::NoQualifiedOperator => write!(f, "NO_QUALIFIED_OPERATOR"),
            UnschedulableReason::NoCompatibleInstrument => write!(f, "NO_COMPATIBLE_INSTRUMENT"),
            UnschedulableReason::CalendarExhausted => write!(f, "CALENDAR_EXHAUSTED"),
        }
    }
}

// ==========================================
// 周末策略 (Weekend Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeekendPolicy {
    #[default]
    NoWork,       // 周末不排产
    OvertimeOnly, // 周末仅限已批准加班的操作员
}

impl fmt::Display for WeekendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekendPolicy::NoWork => write!(f, "no_work"),
            WeekendPolicy::OvertimeOnly => write!(f, "overtime_only"),
        }
    }
}

// ==========================================
// 日历排除类型 (Exclusion Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionKind {
    Holiday,  // 节假日
    Shutdown, // 实验室停线
    Weekend,  // 周末
}

// ==========================================
// 请假类型 (Leave Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    #[default]
    Vacation,
    Sick,
    Training,
    Personal,
}

// ==========================================
// 瓶颈因素 (Bottleneck Factor)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckFactor {
    Instrument, // 仪器工时先饱和
    Personnel,  // 人员工时先饱和
    Balanced,   // 两者接近
}

impl fmt::Display for BottleneckFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BottleneckFactor::Instrument => write!(f, "instrument"),
            BottleneckFactor::Personnel => write!(f, "personnel"),
            BottleneckFactor::Balanced => write!(f, "balanced"),
        }
    }
}
