// ==========================================
// 实验室产能排程系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、值对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod calendar;
pub mod capacity;
pub mod demand;
pub mod mutation_log;
pub mod personnel;
pub mod resource;
pub mod schedule;
pub mod types;
pub mod window;

// 重导出核心类型
pub use calendar::{CalendarConfig, CalendarExclusion, Holiday, Shutdown};
pub use capacity::{
    AtRiskCause, AtRiskDemand, CapacityOverview, MethodCapacity, OverallMetrics, Recommendation,
    RecommendationKind, ResourceKind, ResourceUtilization,
};
pub use demand::{Batch, DemandRequest};
pub use mutation_log::{EntityKind, MutationKind, MutationRecord};
pub use personnel::{LeaveInterval, Operator, ProficiencyRecord, ShiftWindow};
pub use resource::{CompatibilityRule, Instrument, Method, ResolvedRule};
pub use schedule::{ScheduleAssignment, ScheduleSnapshot, UnschedulableBatch};
pub use types::{
    AssignmentStatus, BottleneckFactor, DemandStatus, ExclusionKind, InstrumentStatus, LeaveKind,
    Priority, ProficiencyLevel, UnschedulableReason, WeekendPolicy,
};
pub use window::TimeWindow;
