// ==========================================
// 实验室产能排程系统 - 引擎层
// ==========================================
// 职责: 实现排程规则引擎，持有目录/名册/日历服务
// 红线: 无法排程必须输出原因码，冲突不外抛
// ==========================================

pub mod allocator;
pub mod batch_planner;
pub mod calendar;
pub mod capacity_analyzer;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod personnel_roster;
pub mod priority;
pub mod replan;
pub mod resource_catalog;

// 重导出核心引擎
pub use allocator::{AllocationContext, AllocationOutcome, Allocator};
pub use batch_planner::{BatchPlanner, Decomposition};
pub use calendar::CalendarService;
pub use capacity_analyzer::{AnalysisContext, CapacityAnalyzer};
pub use error::{EngineError, EngineResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, PlanningEvent, PlanningEventPublisher,
    PlanningEventType, ResourceEvent,
};
pub use orchestrator::{LabScheduler, PlanningCycleReport};
pub use personnel_roster::{PersonnelRoster, QualifiedOperator};
pub use priority::DemandPrioritySorter;
pub use replan::{ReplanEngine, ReplanOutcome, StaleAssignment};
pub use resource_catalog::{CompatibleInstrument, ResourceCatalog};
