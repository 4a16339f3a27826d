// ==========================================
// 实验室产能排程系统 - 核心库
// ==========================================
// 系统定位: 批次级产能排程与瓶颈分析引擎
// 数据流: DemandRequest → BatchPlanner → Allocator → ScheduleAssignment → CapacityAnalyzer
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 实体存储 / 忙碌区间账本
pub mod repository;

// 引擎层 - 排程规则
pub mod engine;

// 导入层 - 外部需求数据
pub mod importer;

// 配置层 - 排程参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 应用层 - 场景运行
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentStatus, BottleneckFactor, DemandStatus, InstrumentStatus, Priority,
    ProficiencyLevel, UnschedulableReason, WeekendPolicy,
};

// 领域实体
pub use domain::{
    Batch, CalendarConfig, CapacityOverview, CompatibilityRule, DemandRequest, Instrument, Method,
    Operator, ProficiencyRecord, ScheduleAssignment, ScheduleSnapshot, TimeWindow,
    UnschedulableBatch,
};

// 引擎
pub use engine::{
    Allocator, BatchPlanner, CalendarService, CapacityAnalyzer, EngineError, EngineResult,
    LabScheduler, PersonnelRoster, PlanningCycleReport, ReplanEngine, ResourceCatalog,
    ResourceEvent,
};

// 配置
pub use config::{ConfigManager, PlanningConfig, PlanningConfigReader};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "实验室产能排程系统";
