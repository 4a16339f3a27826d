// ==========================================
// 实验室产能排程系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 版本化实体存储、变更日志、资源忙碌区间账本
// ==========================================

pub mod busy_ledger;
pub mod entity_store;
pub mod error;

// 重导出核心仓储
pub use busy_ledger::{BusyLedger, BusyRecord, LaneKind, WorkloadSource};
pub use entity_store::{EntityStore, MutationLog, StoredEntity, Versioned};
pub use error::{RepositoryError, RepositoryResult};
