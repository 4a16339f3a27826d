// ==========================================
// 实验室产能排程系统 - 变更日志领域模型
// ==========================================
// 红线: 只追加，不修改，不删除
// 用途: 审计追踪，版本回溯
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

// ==========================================
// EntityKind - 实体类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Method,
    Instrument,
    CompatibilityRule,
    Operator,
    Proficiency,
    Calendar,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Method => write!(f, "method"),
            EntityKind::Instrument => write!(f, "instrument"),
            EntityKind::CompatibilityRule => write!(f, "compatibility_rule"),
            EntityKind::Operator => write!(f, "operator"),
            EntityKind::Proficiency => write!(f, "proficiency"),
            EntityKind::Calendar => write!(f, "calendar"),
        }
    }
}

// ==========================================
// MutationKind - 变更类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Register,   // 首次登记
    Update,     // 新版本
    Deactivate, // 停用
    Remove,     // 删除（保留历史版本）
}

// ==========================================
// MutationRecord - 变更日志条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub seq: u64, // 日志内单调递增
    pub mutation_id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub version: u32,
    pub kind: MutationKind,
    pub payload: JsonValue,
    pub recorded_at: DateTime<Utc>, // 仅审计用途，不参与排程
}
