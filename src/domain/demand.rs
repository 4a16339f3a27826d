// ==========================================
// 实验室产能排程系统 - 需求领域模型
// ==========================================
// 职责: 检测需求 / 批次
// 红线: 批次ID 由需求ID + 序号确定，不使用随机ID
// ==========================================

use crate::domain::types::{DemandStatus, Priority};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// DemandRequest - 检测需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRequest {
    pub request_id: String,
    pub method_id: String,
    pub sample_count: u32,
    pub priority: Priority,
    pub due_date: NaiveDate,

    // ===== 业务元数据 =====
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub project: String,

    // ===== 调度器维护 =====
    #[serde(default)]
    pub submission_seq: u64, // 提交顺序 (FIFO)
    #[serde(default = "default_status")]
    pub status: DemandStatus,
}

fn default_status() -> DemandStatus {
    DemandStatus::Pending
}

impl DemandRequest {
    pub fn new(
        request_id: impl Into<String>,
        method_id: impl Into<String>,
        sample_count: u32,
        priority: Priority,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method_id: method_id.into(),
            sample_count,
            priority,
            due_date,
            client: String::new(),
            project: String::new(),
            submission_seq: 0,
            status: DemandStatus::Pending,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>, project: impl Into<String>) -> Self {
        self.client = client.into();
        self.project = project.into();
        self
    }
}

// ==========================================
// Batch - 批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String, // {request_id}-B{sequence}
    pub request_id: String,
    pub method_id: String,
    pub method_version: u32,
    pub sequence: u32, // 1 起
    pub sample_count: u32,
    pub planned_instrument_id: String,
    pub duration_min: i64,
}

impl Batch {
    pub fn make_id(request_id: &str, sequence: u32) -> String {
        format!("{}-B{}", request_id, sequence)
    }
}
