// ==========================================
// 实验室产能排程系统 - 需求字段映射器
// ==========================================
// 职责: 原始行 → DemandRequest（含类型转换）
// 列: id, method, sample_count, priority, due_date, client, project
// ==========================================

use crate::domain::demand::DemandRequest;
use crate::domain::types::Priority;
use crate::importer::error::{ImportError, ImportResult};
use chrono::NaiveDate;
use std::collections::HashMap;

/// 必需列
pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "method", "sample_count", "priority", "due_date"];

pub struct DemandFieldMapper;

impl DemandFieldMapper {
    pub fn map_to_demand(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<DemandRequest> {
        let request_id = self
            .get_string(row, "id")
            .ok_or(ImportError::PrimaryKeyMissing(row_number))?;
        let method_id = self.require(row, "method", row_number)?;
        let sample_count = self.parse_u32(row, "sample_count", row_number)?;

        let priority_raw = self.require(row, "priority", row_number)?;
        let priority =
            Priority::parse(&priority_raw).ok_or_else(|| ImportError::TypeConversionError {
                row: row_number,
                field: "priority".to_string(),
                message: format!("未知优先级: {}", priority_raw),
            })?;
        let due_date = self.parse_date(row, "due_date", row_number)?;

        Ok(
            DemandRequest::new(request_id, method_id, sample_count, priority, due_date)
                .with_client(
                    self.get_string(row, "client").unwrap_or_default(),
                    self.get_string(row, "project").unwrap_or_default(),
                ),
        )
    }

    /// 提取字符串字段，支持列名别名；空值视为缺失
    fn get_string(&self, row: &HashMap<String, String>, key: &str) -> Option<String> {
        let aliases: &[&str] = match key {
            "id" => &["id", "request_id"],
            "method" => &["method", "method_id"],
            "sample_count" => &["sample_count", "samples"],
            "due_date" => &["due_date", "due"],
            _ => &[],
        };
        std::iter::once(key)
            .chain(aliases.iter().copied())
            .filter_map(|alias| row.get(alias))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn require(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<String> {
        self.get_string(row, key)
            .ok_or_else(|| ImportError::FieldMappingError {
                row: row_number,
                message: format!("字段 {} 为空", key),
            })
    }

    fn parse_u32(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<u32> {
        let value = self.require(row, key, row_number)?;
        value
            .parse::<u32>()
            .map_err(|_| ImportError::TypeConversionError {
                row: row_number,
                field: key.to_string(),
                message: format!("无法解析为非负整数: {}", value),
            })
    }

    /// 解析日期（YYYY-MM-DD，兼容 YYYYMMDD）
    fn parse_date(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
    ) -> ImportResult<NaiveDate> {
        let value = self.require(row, key, row_number)?;
        NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&value, "%Y%m%d"))
            .map_err(|_| ImportError::DateFormatError {
                row: row_number,
                field: key.to_string(),
                value,
            })
    }
}
