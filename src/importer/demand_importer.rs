// ==========================================
// 实验室产能排程系统 - 需求导入器
// ==========================================
// 流程:
// 1. 文件解析（CsvParser）
// 2. 必需列检查（缺列为文件级错误）
// 3. 字段映射与类型转换（失败行记入拒绝列表）
// 4. 逐行提交调度器受理（校验失败行记入拒绝列表）
// 红线: 单行失败不中止整个导入
// ==========================================

use crate::domain::demand::DemandRequest;
use crate::engine::LabScheduler;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{DemandFieldMapper, REQUIRED_COLUMNS};
use crate::importer::file_parser::{CsvParser, FileParser, RawRow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument, warn};

// ==========================================
// 导入结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedDemand {
    pub row: usize,
    pub request: DemandRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    pub row: usize,
    pub request_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandImportReport {
    pub total_rows: usize,
    pub accepted: Vec<ImportedDemand>,
    pub rejected: Vec<RowRejection>,
}

impl DemandImportReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

// ==========================================
// DemandImporter
// ==========================================
pub struct DemandImporter {
    parser: CsvParser,
    mapper: DemandFieldMapper,
}

impl DemandImporter {
    pub fn new() -> Self {
        Self {
            parser: CsvParser,
            mapper: DemandFieldMapper,
        }
    }

    /// 解析 CSV 文件为需求（不提交）
    #[instrument(skip(self, file_path), fields(path = %file_path.as_ref().display()))]
    pub fn parse_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<DemandImportReport> {
        let rows = self.parser.parse_to_raw_records(file_path.as_ref())?;
        self.map_rows(rows)
    }

    pub fn parse_reader<R: Read>(&self, reader: R) -> ImportResult<DemandImportReport> {
        let rows = self.parser.parse_reader(reader)?;
        self.map_rows(rows)
    }

    /// 解析并逐行提交调度器
    pub fn import_file<P: AsRef<Path>>(
        &self,
        scheduler: &LabScheduler,
        file_path: P,
    ) -> ImportResult<DemandImportReport> {
        let parsed = self.parse_file(file_path)?;
        Ok(self.submit_all(scheduler, parsed))
    }

    pub fn import_reader<R: Read>(
        &self,
        scheduler: &LabScheduler,
        reader: R,
    ) -> ImportResult<DemandImportReport> {
        let parsed = self.parse_reader(reader)?;
        Ok(self.submit_all(scheduler, parsed))
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn map_rows(&self, rows: Vec<RawRow>) -> ImportResult<DemandImportReport> {
        if !rows.is_empty() {
            let columns: HashSet<&str> = rows
                .iter()
                .flat_map(|(_, r)| r.keys().map(String::as_str))
                .collect();
            for column in REQUIRED_COLUMNS {
                let present = match column {
                    "id" => columns.contains("id") || columns.contains("request_id"),
                    "method" => columns.contains("method") || columns.contains("method_id"),
                    "sample_count" => {
                        columns.contains("sample_count") || columns.contains("samples")
                    }
                    "due_date" => columns.contains("due_date") || columns.contains("due"),
                    other => columns.contains(other),
                };
                if !present {
                    return Err(ImportError::MissingColumn(column.to_string()));
                }
            }
        }

        let mut report = DemandImportReport {
            total_rows: rows.len(),
            ..Default::default()
        };
        for (row_number, row) in rows {
            match self.mapper.map_to_demand(&row, row_number) {
                Ok(request) => report.accepted.push(ImportedDemand {
                    row: row_number,
                    request,
                }),
                Err(e) => {
                    warn!(row = row_number, error = %e, "需求行映射失败");
                    report.rejected.push(RowRejection {
                        row: row_number,
                        request_id: row
                            .get("id")
                            .or_else(|| row.get("request_id"))
                            .filter(|v| !v.is_empty())
                            .cloned(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// 受理失败的行从 accepted 移入 rejected
    fn submit_all(&self, scheduler: &LabScheduler, parsed: DemandImportReport) -> DemandImportReport {
        let mut report = DemandImportReport {
            total_rows: parsed.total_rows,
            accepted: Vec::new(),
            rejected: parsed.rejected,
        };

        for imported in parsed.accepted {
            match scheduler.submit(imported.request.clone()) {
                Ok(_) => report.accepted.push(imported),
                Err(e) => {
                    warn!(row = imported.row, request_id = %imported.request.request_id, error = %e, "需求受理失败");
                    report.rejected.push(RowRejection {
                        row: imported.row,
                        request_id: Some(imported.request.request_id),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.rejected.sort_by_key(|r| r.row);
        info!(
            total = report.total_rows,
            accepted = report.accepted_count(),
            rejected = report.rejected_count(),
            "需求导入完成"
        );
        report
    }
}

impl Default for DemandImporter {
    fn default() -> Self {
        Self::new()
    }
}
