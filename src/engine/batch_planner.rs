// ==========================================
// 实验室产能排程系统 - 批次拆分引擎
// ==========================================
// 职责: 将检测需求按仪器批量拆分为批次
// 输入: 需求 + 资源目录 + 排程窗口
// 输出: 批次列表 或 NO_COMPATIBLE_INSTRUMENT
// 红线: 同样的输入永远得到同样的批次（ID / 批量 / 时长）
// ==========================================

use crate::domain::demand::{Batch, DemandRequest};
use crate::domain::schedule::UnschedulableBatch;
use crate::domain::types::UnschedulableReason;
use crate::domain::window::TimeWindow;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::resource_catalog::{CompatibleInstrument, ResourceCatalog};
use tracing::{debug, instrument, warn};

// ==========================================
// Decomposition - 拆分结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum Decomposition {
    Planned(Vec<Batch>),
    Unschedulable(UnschedulableBatch),
}

// ==========================================
// BatchPlanner - 批次拆分引擎
// ==========================================
pub struct BatchPlanner {
    // 无状态引擎,不需要注入依赖
}

impl BatchPlanner {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 拆分需求
    ///
    /// 规则:
    /// 1) 选择排程窗口内可用的最优兼容仪器（偏好 → 满批时长 → ID）
    /// 2) 批次数 = ceil(样品数 / 批量)，除最后一批外均为满批
    /// 3) 时长 = setup + cleanup + 样品数 × 单样时间
    #[instrument(skip(self, request, catalog), fields(request_id = %request.request_id))]
    pub fn decompose(
        &self,
        request: &DemandRequest,
        catalog: &ResourceCatalog,
        horizon: &TimeWindow,
    ) -> EngineResult<Decomposition> {
        if request.sample_count == 0 {
            return Err(EngineError::validation("sample_count", "样品数必须大于 0"));
        }

        let method = catalog.method(&request.method_id)?;
        if !method.active {
            warn!(method_id = %method.method_id, "方法已停用，需求无法拆分");
            return Ok(Decomposition::Unschedulable(self.no_instrument(
                request,
                format!("方法 {} 已停用", method.method_id),
            )));
        }

        let candidates = catalog.query_compatible_instruments(&request.method_id)?;
        let Some(chosen) = self.select_instrument(&candidates, horizon) else {
            warn!(
                method_id = %request.method_id,
                compatible = candidates.len(),
                "排程窗口内无可用兼容仪器"
            );
            return Ok(Decomposition::Unschedulable(self.no_instrument(
                request,
                format!("方法 {} 无可用兼容仪器", request.method_id),
            )));
        };

        let method_version = catalog.method_version(&request.method_id)?;
        let batches = self.split(request, chosen, method_version);
        debug!(
            instrument_id = %chosen.instrument.instrument_id,
            batch_size = chosen.rule.batch_size,
            batches = batches.len(),
            "需求拆分完成"
        );
        Ok(Decomposition::Planned(batches))
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 首个在窗口内有可运行时间的兼容仪器
    fn select_instrument<'a>(
        &self,
        candidates: &'a [CompatibleInstrument],
        horizon: &TimeWindow,
    ) -> Option<&'a CompatibleInstrument> {
        candidates
            .iter()
            .find(|c| c.rule.batch_size > 0 && c.instrument.has_uptime_within(horizon))
    }

    fn split(
        &self,
        request: &DemandRequest,
        chosen: &CompatibleInstrument,
        method_version: u32,
    ) -> Vec<Batch> {
        let size = chosen.rule.batch_size;
        let count = request.sample_count.div_ceil(size);

        (1..=count)
            .map(|sequence| {
                let sample_count = if sequence < count {
                    size
                } else {
                    request.sample_count - size * (count - 1)
                };
                Batch {
                    batch_id: Batch::make_id(&request.request_id, sequence),
                    request_id: request.request_id.clone(),
                    method_id: request.method_id.clone(),
                    method_version,
                    sequence,
                    sample_count,
                    planned_instrument_id: chosen.instrument.instrument_id.clone(),
                    duration_min: chosen.rule.batch_duration_min(sample_count),
                }
            })
            .collect()
    }

    fn no_instrument(&self, request: &DemandRequest, detail: String) -> UnschedulableBatch {
        UnschedulableBatch {
            batch_id: None,
            request_id: request.request_id.clone(),
            reason_code: UnschedulableReason::NoCompatibleInstrument,
            detail,
        }
    }
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{CompatibilityRule, Instrument, Method};
    use crate::domain::types::{InstrumentStatus, Priority};
    use crate::repository::MutationLog;
    use chrono::{Duration, NaiveDate};
    use std::sync::Arc;

    fn horizon() -> TimeWindow {
        let start = NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeWindow::new(start, start + Duration::days(90))
    }

    fn catalog(status: InstrumentStatus) -> ResourceCatalog {
        let catalog = ResourceCatalog::new(Arc::new(MutationLog::new()));
        catalog
            .register_method(Method {
                method_id: "HPLC-001".to_string(),
                name: "Assay".to_string(),
                category: "HPLC".to_string(),
                lead_time_days: 3,
                default_batch_size: 24,
                default_run_time_min: 10,
                active: true,
            })
            .unwrap();
        catalog
            .register_instrument(Instrument {
                instrument_id: "HPLC-01".to_string(),
                name: "HPLC".to_string(),
                category: "HPLC".to_string(),
                status,
                location: "Lab A".to_string(),
                max_batch_size: 96,
                setup_min: 30,
                cleanup_min: 15,
                calibration: None,
                downtime: vec![],
            })
            .unwrap();
        catalog
            .register_rule(CompatibilityRule {
                method_id: "HPLC-001".to_string(),
                instrument_id: "HPLC-01".to_string(),
                batch_size: 24,
                run_time_per_sample_min: 10,
                setup_min: None,
                cleanup_min: None,
                preferred: true,
            })
            .unwrap();
        catalog
    }

    fn request(samples: u32) -> DemandRequest {
        DemandRequest::new(
            "REQ-1",
            "HPLC-001",
            samples,
            Priority::High,
            NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
        )
    }

    #[test]
    fn test_split_24_and_6() {
        let planner = BatchPlanner::new();
        let out = planner
            .decompose(&request(30), &catalog(InstrumentStatus::Active), &horizon())
            .unwrap();
        let Decomposition::Planned(batches) = out else {
            panic!("expected planned batches");
        };
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].batch_id, "REQ-1-B1");
        assert_eq!(batches[0].sample_count, 24);
        assert_eq!(batches[0].duration_min, 45 + 240);
        assert_eq!(batches[1].sample_count, 6);
        assert_eq!(batches[1].duration_min, 45 + 60);
        assert_eq!(batches[1].method_version, 1);
    }

    #[test]
    fn test_exact_multiple_has_no_remainder_batch() {
        let planner = BatchPlanner::new();
        let Decomposition::Planned(batches) = planner
            .decompose(&request(48), &catalog(InstrumentStatus::Active), &horizon())
            .unwrap()
        else {
            panic!("expected planned batches");
        };
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.sample_count == 24));
    }

    #[test]
    fn test_instrument_in_repair_is_unschedulable() {
        let planner = BatchPlanner::new();
        let out = planner
            .decompose(&request(30), &catalog(InstrumentStatus::Repair), &horizon())
            .unwrap();
        let Decomposition::Unschedulable(u) = out else {
            panic!("expected unschedulable");
        };
        assert_eq!(u.reason_code, UnschedulableReason::NoCompatibleInstrument);
        assert!(u.batch_id.is_none());
    }
}
