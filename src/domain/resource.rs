// ==========================================
// 实验室产能排程系统 - 资源目录领域模型
// ==========================================
// 职责: 方法 / 仪器 / 方法-仪器兼容规则
// 红线: 不含查询排序逻辑（由 ResourceCatalog 负责）
// ==========================================

use crate::domain::types::InstrumentStatus;
use crate::domain::window::TimeWindow;
use serde::{Deserialize, Serialize};

// ==========================================
// Method - 分析方法
// ==========================================
// 被已提交排程引用后不可原地修改，编辑产生新的生效版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub method_id: String,
    pub name: String,
    pub category: String,          // 方法大类 (HPLC / GC / LC-MS ...)
    pub lead_time_days: i64,       // 交付前置天数
    pub default_batch_size: u32,   // 默认批量
    pub default_run_time_min: i64, // 默认单样运行时间 (分钟)
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

// ==========================================
// Instrument - 仪器
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_id: String,
    pub name: String,
    pub category: String,
    pub status: InstrumentStatus,
    pub location: String,
    pub max_batch_size: u32,
    pub setup_min: i64,
    pub cleanup_min: i64,

    // ===== 校准有效期 =====
    // None 表示不受校准约束
    #[serde(default)]
    pub calibration: Option<TimeWindow>,

    // ===== 计划停机窗口 =====
    #[serde(default)]
    pub downtime: Vec<TimeWindow>,
}

impl Instrument {
    /// 窗口是否完全落在可运行时间内（状态 / 校准 / 停机）
    pub fn admits(&self, window: &TimeWindow) -> bool {
        if !self.status.is_available() {
            return false;
        }
        if let Some(calibration) = &self.calibration {
            if !calibration.covers(window) {
                return false;
            }
        }
        !self.downtime.iter().any(|d| d.overlaps(window))
    }

    /// 窗口内是否存在任何可运行时间
    pub fn has_uptime_within(&self, window: &TimeWindow) -> bool {
        if !self.status.is_available() {
            return false;
        }
        let usable = match &self.calibration {
            Some(calibration) => match calibration.intersect(window) {
                Some(w) => w,
                None => return false,
            },
            None => *window,
        };
        let mut blocks: Vec<TimeWindow> = self
            .downtime
            .iter()
            .filter_map(|d| d.intersect(&usable))
            .collect();
        blocks.sort();

        // 停机窗口可能相互重叠，按并集判断
        let mut t = usable.start;
        for b in &blocks {
            if b.start > t {
                return true;
            }
            t = t.max(b.end);
        }
        t < usable.end
    }
}

// ==========================================
// CompatibilityRule - 方法-仪器兼容规则
// ==========================================
// setup/cleanup 缺省时回落到仪器自身参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub method_id: String,
    pub instrument_id: String,
    pub batch_size: u32,
    pub run_time_per_sample_min: i64,
    #[serde(default)]
    pub setup_min: Option<i64>,
    #[serde(default)]
    pub cleanup_min: Option<i64>,
    #[serde(default)]
    pub preferred: bool,
}

impl CompatibilityRule {
    /// 规则主键
    pub fn key(method_id: &str, instrument_id: &str) -> String {
        format!("{}::{}", method_id, instrument_id)
    }
}

// ==========================================
// ResolvedRule - 规则 + 仪器 的生效参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRule {
    pub method_id: String,
    pub instrument_id: String,
    pub batch_size: u32, // min(规则批量, 仪器最大批量)
    pub run_time_per_sample_min: i64,
    pub setup_min: i64,
    pub cleanup_min: i64,
    pub preferred: bool,
}

impl ResolvedRule {
    pub fn resolve(rule: &CompatibilityRule, instrument: &Instrument) -> Self {
        Self {
            method_id: rule.method_id.clone(),
            instrument_id: rule.instrument_id.clone(),
            batch_size: rule.batch_size.min(instrument.max_batch_size),
            run_time_per_sample_min: rule.run_time_per_sample_min,
            setup_min: rule.setup_min.unwrap_or(instrument.setup_min),
            cleanup_min: rule.cleanup_min.unwrap_or(instrument.cleanup_min),
            preferred: rule.preferred,
        }
    }

    /// 批次时长 = setup + cleanup + samples × run_time（溢出时饱和到 i64::MAX）
    pub fn batch_duration_min(&self, sample_count: u32) -> i64 {
        i64::from(sample_count)
            .checked_mul(self.run_time_per_sample_min)
            .and_then(|run| run.checked_add(self.setup_min))
            .and_then(|d| d.checked_add(self.cleanup_min))
            .unwrap_or(i64::MAX)
    }

    /// 满批时长（排序键）
    pub fn full_batch_duration_min(&self) -> i64 {
        self.batch_duration_min(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument() -> Instrument {
        Instrument {
            instrument_id: "HPLC-01".to_string(),
            name: "Agilent 1260 HPLC".to_string(),
            category: "HPLC".to_string(),
            status: InstrumentStatus::Active,
            location: "Lab A".to_string(),
            max_batch_size: 24,
            setup_min: 30,
            cleanup_min: 15,
            calibration: None,
            downtime: vec![],
        }
    }

    #[test]
    fn test_resolved_rule_falls_back_to_instrument_timing() {
        let rule = CompatibilityRule {
            method_id: "HPLC-001".to_string(),
            instrument_id: "HPLC-01".to_string(),
            batch_size: 48,
            run_time_per_sample_min: 10,
            setup_min: None,
            cleanup_min: None,
            preferred: true,
        };
        let resolved = ResolvedRule::resolve(&rule, &instrument());
        assert_eq!(resolved.batch_size, 24); // 受仪器最大批量限制
        assert_eq!(resolved.batch_duration_min(24), 45 + 240);
        assert_eq!(resolved.batch_duration_min(6), 45 + 60);
    }

    #[test]
    fn test_overlapping_downtime_leaves_uptime() {
        let day = chrono::NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let h = |hour: u32| day.and_hms_opt(hour, 0, 0).unwrap();
        let mut inst = instrument();
        inst.downtime = vec![TimeWindow::new(h(8), h(12)), TimeWindow::new(h(10), h(14))];

        assert!(inst.has_uptime_within(&TimeWindow::new(h(8), h(16))));
        assert!(!inst.has_uptime_within(&TimeWindow::new(h(9), h(13))));
    }
}
