// ==========================================
// 实验室产能排程系统 - 日历领域模型
// ==========================================
// 职责: 节假日 / 停线区间 / 周末策略
// ==========================================

use crate::domain::types::{ExclusionKind, WeekendPolicy};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 节假日（全员停工）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    #[serde(default)]
    pub name: String,
}

/// 实验室停线区间（含首尾，全员停工）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shutdown {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
}

// ==========================================
// CalendarExclusion - 统一排除项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarExclusion {
    pub first: NaiveDate,
    pub last: NaiveDate, // 含
    pub kind: ExclusionKind,
}

impl CalendarExclusion {
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }
}

// ==========================================
// CalendarConfig - 日历配置
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub holidays: Vec<Holiday>,
    #[serde(default)]
    pub shutdowns: Vec<Shutdown>,
    #[serde(default)]
    pub weekend_policy: WeekendPolicy,
}

impl CalendarConfig {
    /// 节假日与停线展开为排除项（周末由策略动态判断，不展开）
    pub fn exclusions(&self) -> Vec<CalendarExclusion> {
        let mut out: Vec<CalendarExclusion> = self
            .holidays
            .iter()
            .map(|h| CalendarExclusion {
                first: h.date,
                last: h.date,
                kind: ExclusionKind::Holiday,
            })
            .collect();
        out.extend(self.shutdowns.iter().map(|s| CalendarExclusion {
            first: s.start_date,
            last: s.end_date,
            kind: ExclusionKind::Shutdown,
        }));
        out.sort_by(|a, b| a.first.cmp(&b.first).then(a.last.cmp(&b.last)));
        out
    }
}
