// ==========================================
// 实验室产能排程系统 - 人员领域模型
// ==========================================
// 职责: 操作员 / 班次 / 请假 / 熟练度记录
// ==========================================

use crate::domain::types::{LeaveKind, ProficiencyLevel};
use crate::domain::window::TimeWindow;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ShiftWindow - 班次（每日时钟区间）
// ==========================================
// end <= start 表示跨零点班次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// 标准班 08:00-17:00
    pub fn standard() -> Self {
        Self::hours(8, 17)
    }

    /// 早班 06:00-15:00
    pub fn early() -> Self {
        Self::hours(6, 15)
    }

    fn hours(start_h: u32, end_h: u32) -> Self {
        Self {
            start: NaiveTime::from_hms_opt(start_h, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(end_h, 0, 0).unwrap_or_default(),
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }

    /// 某日开始的班次窗口
    pub fn occurrence(&self, date: NaiveDate) -> TimeWindow {
        let start = date.and_time(self.start);
        let end_date = if self.crosses_midnight() {
            date + Duration::days(1)
        } else {
            date
        };
        TimeWindow::new(start, end_date.and_time(self.end))
    }

    pub fn length_min(&self) -> i64 {
        self.occurrence(NaiveDate::default()).duration_min()
    }
}

// ==========================================
// LeaveInterval - 请假区间（按日，含首尾）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveInterval {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub kind: LeaveKind,
}

impl LeaveInterval {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, kind: LeaveKind) -> Self {
        Self {
            start_date,
            end_date,
            kind,
        }
    }

    pub fn covers_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn as_window(&self) -> TimeWindow {
        TimeWindow::whole_days(self.start_date, self.end_date)
    }
}

// ==========================================
// Operator - 操作员
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub operator_id: String,
    pub name: String,
    pub shift: ShiftWindow,
    /// 单个工作日可承接的批次上限（同一时刻只操作一个批次）
    pub max_concurrent_batches: u32,
    pub overtime_approved: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub leave: Vec<LeaveInterval>,
}

fn default_true() -> bool {
    true
}

impl Operator {
    pub fn on_leave(&self, date: NaiveDate) -> bool {
        self.leave.iter().any(|l| l.covers_date(date))
    }
}

// ==========================================
// ProficiencyRecord - 熟练度记录
// ==========================================
// 无记录的操作员永远不具备该方法资格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProficiencyRecord {
    pub operator_id: String,
    pub method_id: String,
    pub level: ProficiencyLevel,
    pub certified_on: NaiveDate,
}

impl ProficiencyRecord {
    pub fn key(operator_id: &str, method_id: &str) -> String {
        format!("{}::{}", operator_id, method_id)
    }

    /// 认证日期起生效
    pub fn effective_on(&self, date: NaiveDate) -> bool {
        date >= self.certified_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_occurrence() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let w = ShiftWindow::standard().occurrence(d);
        assert_eq!(w.duration_min(), 9 * 60);

        let night = ShiftWindow::new(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        );
        assert!(night.crosses_midnight());
        assert_eq!(night.length_min(), 8 * 60);
        assert_eq!(night.occurrence(d).end.date(), d + Duration::days(1));
    }

    #[test]
    fn test_leave_covers_inclusive_range() {
        let leave = LeaveInterval::new(
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            LeaveKind::Vacation,
        );
        assert!(leave.covers_date(NaiveDate::from_ymd_opt(2026, 1, 7).unwrap()));
        assert!(!leave.covers_date(NaiveDate::from_ymd_opt(2026, 1, 8).unwrap()));
    }
}
