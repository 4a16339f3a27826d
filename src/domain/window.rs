// ==========================================
// 实验室产能排程系统 - 时间窗口
// ==========================================
// 半开区间 [start, end)，分钟精度
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 时间窗口 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// 从起点与时长（分钟）构造；溢出时终点取可表示的最大时刻
    pub fn from_start(start: NaiveDateTime, duration_min: i64) -> Self {
        let end = Duration::try_minutes(duration_min)
            .and_then(|d| start.checked_add_signed(d))
            .unwrap_or(NaiveDateTime::MAX);
        Self { start, end }
    }

    /// 覆盖整天的窗口 [date 00:00, date+1 00:00)
    pub fn whole_days(first: NaiveDate, last_inclusive: NaiveDate) -> Self {
        let start = first.and_hms_opt(0, 0, 0).unwrap_or_default();
        let end = (last_inclusive + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        Self { start, end }
    }

    pub fn duration_min(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_min() as f64 / 60.0
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains_instant(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }

    /// 是否完整包含另一窗口
    pub fn covers(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// 交集（无交集返回 None）
    pub fn intersect(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(TimeWindow { start, end })
        } else {
            None
        }
    }

    /// 与另一窗口交集的分钟数
    pub fn overlap_min(&self, other: &TimeWindow) -> i64 {
        self.intersect(other).map(|w| w.duration_min()).unwrap_or(0)
    }
}
