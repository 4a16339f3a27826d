// ==========================================
// 实验室产能排程系统 - 日历服务
// ==========================================
// 职责: 节假日 / 停线 / 周末 排除规则
// 规则:
// - 节假日与停线: 全员停工
// - 周末 no_work: 全员停工
// - 周末 overtime_only: 仅已批准加班的操作员可工作
// ==========================================

use crate::domain::calendar::CalendarConfig;
use crate::domain::types::{ExclusionKind, WeekendPolicy};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

// ==========================================
// CalendarService - 日历服务
// ==========================================
#[derive(Debug, Clone)]
pub struct CalendarService {
    config: CalendarConfig,
    search_limit_days: i64,
}

impl Default for CalendarService {
    fn default() -> Self {
        Self::new(CalendarConfig::default(), 366)
    }
}

impl CalendarService {
    pub fn new(config: CalendarConfig, search_limit_days: i64) -> Self {
        Self {
            config,
            search_limit_days: search_limit_days.max(1),
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CalendarConfig) {
        self.config = config;
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 当日的排除原因（None 表示正常工作日）
    pub fn exclusion_on(&self, date: NaiveDate) -> Option<ExclusionKind> {
        if self.config.holidays.iter().any(|h| h.date == date) {
            return Some(ExclusionKind::Holiday);
        }
        if self
            .config
            .shutdowns
            .iter()
            .any(|s| date >= s.start_date && date <= s.end_date)
        {
            return Some(ExclusionKind::Shutdown);
        }
        if is_weekend(date) {
            return Some(ExclusionKind::Weekend);
        }
        None
    }

    /// 对所有人都是工作日
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.exclusion_on(date).is_none()
    }

    /// 对指定加班资格的操作员是否可工作
    pub fn is_working_day_for(&self, date: NaiveDate, overtime_approved: bool) -> bool {
        match self.exclusion_on(date) {
            None => true,
            Some(ExclusionKind::Weekend) => {
                overtime_approved && self.config.weekend_policy == WeekendPolicy::OvertimeOnly
            }
            Some(_) => false,
        }
    }

    /// ≥ t 的最早工作时刻（超出查找上限返回 None）
    pub fn next_working_instant(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        self.next_instant_where(t, |d| self.is_working_day(d))
    }

    pub fn next_working_instant_for(
        &self,
        t: NaiveDateTime,
        overtime_approved: bool,
    ) -> Option<NaiveDateTime> {
        self.next_instant_where(t, |d| self.is_working_day_for(d, overtime_approved))
    }

    /// [from, to) 内的全员工作日数
    pub fn working_days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let mut count = 0;
        let mut day = from;
        while day < to {
            if self.is_working_day(day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        count
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn next_instant_where<F>(&self, t: NaiveDateTime, open: F) -> Option<NaiveDateTime>
    where
        F: Fn(NaiveDate) -> bool,
    {
        if open(t.date()) {
            return Some(t);
        }
        (1..=self.search_limit_days)
            .map(|offset| t.date() + Duration::days(offset))
            .find(|d| open(*d))
            .map(|d| d.and_time(NaiveTime::MIN))
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
