// ==========================================
// 实验室产能排程系统 - 重排校验引擎
// ==========================================
// 职责: 周期开始时校验已承诺但未开工的分配
// 输入: 全部分配 + 当前目录/名册/日历
// 输出: 保留的分配 + 作废的分配（含原因）
// 红线: in_progress / completed 分配不可变，不参与校验
// ==========================================

use crate::domain::personnel::Operator;
use crate::domain::schedule::ScheduleAssignment;
use crate::domain::types::AssignmentStatus;
use crate::engine::allocator::AllocationContext;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{instrument, warn};

// ==========================================
// StaleAssignment - 失效分配
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct StaleAssignment {
    pub assignment: ScheduleAssignment,
    pub reason: String,
}

// ==========================================
// ReplanOutcome - 校验结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplanOutcome {
    pub kept: Vec<ScheduleAssignment>,
    pub invalidated: Vec<StaleAssignment>,
}

// ==========================================
// ReplanEngine - 重排校验引擎
// ==========================================
pub struct ReplanEngine {
    // 无状态引擎,不需要注入依赖
}

impl ReplanEngine {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 校验全部仍占用资源的分配
    ///
    /// - Scheduled: 校验通过则保留，否则标记 Invalidated 并交回队列
    /// - InProgress / Completed: 原样保留，并计入操作员当日批次数
    /// - 其他状态: 丢弃（不再占用资源）
    ///
    /// 每日批次上限按开始时刻顺序占用，超出的 Scheduled 分配作废
    #[instrument(skip(self, ctx, assignments), fields(total = assignments.len()))]
    pub fn validate(
        &self,
        ctx: &AllocationContext<'_>,
        assignments: Vec<ScheduleAssignment>,
    ) -> EngineResult<ReplanOutcome> {
        let mut day_starts: HashMap<(String, NaiveDate), u32> = HashMap::new();
        for a in assignments.iter().filter(|a| a.status.is_frozen()) {
            if let Ok(operator) = ctx.roster.operator(&a.operator_id) {
                let day = shift_day_of(&operator, a.start).unwrap_or(a.start.date());
                *day_starts.entry((a.operator_id.clone(), day)).or_default() += 1;
            }
        }

        let mut order: Vec<usize> = (0..assignments.len())
            .filter(|&i| assignments[i].status == AssignmentStatus::Scheduled)
            .collect();
        order.sort_by(|&i, &j| {
            let (a, b) = (&assignments[i], &assignments[j]);
            a.start.cmp(&b.start).then_with(|| a.batch_id.cmp(&b.batch_id))
        });

        let mut verdicts: Vec<Option<String>> = vec![None; assignments.len()];
        for i in order {
            let a = &assignments[i];
            verdicts[i] = match self.check_slot(ctx, a)? {
                SlotCheck::Stale(reason) => Some(reason),
                SlotCheck::Fits { shift_day, daily_cap } => {
                    let used = day_starts
                        .entry((a.operator_id.clone(), shift_day))
                        .or_default();
                    if *used >= daily_cap {
                        Some(format!(
                            "操作员 {} 在 {} 的批次数已达上限 {}",
                            a.operator_id, shift_day, daily_cap
                        ))
                    } else {
                        *used += 1;
                        None
                    }
                }
            };
        }

        let mut outcome = ReplanOutcome::default();
        for (assignment, verdict) in assignments.into_iter().zip(verdicts) {
            match assignment.status {
                AssignmentStatus::InProgress | AssignmentStatus::Completed => {
                    outcome.kept.push(assignment)
                }
                AssignmentStatus::Scheduled => match verdict {
                    None => outcome.kept.push(assignment),
                    Some(reason) => {
                        warn!(
                            batch_id = %assignment.batch_id,
                            instrument_id = %assignment.instrument_id,
                            operator_id = %assignment.operator_id,
                            start = %assignment.start,
                            reason = %reason,
                            "StaleAssignment: 分配失效，重新排队"
                        );
                        let mut stale = assignment;
                        stale.status = AssignmentStatus::Invalidated;
                        outcome.invalidated.push(StaleAssignment {
                            assignment: stale,
                            reason,
                        });
                    }
                },
                AssignmentStatus::Invalidated | AssignmentStatus::Cancelled => {}
            }
        }

        Ok(outcome)
    }

    /// 校验单个分配，返回失效原因（None 表示仍有效）
    ///
    /// 不含每日批次上限，上限需结合同日其他分配由 validate 判断
    pub fn check(
        &self,
        ctx: &AllocationContext<'_>,
        a: &ScheduleAssignment,
    ) -> EngineResult<Option<String>> {
        Ok(match self.check_slot(ctx, a)? {
            SlotCheck::Fits { .. } => None,
            SlotCheck::Stale(reason) => Some(reason),
        })
    }

    fn check_slot(
        &self,
        ctx: &AllocationContext<'_>,
        a: &ScheduleAssignment,
    ) -> EngineResult<SlotCheck> {
        let window = a.window();

        // ===== 方法 =====
        let method = match ctx.catalog.method(&a.method_id) {
            Ok(m) => m,
            Err(EngineError::NotFound { .. }) => return Ok(SlotCheck::stale("方法不存在")),
            Err(e) => return Err(e),
        };
        if !method.active {
            return Ok(SlotCheck::stale(format!("方法 {} 已停用", a.method_id)));
        }

        // ===== 仪器 =====
        let instrument = match ctx.catalog.instrument(&a.instrument_id) {
            Ok(i) => i,
            Err(EngineError::NotFound { .. }) => return Ok(SlotCheck::stale("仪器不存在")),
            Err(e) => return Err(e),
        };
        if !instrument.admits(&window) {
            return Ok(SlotCheck::stale(format!(
                "仪器 {} 在该时段不可用 (status={})",
                a.instrument_id, instrument.status
            )));
        }
        match ctx.catalog.rule(&a.method_id, &a.instrument_id)? {
            Some(rule) if rule.batch_size >= a.sample_count => {}
            Some(_) => return Ok(SlotCheck::stale("兼容规则批量已不足")),
            None => return Ok(SlotCheck::stale("兼容规则已删除")),
        }

        // ===== 操作员 =====
        let operator = match ctx.roster.operator(&a.operator_id) {
            Ok(o) => o,
            Err(EngineError::NotFound { .. }) => return Ok(SlotCheck::stale("操作员不存在")),
            Err(e) => return Err(e),
        };
        if !operator.active {
            return Ok(SlotCheck::stale(format!("操作员 {} 已停用", a.operator_id)));
        }
        if ctx
            .roster
            .qualified_level(
                &a.operator_id,
                &a.method_id,
                a.start.date(),
                ctx.config.min_proficiency,
            )?
            .is_none()
        {
            return Ok(SlotCheck::stale("操作员熟练度不再达标"));
        }

        // ===== 班次 / 请假 / 日历 =====
        let extension = if operator.overtime_approved {
            ctx.config.effective_overtime_extension_minutes()
        } else {
            0
        };
        // 跨零点班次的开工时刻可能属于前一天的班次
        let shift_day = [a.start.date() - Duration::days(1), a.start.date()]
            .into_iter()
            .find(|&day| {
                let shift = operator.shift.occurrence(day);
                !operator.on_leave(day)
                    && ctx.calendar.is_working_day_for(day, operator.overtime_approved)
                    && ctx
                        .calendar
                        .is_working_day_for(a.start.date(), operator.overtime_approved)
                    && shift.contains_instant(a.start)
                    && a.end <= shift.end + Duration::minutes(extension)
            });
        let Some(shift_day) = shift_day else {
            return Ok(SlotCheck::stale("操作员班次/请假/日历不再允许该时段"));
        };

        Ok(SlotCheck::Fits {
            shift_day,
            daily_cap: operator.max_concurrent_batches,
        })
    }
}

// ==========================================
// 内部: 单个分配的校验结论
// ==========================================
enum SlotCheck {
    Fits { shift_day: NaiveDate, daily_cap: u32 },
    Stale(String),
}

impl SlotCheck {
    fn stale(reason: impl Into<String>) -> Self {
        SlotCheck::Stale(reason.into())
    }
}

/// 开工时刻所属的班次日（不看日历与请假）
fn shift_day_of(operator: &Operator, start: NaiveDateTime) -> Option<NaiveDate> {
    [start.date() - Duration::days(1), start.date()]
        .into_iter()
        .find(|&day| operator.shift.occurrence(day).contains_instant(start))
}

impl Default for ReplanEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanningConfig;
    use crate::domain::calendar::{CalendarConfig, Holiday};
    use crate::domain::personnel::{ProficiencyRecord, ShiftWindow};
    use crate::domain::resource::{CompatibilityRule, Instrument, Method};
    use crate::domain::types::{InstrumentStatus, ProficiencyLevel};
    use crate::engine::calendar::CalendarService;
    use crate::engine::personnel_roster::PersonnelRoster;
    use crate::engine::resource_catalog::ResourceCatalog;
    use crate::repository::{BusyLedger, MutationLog};
    use chrono::NaiveTime;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, m, 0).unwrap()
    }

    struct Fixture {
        catalog: ResourceCatalog,
        roster: PersonnelRoster,
        calendar: CalendarService,
        config: PlanningConfig,
        ledger: BusyLedger,
    }

    impl Fixture {
        fn new(shift: ShiftWindow, daily_cap: u32) -> Self {
            let log = Arc::new(MutationLog::new());
            let catalog = ResourceCatalog::new(log.clone());
            catalog
                .register_method(Method {
                    method_id: "HPLC-001".to_string(),
                    name: "Assay".to_string(),
                    category: "HPLC".to_string(),
                    lead_time_days: 1,
                    default_batch_size: 24,
                    default_run_time_min: 10,
                    active: true,
                })
                .unwrap();
            catalog
                .register_instrument(Instrument {
                    instrument_id: "HPLC-01".to_string(),
                    name: "HPLC-01".to_string(),
                    category: "HPLC".to_string(),
                    status: InstrumentStatus::Active,
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

            let roster = PersonnelRoster::new(log);
            roster
                .register_operator(Operator {
                    operator_id: "OP-1".to_string(),
                    name: "OP-1".to_string(),
                    shift,
                    max_concurrent_batches: daily_cap,
                    overtime_approved: false,
                    active: true,
                    leave: vec![],
                })
                .unwrap();
            roster
                .upsert_proficiency(ProficiencyRecord {
                    operator_id: "OP-1".to_string(),
                    method_id: "HPLC-001".to_string(),
                    level: ProficiencyLevel::Expert,
                    certified_on: day(1),
                })
                .unwrap();

            Self {
                catalog,
                roster,
                calendar: CalendarService::default(),
                config: PlanningConfig::default(),
                ledger: BusyLedger::new(["HPLC-01"], ["OP-1"]),
            }
        }

        fn night() -> Self {
            Self::new(
                ShiftWindow::new(
                    NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                ),
                4,
            )
        }

        fn ctx(&self) -> AllocationContext<'_> {
            AllocationContext {
                catalog: &self.catalog,
                roster: &self.roster,
                calendar: &self.calendar,
                ledger: &self.ledger,
                config: &self.config,
                now: at(5, 0, 0),
            }
        }
    }

    fn assignment(
        batch_id: &str,
        start: NaiveDateTime,
        minutes: i64,
        status: AssignmentStatus,
    ) -> ScheduleAssignment {
        ScheduleAssignment {
            batch_id: batch_id.to_string(),
            request_id: "REQ-1".to_string(),
            method_id: "HPLC-001".to_string(),
            method_version: 1,
            sample_count: 10,
            instrument_id: "HPLC-01".to_string(),
            operator_id: "OP-1".to_string(),
            start,
            end: start + Duration::minutes(minutes),
            status,
            at_risk: false,
            overtime: false,
        }
    }

    fn holiday_on(d: u32) -> CalendarService {
        CalendarService::new(
            CalendarConfig {
                holidays: vec![Holiday {
                    date: day(d),
                    name: "Closure".to_string(),
                }],
                ..CalendarConfig::default()
            },
            366,
        )
    }

    #[test]
    fn test_start_after_midnight_belongs_to_previous_shift() {
        let f = Fixture::night();
        // 周二 01:00 开工，属于周一 22:00 开始的班次
        let a = assignment("REQ-1-B1", at(6, 1, 0), 145, AssignmentStatus::Scheduled);
        assert_eq!(ReplanEngine::new().check(&f.ctx(), &a).unwrap(), None);

        // 结束超出 06:00
        let long = assignment("REQ-1-B2", at(6, 4, 0), 145, AssignmentStatus::Scheduled);
        assert!(ReplanEngine::new().check(&f.ctx(), &long).unwrap().is_some());
    }

    #[test]
    fn test_start_after_midnight_rejected_when_that_day_is_closed() {
        let mut f = Fixture::night();
        f.calendar = holiday_on(6);
        let a = assignment("REQ-1-B1", at(6, 1, 0), 145, AssignmentStatus::Scheduled);
        assert!(ReplanEngine::new().check(&f.ctx(), &a).unwrap().is_some());

        // 周一关闭: 前一天班次不存在，周二班次 22:00 才开始
        f.calendar = holiday_on(5);
        assert!(ReplanEngine::new().check(&f.ctx(), &a).unwrap().is_some());
    }

    #[test]
    fn test_lowered_daily_cap_invalidates_latest_starts() {
        let f = Fixture::new(ShiftWindow::standard(), 2);
        let assignments = vec![
            assignment("REQ-1-B3", at(5, 13, 0), 60, AssignmentStatus::Scheduled),
            assignment("REQ-1-B1", at(5, 8, 0), 60, AssignmentStatus::InProgress),
            assignment("REQ-1-B2", at(5, 10, 0), 60, AssignmentStatus::Scheduled),
            assignment("REQ-1-B4", at(6, 8, 0), 60, AssignmentStatus::Scheduled),
        ];

        let outcome = ReplanEngine::new().validate(&f.ctx(), assignments).unwrap();
        let kept: Vec<&str> = outcome.kept.iter().map(|a| a.batch_id.as_str()).collect();
        // 输出保持输入顺序；次日不受影响
        assert_eq!(kept, vec!["REQ-1-B1", "REQ-1-B2", "REQ-1-B4"]);
        assert_eq!(outcome.invalidated.len(), 1);
        let stale = &outcome.invalidated[0];
        assert_eq!(stale.assignment.batch_id, "REQ-1-B3");
        assert_eq!(stale.assignment.status, AssignmentStatus::Invalidated);
    }

    #[test]
    fn test_frozen_assignments_are_never_checked() {
        let f = Fixture::new(ShiftWindow::standard(), 4);
        f.catalog
            .set_instrument_status("HPLC-01", InstrumentStatus::Repair)
            .unwrap();
        let assignments = vec![
            assignment("REQ-1-B1", at(5, 8, 0), 60, AssignmentStatus::Completed),
            assignment("REQ-1-B2", at(5, 10, 0), 60, AssignmentStatus::Scheduled),
            assignment("REQ-1-B3", at(5, 12, 0), 60, AssignmentStatus::Cancelled),
        ];

        let outcome = ReplanEngine::new().validate(&f.ctx(), assignments).unwrap();
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].batch_id, "REQ-1-B1");
        assert_eq!(outcome.invalidated.len(), 1);
        assert_eq!(outcome.invalidated[0].assignment.batch_id, "REQ-1-B2");
    }
}
