use super::*;
use crate::domain::calendar::{CalendarConfig, Holiday};
use crate::domain::personnel::{LeaveInterval, ProficiencyRecord, ShiftWindow};
use crate::domain::resource::{CompatibilityRule, Method};
use crate::domain::types::{InstrumentStatus, LeaveKind, Priority, WeekendPolicy};
use crate::engine::batch_planner::{BatchPlanner, Decomposition};
use crate::repository::MutationLog;
use std::sync::Arc;

// ==========================================
// 测试夹具
// ==========================================

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
}

impl Fixture {
    fn new() -> Self {
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
        let fixture = Self {
            catalog,
            roster: PersonnelRoster::new(log),
            calendar: CalendarService::default(),
            config: PlanningConfig::default(),
        };
        fixture.instrument("HPLC-01", true);
        fixture
    }

    fn instrument(&self, id: &str, preferred: bool) {
        self.catalog
            .register_instrument(Instrument {
                instrument_id: id.to_string(),
                name: id.to_string(),
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
        self.catalog
            .register_rule(CompatibilityRule {
                method_id: "HPLC-001".to_string(),
                instrument_id: id.to_string(),
                batch_size: 24,
                run_time_per_sample_min: 10,
                setup_min: None,
                cleanup_min: None,
                preferred,
            })
            .unwrap();
    }

    fn operator(&self, id: &str, level: ProficiencyLevel, overtime: bool, cap: u32) {
        self.roster
            .register_operator(Operator {
                operator_id: id.to_string(),
                name: id.to_string(),
                shift: ShiftWindow::standard(),
                max_concurrent_batches: cap,
                overtime_approved: overtime,
                active: true,
                leave: vec![],
            })
            .unwrap();
        self.roster
            .upsert_proficiency(ProficiencyRecord {
                operator_id: id.to_string(),
                method_id: "HPLC-001".to_string(),
                level,
                certified_on: day(1),
            })
            .unwrap();
    }

    fn ledger(&self) -> BusyLedger {
        let instruments = self.catalog.instruments().unwrap();
        let operators = self.roster.operators().unwrap();
        BusyLedger::new(
            instruments.iter().map(|i| i.instrument_id.as_str()),
            operators.iter().map(|o| o.operator_id.as_str()),
        )
    }

    fn run(&self, samples: u32, due: NaiveDate, now: NaiveDateTime) -> AllocationOutcome {
        let ledger = self.ledger();
        self.run_with(&ledger, samples, due, now)
    }

    fn run_with(
        &self,
        ledger: &BusyLedger,
        samples: u32,
        due: NaiveDate,
        now: NaiveDateTime,
    ) -> AllocationOutcome {
        let ctx = AllocationContext {
            catalog: &self.catalog,
            roster: &self.roster,
            calendar: &self.calendar,
            ledger,
            config: &self.config,
            now,
        };
        let request = DemandRequest::new("REQ-1", "HPLC-001", samples, Priority::High, due);
        let Decomposition::Planned(batches) = BatchPlanner::new()
            .decompose(&request, &self.catalog, &ctx.horizon())
            .unwrap()
        else {
            panic!("expected planned batches");
        };
        Allocator::new().allocate(&ctx, &[(request, batches)]).unwrap()
    }
}

// ==========================================
// 纯函数
// ==========================================

#[test]
fn test_first_gap_skips_blocks() {
    let lo = at(5, 8, 0);
    let blocks = vec![
        TimeWindow::new(at(5, 8, 0), at(5, 9, 0)),
        TimeWindow::new(at(5, 9, 30), at(5, 11, 0)),
    ];
    assert_eq!(first_gap(lo, &blocks, 30), Some((at(5, 9, 0), at(5, 9, 30))));
    assert_eq!(first_gap(lo, &blocks, 31).map(|g| g.0), Some(at(5, 11, 0)));
    assert_eq!(first_gap(lo, &[], 60), Some((lo, at(5, 9, 0))));
    assert_eq!(first_gap(lo, &[], i64::MAX), None);
}

#[test]
fn test_compare_slots_order() {
    let slot = |start: NaiveDateTime, instrument: &str, preferred: bool, overtime: bool| SlotCandidate {
        window: TimeWindow::from_start(start, 60),
        instrument_id: instrument.to_string(),
        operator_id: "OP-1".to_string(),
        preferred,
        level: ProficiencyLevel::Expert,
        workload_min: 0,
        overtime,
    };
    let early = slot(at(5, 8, 0), "B", false, false);
    let late = slot(at(5, 9, 0), "A", true, false);
    assert_eq!(compare_slots(&early, &late, OvertimePrecedence::Neutral), Ordering::Less);

    let preferred = slot(at(5, 8, 0), "B", true, false);
    assert_eq!(compare_slots(&preferred, &early, OvertimePrecedence::Neutral), Ordering::Less);

    let overtime = slot(at(5, 8, 0), "A", false, true);
    assert_eq!(compare_slots(&overtime, &early, OvertimePrecedence::Neutral), Ordering::Less);
    assert_eq!(
        compare_slots(&overtime, &early, OvertimePrecedence::PreferRegular),
        Ordering::Greater
    );
}

#[test]
fn test_end_of_day() {
    assert_eq!(end_of_day(day(9)), at(10, 0, 0));
}

// ==========================================
// 分配场景
// ==========================================

#[test]
fn test_batches_run_back_to_back() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);

    let out = f.run(30, day(9), at(5, 8, 0));
    assert!(out.unschedulable.is_empty());
    assert_eq!(out.assignments.len(), 2);

    let first = &out.assignments[0];
    assert_eq!(first.batch_id, "REQ-1-B1");
    assert_eq!((first.start, first.end), (at(5, 8, 0), at(5, 12, 45)));
    let second = &out.assignments[1];
    assert_eq!((second.start, second.end), (at(5, 12, 45), at(5, 14, 30)));
    assert!(!first.at_risk && !first.overtime);
}

#[test]
fn test_no_proficiency_record_is_no_qualified_operator() {
    let f = Fixture::new();
    f.roster
        .register_operator(Operator {
            operator_id: "OP-9".to_string(),
            name: "Uncertified".to_string(),
            shift: ShiftWindow::standard(),
            max_concurrent_batches: 4,
            overtime_approved: true,
            active: true,
            leave: vec![],
        })
        .unwrap();

    let out = f.run(10, day(9), at(5, 8, 0));
    assert!(out.assignments.is_empty());
    assert_eq!(out.unschedulable.len(), 1);
    assert_eq!(
        out.unschedulable[0].reason_code,
        UnschedulableReason::NoQualifiedOperator
    );
}

#[test]
fn test_below_minimum_proficiency_is_ignored() {
    let mut f = Fixture::new();
    f.config.min_proficiency = ProficiencyLevel::Intermediate;
    f.operator("OP-1", ProficiencyLevel::Beginner, false, 4);

    let out = f.run(10, day(9), at(5, 8, 0));
    assert_eq!(
        out.unschedulable[0].reason_code,
        UnschedulableReason::NoQualifiedOperator
    );
}

#[test]
fn test_two_instruments_share_one_operator() {
    let f = Fixture::new();
    f.instrument("HPLC-02", false);
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);

    let out = f.run(48, day(9), at(5, 8, 0));
    assert_eq!(out.assignments.len(), 2);
    // 单个操作员不能同时跑两台仪器
    assert!(!out.assignments[0].window().overlaps(&out.assignments[1].window()));
    assert_eq!(out.assignments[0].instrument_id, "HPLC-01");
}

#[test]
fn test_two_operators_run_in_parallel() {
    let f = Fixture::new();
    f.instrument("HPLC-02", false);
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);
    f.operator("OP-2", ProficiencyLevel::Intermediate, false, 4);

    let out = f.run(48, day(9), at(5, 8, 0));
    let a = &out.assignments[0];
    let b = &out.assignments[1];
    assert_eq!(a.start, b.start);
    assert_ne!(a.instrument_id, b.instrument_id);
    assert_ne!(a.operator_id, b.operator_id);
    // 偏好仪器 + 高熟练度优先
    assert_eq!((a.instrument_id.as_str(), a.operator_id.as_str()), ("HPLC-01", "OP-1"));
}

#[test]
fn test_leave_moves_batch_to_next_day() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);
    f.roster
        .add_leave("OP-1", LeaveInterval::new(day(5), day(5), LeaveKind::Sick))
        .unwrap();

    let out = f.run(10, day(9), at(5, 8, 0));
    assert_eq!(out.assignments[0].start, at(6, 8, 0));
}

#[test]
fn test_daily_cap_limits_batches_per_shift() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 1);

    let out = f.run(30, day(9), at(5, 8, 0));
    assert_eq!(out.assignments[0].start.date(), day(5));
    assert_eq!(out.assignments[1].start, at(6, 8, 0));
}

#[test]
fn test_weekend_skipped_without_overtime() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);

    // 周五 16:00 起，285 分钟的批次当日放不下
    let out = f.run(24, day(16), at(9, 16, 0));
    assert_eq!(out.assignments[0].start, at(12, 8, 0));
    assert!(!out.assignments[0].overtime);
}

#[test]
fn test_overtime_only_weekend_for_approved_operator() {
    let mut f = Fixture::new();
    f.calendar = CalendarService::new(
        CalendarConfig {
            holidays: vec![],
            shutdowns: vec![],
            weekend_policy: WeekendPolicy::OvertimeOnly,
        },
        366,
    );
    f.operator("OP-1", ProficiencyLevel::Expert, true, 4);

    let out = f.run(24, day(16), at(9, 16, 0));
    // 加班延长 120 分钟: 周五 16:00 + 285 分钟超过 19:00，顺延到周六
    assert_eq!(out.assignments[0].start, at(10, 8, 0));
    assert!(out.assignments[0].overtime);
}

#[test]
fn test_holiday_closed_even_for_overtime() {
    let mut f = Fixture::new();
    f.calendar = CalendarService::new(
        CalendarConfig {
            holidays: vec![Holiday {
                date: day(5),
                name: "Closure".to_string(),
            }],
            shutdowns: vec![],
            weekend_policy: WeekendPolicy::OvertimeOnly,
        },
        366,
    );
    f.operator("OP-1", ProficiencyLevel::Expert, true, 4);

    let out = f.run(10, day(9), at(5, 8, 0));
    assert_eq!(out.assignments[0].start, at(6, 8, 0));
}

#[test]
fn test_late_assignment_flagged_at_risk() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 1);

    // 5 个批次，每天 1 个；交期周二
    let out = f.run(120, day(6), at(5, 8, 0));
    assert_eq!(out.assignments.len(), 5);
    assert!(!out.assignments[0].at_risk);
    assert!(!out.assignments[1].at_risk);
    assert!(out.assignments[2].at_risk);
}

#[test]
fn test_downtime_is_avoided() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);
    f.catalog
        .add_downtime("HPLC-01", TimeWindow::new(at(5, 9, 0), at(5, 12, 0)))
        .unwrap();

    let out = f.run(10, day(9), at(5, 8, 0));
    // 145 分钟，08:00 起放不下，停机结束后开始
    assert_eq!(out.assignments[0].start, at(5, 12, 0));
}

#[test]
fn test_existing_reservations_are_respected() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);
    let ledger = f.ledger();
    ledger
        .reserve("HPLC-01", "OP-1", TimeWindow::new(at(5, 8, 0), at(5, 10, 0)), "OTHER-B1")
        .unwrap();

    let out = f.run_with(&ledger, 10, day(9), at(5, 8, 0));
    assert_eq!(out.assignments[0].start, at(5, 10, 0));
    assert_eq!(
        ledger.records(LaneKind::Instrument, "HPLC-01").unwrap().len(),
        2
    );
}

#[test]
fn test_same_inputs_same_schedule() {
    let f = Fixture::new();
    f.instrument("HPLC-02", false);
    f.operator("OP-1", ProficiencyLevel::Expert, false, 2);
    f.operator("OP-2", ProficiencyLevel::Expert, true, 2);

    let a = f.run(100, day(9), at(5, 8, 0));
    let b = f.run(100, day(9), at(5, 8, 0));
    assert_eq!(a, b);
}

// ==========================================
// 跨零点班次
// ==========================================

impl Fixture {
    fn night_operator(&self, id: &str) {
        self.roster
            .register_operator(Operator {
                operator_id: id.to_string(),
                name: id.to_string(),
                shift: ShiftWindow::new(
                    NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                ),
                max_concurrent_batches: 4,
                overtime_approved: false,
                active: true,
                leave: vec![],
            })
            .unwrap();
        self.roster
            .upsert_proficiency(ProficiencyRecord {
                operator_id: id.to_string(),
                method_id: "HPLC-001".to_string(),
                level: ProficiencyLevel::Expert,
                certified_on: day(1),
            })
            .unwrap();
    }

    /// 无认证的操作员，仅用于在账本中占用仪器
    fn placeholder_operator(&self, id: &str) {
        self.roster
            .register_operator(Operator {
                operator_id: id.to_string(),
                name: id.to_string(),
                shift: ShiftWindow::standard(),
                max_concurrent_batches: 4,
                overtime_approved: false,
                active: true,
                leave: vec![],
            })
            .unwrap();
    }
}

#[test]
fn test_night_shift_starts_after_midnight() {
    let f = Fixture::new();
    f.night_operator("OP-N");
    f.placeholder_operator("OP-X");
    let ledger = f.ledger();
    // 仪器周一 22:00 到周二 00:10 被占用
    ledger
        .reserve("HPLC-01", "OP-X", TimeWindow::new(at(5, 22, 0), at(6, 0, 10)), "OTHER-B1")
        .unwrap();

    let out = f.run_with(&ledger, 10, day(9), at(5, 8, 0));
    let a = &out.assignments[0];
    assert_eq!(a.operator_id, "OP-N");
    // 仍属周一班次: 零点后开工，06:00 前结束
    assert_eq!((a.start, a.end), (at(6, 0, 10), at(6, 2, 35)));
    assert!(!a.overtime);
}

#[test]
fn test_night_shift_cut_at_midnight_before_holiday() {
    let mut f = Fixture::new();
    f.calendar = CalendarService::new(
        CalendarConfig {
            holidays: vec![Holiday {
                date: day(6),
                name: "Closure".to_string(),
            }],
            shutdowns: vec![],
            weekend_policy: WeekendPolicy::NoWork,
        },
        366,
    );
    f.night_operator("OP-N");
    f.placeholder_operator("OP-X");
    let ledger = f.ledger();
    ledger
        .reserve("HPLC-01", "OP-X", TimeWindow::new(at(5, 22, 0), at(6, 0, 10)), "OTHER-B1")
        .unwrap();

    let out = f.run_with(&ledger, 10, day(9), at(5, 8, 0));
    // 周二为假日: 周一班次零点后不得开工，周二班次整体关闭，顺延到周三晚班
    assert_eq!(out.assignments[0].start, at(7, 22, 0));
}

// ==========================================
// 认证生效日期
// ==========================================

#[test]
fn test_certification_inside_horizon_takes_effect_on_its_date() {
    let f = Fixture::new();
    f.placeholder_operator("OP-1");
    f.roster
        .upsert_proficiency(ProficiencyRecord {
            operator_id: "OP-1".to_string(),
            method_id: "HPLC-001".to_string(),
            level: ProficiencyLevel::Expert,
            certified_on: day(7),
        })
        .unwrap();

    let out = f.run(10, day(9), at(5, 8, 0));
    assert!(out.unschedulable.is_empty());
    assert_eq!(out.assignments[0].start, at(7, 8, 0));
}

// ==========================================
// 预留冲突
// ==========================================

#[test]
fn test_reserve_falls_through_to_next_candidate_on_conflict() {
    let f = Fixture::new();
    f.instrument("HPLC-02", false);
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);
    f.placeholder_operator("OP-X");
    let ledger = f.ledger();
    let ctx = AllocationContext {
        catalog: &f.catalog,
        roster: &f.roster,
        calendar: &f.calendar,
        ledger: &ledger,
        config: &f.config,
        now: at(5, 8, 0),
    };
    let request = DemandRequest::new("REQ-1", "HPLC-001", 10, Priority::High, day(9));
    let batch = Batch {
        batch_id: "REQ-1-B1".to_string(),
        request_id: "REQ-1".to_string(),
        method_id: "HPLC-001".to_string(),
        method_version: 1,
        sequence: 1,
        sample_count: 10,
        planned_instrument_id: "HPLC-01".to_string(),
        duration_min: 145,
    };

    let allocator = Allocator::new();
    let instruments = allocator.usable_instruments(&ctx, &batch).unwrap();
    let operators = allocator.qualified_operators(&ctx, "HPLC-001").unwrap();
    let mut slots = allocator
        .search_slots(&ctx, &instruments, &operators, &batch)
        .unwrap();
    slots.sort_by(|a, b| compare_slots(a, b, OvertimePrecedence::Neutral));
    assert_eq!(slots[0].instrument_id, "HPLC-01");

    // 搜索之后、预留之前，偏好仪器被并发占用
    ledger
        .reserve("HPLC-01", "OP-X", TimeWindow::new(at(5, 8, 0), at(5, 17, 0)), "OTHER-B1")
        .unwrap();

    let assignment = allocator
        .reserve_first(&ctx, &request, &batch, slots, 1)
        .unwrap()
        .unwrap();
    assert_eq!(assignment.instrument_id, "HPLC-02");
    assert_eq!(assignment.operator_id, "OP-1");
    assert_eq!(assignment.start, at(5, 8, 0));
    assert_eq!(ledger.records(LaneKind::Instrument, "HPLC-02").unwrap().len(), 1);
}

#[test]
fn test_reserve_returns_none_when_every_candidate_collides() {
    let f = Fixture::new();
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);
    let ledger = f.ledger();
    let ctx = AllocationContext {
        catalog: &f.catalog,
        roster: &f.roster,
        calendar: &f.calendar,
        ledger: &ledger,
        config: &f.config,
        now: at(5, 8, 0),
    };
    let request = DemandRequest::new("REQ-1", "HPLC-001", 10, Priority::High, day(9));
    let slot = SlotCandidate {
        window: TimeWindow::from_start(at(5, 8, 0), 145),
        instrument_id: "HPLC-01".to_string(),
        operator_id: "OP-1".to_string(),
        preferred: true,
        level: ProficiencyLevel::Expert,
        workload_min: 0,
        overtime: false,
    };
    ledger
        .reserve("HPLC-01", "OP-1", TimeWindow::new(at(5, 9, 0), at(5, 10, 0)), "OTHER-B1")
        .unwrap();

    let batch = Batch {
        batch_id: "REQ-1-B1".to_string(),
        request_id: "REQ-1".to_string(),
        method_id: "HPLC-001".to_string(),
        method_version: 1,
        sequence: 1,
        sample_count: 10,
        planned_instrument_id: "HPLC-01".to_string(),
        duration_min: 145,
    };
    let result = Allocator::new()
        .reserve_first(&ctx, &request, &batch, vec![slot], 1)
        .unwrap();
    assert!(result.is_none());
    // 未写入半个预留
    assert_eq!(ledger.records(LaneKind::Operator, "OP-1").unwrap().len(), 1);
}

// ==========================================
// 排程窗口上限
// ==========================================

#[test]
fn test_oversized_horizon_is_clamped() {
    let mut f = Fixture::new();
    f.config.horizon_days = 1_000_000_000;
    f.operator("OP-1", ProficiencyLevel::Expert, false, 4);

    let out = f.run(10, day(9), at(5, 8, 0));
    assert_eq!(out.assignments[0].start, at(5, 8, 0));
}
