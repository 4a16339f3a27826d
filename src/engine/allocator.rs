// ==========================================
// 实验室产能排程系统 - 批次分配引擎
// ==========================================
// 职责: 为每个批次分配 (仪器, 操作员, 时间窗)
// 输入: 已排序的 (需求, 批次列表) 队列 + 资源快照 + 忙碌账本
// 输出: 排程分配 + 无法排程记录
// 算法: 逐批次最早可行时刻搜索，双资源原子预留
// 红线:
// - 同一仪器 / 同一操作员的区间永不重叠（账本保证）
// - 操作员必须持有生效且达标的熟练度记录
// - 批次样品数不超过所用规则的批量
// - 开始日期必须被日历允许（对加班人员按 overtime_only 规则）
// ==========================================

use crate::config::{OvertimePrecedence, PlanningConfig};
use crate::domain::demand::{Batch, DemandRequest};
use crate::domain::personnel::Operator;
use crate::domain::resource::Instrument;
use crate::domain::schedule::{ScheduleAssignment, UnschedulableBatch};
use crate::domain::types::{AssignmentStatus, ProficiencyLevel, UnschedulableReason};
use crate::domain::window::TimeWindow;
use crate::engine::calendar::CalendarService;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::personnel_roster::PersonnelRoster;
use crate::engine::resource_catalog::{CompatibleInstrument, ResourceCatalog};
use crate::repository::{BusyLedger, LaneKind, WorkloadSource};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
mod tests;

// ==========================================
// AllocationContext - 单次分配所需的资源视图
// ==========================================
pub struct AllocationContext<'a> {
    pub catalog: &'a ResourceCatalog,
    pub roster: &'a PersonnelRoster,
    pub calendar: &'a CalendarService,
    pub ledger: &'a BusyLedger,
    pub config: &'a PlanningConfig,
    pub now: NaiveDateTime,
}

impl AllocationContext<'_> {
    /// 排程窗口 [now, now + horizon_days)，天数按 MAX_WINDOW_DAYS 截断
    pub fn horizon(&self) -> TimeWindow {
        TimeWindow::from_start(self.now, self.config.effective_horizon_days() * 24 * 60)
    }
}

// ==========================================
// AllocationOutcome - 分配结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationOutcome {
    pub assignments: Vec<ScheduleAssignment>,
    pub unschedulable: Vec<UnschedulableBatch>,
}

// ==========================================
// 内部: 候选操作员 / 候选时段
// ==========================================
#[derive(Debug, Clone)]
struct OperatorCandidate {
    operator: Operator,
    level: ProficiencyLevel,
    certified_on: NaiveDate,
}

#[derive(Debug, Clone)]
struct SlotCandidate {
    window: TimeWindow,
    instrument_id: String,
    operator_id: String,
    preferred: bool,
    level: ProficiencyLevel,
    workload_min: i64,
    overtime: bool,
}

enum BatchResult {
    Committed(ScheduleAssignment),
    Unschedulable(UnschedulableBatch),
}

// ==========================================
// Allocator - 批次分配引擎
// ==========================================
pub struct Allocator {
    // 无状态引擎,不需要注入依赖
}

impl Allocator {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 按队列顺序逐批次分配
    ///
    /// 队列须已由 DemandPrioritySorter 排序；需求内批次按序号处理
    #[instrument(skip(self, ctx, queue), fields(requests = queue.len(), now = %ctx.now))]
    pub fn allocate(
        &self,
        ctx: &AllocationContext<'_>,
        queue: &[(DemandRequest, Vec<Batch>)],
    ) -> EngineResult<AllocationOutcome> {
        let mut outcome = AllocationOutcome::default();

        for (request, batches) in queue {
            let mut ordered: Vec<&Batch> = batches.iter().collect();
            ordered.sort_by_key(|b| b.sequence);

            for batch in ordered {
                match self.allocate_batch(ctx, request, batch)? {
                    BatchResult::Committed(a) => outcome.assignments.push(a),
                    BatchResult::Unschedulable(u) => outcome.unschedulable.push(u),
                }
            }
        }

        info!(
            committed = outcome.assignments.len(),
            unschedulable = outcome.unschedulable.len(),
            "批次分配完成"
        );
        Ok(outcome)
    }

    /// 单批次分配：搜索 → 按序尝试预留 → 冲突则重搜（有限轮）
    fn allocate_batch(
        &self,
        ctx: &AllocationContext<'_>,
        request: &DemandRequest,
        batch: &Batch,
    ) -> EngineResult<BatchResult> {
        let instruments = self.usable_instruments(ctx, batch)?;
        if instruments.is_empty() {
            return Ok(self.unschedulable(
                batch,
                UnschedulableReason::NoCompatibleInstrument,
                format!("无可容纳 {} 个样品的可用兼容仪器", batch.sample_count),
            ));
        }

        let operators = self.qualified_operators(ctx, &batch.method_id)?;
        if operators.is_empty() {
            return Ok(self.unschedulable(
                batch,
                UnschedulableReason::NoQualifiedOperator,
                format!("方法 {} 无达标的认证操作员", batch.method_id),
            ));
        }

        let rounds = ctx.config.max_reservation_rounds.max(1);
        for round in 1..=rounds {
            let mut slots = self.search_slots(ctx, &instruments, &operators, batch)?;
            if slots.is_empty() {
                break;
            }
            slots.sort_by(|a, b| compare_slots(a, b, ctx.config.policy.overtime_precedence));

            if let Some(assignment) = self.reserve_first(ctx, request, batch, slots, round)? {
                return Ok(BatchResult::Committed(assignment));
            }
        }

        Ok(self.unschedulable(
            batch,
            UnschedulableReason::CalendarExhausted,
            format!("排程窗口 {} 天内无可行时段", ctx.config.effective_horizon_days()),
        ))
    }

    /// 按排序依次预留，返回第一个成功的分配；全部冲突返回 None
    fn reserve_first(
        &self,
        ctx: &AllocationContext<'_>,
        request: &DemandRequest,
        batch: &Batch,
        slots: Vec<SlotCandidate>,
        round: u32,
    ) -> EngineResult<Option<ScheduleAssignment>> {
        for slot in slots {
            match ctx
                .ledger
                .reserve(&slot.instrument_id, &slot.operator_id, slot.window, &batch.batch_id)
            {
                Ok(()) => {
                    let at_risk = slot.window.end > end_of_day(request.due_date);
                    debug!(
                        batch_id = %batch.batch_id,
                        instrument_id = %slot.instrument_id,
                        operator_id = %slot.operator_id,
                        start = %slot.window.start,
                        end = %slot.window.end,
                        at_risk,
                        "批次预留成功"
                    );
                    return Ok(Some(ScheduleAssignment {
                        batch_id: batch.batch_id.clone(),
                        request_id: batch.request_id.clone(),
                        method_id: batch.method_id.clone(),
                        method_version: batch.method_version,
                        sample_count: batch.sample_count,
                        instrument_id: slot.instrument_id,
                        operator_id: slot.operator_id,
                        start: slot.window.start,
                        end: slot.window.end,
                        status: AssignmentStatus::Scheduled,
                        at_risk,
                        overtime: slot.overtime,
                    }));
                }
                Err(e) if e.is_conflict() => {
                    debug!(batch_id = %batch.batch_id, round, error = %e, "预留冲突，尝试下一候选");
                }
                Err(e) => return Err(EngineError::from(e)),
            }
        }
        Ok(None)
    }

    // ==========================================
    // 候选枚举
    // ==========================================

    /// 状态可用、窗口内有可运行时间、且规则批量容纳该批次的兼容仪器
    fn usable_instruments(
        &self,
        ctx: &AllocationContext<'_>,
        batch: &Batch,
    ) -> EngineResult<Vec<CompatibleInstrument>> {
        let horizon = ctx.horizon();
        Ok(ctx
            .catalog
            .query_compatible_instruments(&batch.method_id)?
            .into_iter()
            .filter(|c| c.rule.batch_size >= batch.sample_count)
            .filter(|c| c.instrument.has_uptime_within(&horizon))
            .filter(|c| ctx.ledger.has_lane(LaneKind::Instrument, &c.instrument.instrument_id))
            .collect())
    }

    /// 名册中排程窗口内合格且在账本中有车道的操作员（生效日期在时段搜索中逐日判断）
    fn qualified_operators(
        &self,
        ctx: &AllocationContext<'_>,
        method_id: &str,
    ) -> EngineResult<Vec<OperatorCandidate>> {
        Ok(ctx
            .roster
            .query_qualified_operators(
                method_id,
                &ctx.horizon(),
                ctx.config.min_proficiency,
                ctx.ledger,
            )?
            .into_iter()
            .filter(|q| ctx.ledger.has_lane(LaneKind::Operator, &q.operator.operator_id))
            .map(|q| OperatorCandidate {
                level: q.level,
                certified_on: q.certified_on,
                operator: q.operator,
            })
            .collect())
    }

    /// 每个 (仪器, 操作员) 组合的最早可行时段
    fn search_slots(
        &self,
        ctx: &AllocationContext<'_>,
        instruments: &[CompatibleInstrument],
        operators: &[OperatorCandidate],
        batch: &Batch,
    ) -> EngineResult<Vec<SlotCandidate>> {
        let mut slots = Vec::new();
        for inst in instruments {
            let duration = inst.rule.batch_duration_min(batch.sample_count);
            for op in operators {
                if let Some((window, overtime)) =
                    self.earliest_fit(ctx, &inst.instrument, op, duration)?
                {
                    slots.push(SlotCandidate {
                        window,
                        instrument_id: inst.instrument.instrument_id.clone(),
                        operator_id: op.operator.operator_id.clone(),
                        preferred: inst.rule.preferred,
                        level: op.level,
                        workload_min: ctx.ledger.committed_minutes(&op.operator.operator_id),
                        overtime,
                    });
                }
            }
        }
        Ok(slots)
    }

    // ==========================================
    // 最早可行时刻
    // ==========================================

    /// 逐个班次日搜索最早可行窗口，返回 (窗口, 是否加班)
    ///
    /// 单个班次日的约束:
    /// - 开始时刻 ∈ [max(班次开始, now), 班次结束)
    /// - 结束时刻 ≤ 班次结束 (+ 加班延长，仅已批准加班者)
    /// - 落在仪器校准期内、避开停机窗口、避开双方忙碌区间
    /// - 在排程窗口内结束
    fn earliest_fit(
        &self,
        ctx: &AllocationContext<'_>,
        instrument: &Instrument,
        op: &OperatorCandidate,
        duration_min: i64,
    ) -> EngineResult<Option<(TimeWindow, bool)>> {
        let horizon = ctx.horizon();
        let operator = &op.operator;
        let extension = if operator.overtime_approved {
            ctx.config.effective_overtime_extension_minutes()
        } else {
            0
        };

        let mut day = ctx.now.date() - Duration::days(1);
        while day <= horizon.end.date() {
            let shift_day = day;
            day += Duration::days(1);

            let Some(bounds) = self.shift_bounds(ctx, operator, op.certified_on, shift_day, extension)?
            else {
                continue;
            };
            let (mut lo, hi, shift_end, mut latest_end) = bounds;

            lo = lo.max(ctx.now);
            latest_end = latest_end.min(horizon.end);
            if let Some(calibration) = &instrument.calibration {
                lo = lo.max(calibration.start);
                latest_end = latest_end.min(calibration.end);
            }
            if lo >= hi {
                continue;
            }
            match plus_minutes(lo, duration_min) {
                Some(end) if end <= latest_end => {}
                _ => continue,
            }

            let span = TimeWindow::new(lo, latest_end);
            let mut blocks = ctx
                .ledger
                .busy_within(LaneKind::Instrument, &instrument.instrument_id, &span)?;
            blocks.extend(
                ctx.ledger
                    .busy_within(LaneKind::Operator, &operator.operator_id, &span)?,
            );
            blocks.extend(instrument.downtime.iter().filter(|d| d.overlaps(&span)).copied());
            blocks.sort();

            let Some((start, end)) = first_gap(lo, &blocks, duration_min) else {
                continue;
            };
            if start < hi && end <= latest_end {
                let window = TimeWindow::new(start, end);
                let overtime = end > shift_end || !ctx.calendar.is_working_day(start.date());
                return Ok(Some((window, overtime)));
            }
        }
        Ok(None)
    }

    /// 班次日的 (开始下界, 开始上界, 班次结束, 最晚结束)；当日不可用返回 None
    fn shift_bounds(
        &self,
        ctx: &AllocationContext<'_>,
        operator: &Operator,
        certified_on: NaiveDate,
        shift_day: NaiveDate,
        extension_min: i64,
    ) -> EngineResult<Option<(NaiveDateTime, NaiveDateTime, NaiveDateTime, NaiveDateTime)>> {
        if shift_day < certified_on || operator.on_leave(shift_day) {
            return Ok(None);
        }
        if !ctx
            .calendar
            .is_working_day_for(shift_day, operator.overtime_approved)
        {
            return Ok(None);
        }

        let shift = operator.shift.occurrence(shift_day);
        let mut hi = shift.end;

        // 跨零点班次: 次日不允许开工时，开始时刻截止到零点
        if operator.shift.crosses_midnight() {
            let next = shift_day + Duration::days(1);
            if !ctx.calendar.is_working_day_for(next, operator.overtime_approved) {
                hi = hi.min(next.and_time(NaiveTime::MIN));
            }
        }

        // 每日批次上限
        let day_span = TimeWindow::new(shift.start, shift.end + Duration::minutes(extension_min));
        let started = ctx.ledger.batches_starting_within(
            LaneKind::Operator,
            &operator.operator_id,
            &day_span,
        )?;
        if started >= operator.max_concurrent_batches as usize {
            return Ok(None);
        }

        Ok(Some((
            shift.start,
            hi,
            shift.end,
            shift.end + Duration::minutes(extension_min),
        )))
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn unschedulable(
        &self,
        batch: &Batch,
        reason: UnschedulableReason,
        detail: String,
    ) -> BatchResult {
        warn!(batch_id = %batch.batch_id, reason = %reason, detail = %detail, "批次无法排程");
        BatchResult::Unschedulable(UnschedulableBatch {
            batch_id: Some(batch.batch_id.clone()),
            request_id: batch.request_id.clone(),
            reason_code: reason,
            detail,
        })
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 纯函数
// ==========================================

/// 自 lo 起第一个长度 ≥ duration 的空档 (起点, 终点)；blocks 按开始时间升序，时刻溢出返回 None
fn first_gap(
    lo: NaiveDateTime,
    blocks: &[TimeWindow],
    duration_min: i64,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let mut t = lo;
    for b in blocks {
        if b.end <= t {
            continue;
        }
        if plus_minutes(t, duration_min)? <= b.start {
            break;
        }
        t = t.max(b.end);
    }
    Some((t, plus_minutes(t, duration_min)?))
}

/// t + minutes，超出 chrono 可表示范围返回 None
fn plus_minutes(t: NaiveDateTime, minutes: i64) -> Option<NaiveDateTime> {
    Duration::try_minutes(minutes).and_then(|d| t.checked_add_signed(d))
}

/// 候选排序: 开始早 → 偏好仪器 → 熟练度高 → 负载低 → (策略) 正常班 → 仪器ID → 操作员ID
fn compare_slots(a: &SlotCandidate, b: &SlotCandidate, policy: OvertimePrecedence) -> Ordering {
    let overtime = match policy {
        OvertimePrecedence::Neutral => Ordering::Equal,
        OvertimePrecedence::PreferRegular => a.overtime.cmp(&b.overtime),
    };
    a.window
        .start
        .cmp(&b.window.start)
        .then(b.preferred.cmp(&a.preferred))
        .then(b.level.cmp(&a.level))
        .then(a.workload_min.cmp(&b.workload_min))
        .then(overtime)
        .then_with(|| a.instrument_id.cmp(&b.instrument_id))
        .then_with(|| a.operator_id.cmp(&b.operator_id))
}

/// 交期当日结束时刻（次日零点）
pub(crate) fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    (date + Duration::days(1)).and_time(NaiveTime::MIN)
}
