// ==========================================
// 实验室产能排程系统 - 产能分析引擎
// ==========================================
// 职责: 汇总已提交排程与资源目录，输出产能/瓶颈/风险/建议
// 输入: 排程快照 + 资源目录 + 人员名册 + 日历
// 输出: CapacityOverview
// 红线: 只读，不修改任何排程状态
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::capacity::{
    AtRiskCause, AtRiskDemand, CapacityOverview, MethodCapacity, OverallMetrics, Recommendation,
    RecommendationKind, ResourceKind, ResourceUtilization,
};
use crate::domain::demand::DemandRequest;
use crate::domain::personnel::Operator;
use crate::domain::resource::{Instrument, Method};
use crate::domain::schedule::ScheduleSnapshot;
use crate::domain::types::BottleneckFactor;
use crate::domain::window::TimeWindow;
use crate::engine::allocator::end_of_day;
use crate::engine::calendar::CalendarService;
use crate::engine::error::EngineResult;
use crate::engine::personnel_roster::PersonnelRoster;
use crate::engine::resource_catalog::ResourceCatalog;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

// ==========================================
// AnalysisContext - 分析所需的资源视图
// ==========================================
pub struct AnalysisContext<'a> {
    pub catalog: &'a ResourceCatalog,
    pub roster: &'a PersonnelRoster,
    pub calendar: &'a CalendarService,
    pub config: &'a PlanningConfig,
    pub now: NaiveDateTime,
}

impl AnalysisContext<'_> {
    /// 分析窗口 [now, now + analysis_window_days)
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_start(self.now, self.config.effective_analysis_window_days() * 24 * 60)
    }

    fn window_days(&self) -> impl Iterator<Item = NaiveDate> {
        let first = self.now.date();
        (0..self.config.effective_analysis_window_days()).map(move |i| first + Duration::days(i))
    }
}

// ==========================================
// 内部: 方法级负荷
// ==========================================
struct MethodLoad {
    capacity: MethodCapacity,
    instrument_load: f64,
    personnel_load: f64,
    operators: Vec<Operator>,
}

// ==========================================
// CapacityAnalyzer - 产能分析引擎
// ==========================================
pub struct CapacityAnalyzer {
    // 无状态引擎,不需要注入依赖
}

impl CapacityAnalyzer {
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 生成产能概览
    #[instrument(skip(self, ctx, snapshot), fields(now = %ctx.now, assignments = snapshot.assignments.len()))]
    pub fn analyze(
        &self,
        ctx: &AnalysisContext<'_>,
        snapshot: &ScheduleSnapshot,
    ) -> EngineResult<CapacityOverview> {
        let instruments = ctx.catalog.instruments()?;
        let operators = ctx.roster.operators()?;

        // ===== 资源利用率 =====
        let instrument_utilization: Vec<ResourceUtilization> = instruments
            .iter()
            .map(|i| self.instrument_row(ctx, snapshot, i))
            .collect();
        let operator_utilization: Vec<ResourceUtilization> = operators
            .iter()
            .filter(|o| o.active)
            .map(|o| self.operator_row(ctx, snapshot, o))
            .collect();
        let operator_util_map: HashMap<&str, f64> = operator_utilization
            .iter()
            .map(|r| (r.resource_id.as_str(), r.utilization))
            .collect();

        // ===== 方法级产能 =====
        let mut loads = Vec::new();
        for method in ctx.catalog.methods()?.into_iter().filter(|m| m.active) {
            loads.push(self.method_load(ctx, snapshot, &method)?);
        }

        // ===== 建议 =====
        let mut recommendations = Vec::new();
        for load in &loads {
            recommendations.extend(self.recommend(ctx, load, &operator_util_map));
        }

        let by_method: Vec<MethodCapacity> = loads.into_iter().map(|l| l.capacity).collect();
        let at_risk = self.at_risk_demands(ctx, snapshot)?;
        let overall_metrics =
            self.overall_metrics(ctx, snapshot, &by_method, &instrument_utilization, recommendations.len());

        debug!(
            methods = by_method.len(),
            at_risk = at_risk.len(),
            recommendations = recommendations.len(),
            "产能分析完成"
        );

        Ok(CapacityOverview {
            generated_at: ctx.now,
            by_method,
            overall_metrics,
            at_risk,
            recommendations,
            instrument_utilization,
            operator_utilization,
        })
    }

    // ==========================================
    // 方法级计算
    // ==========================================

    /// 日产能 = Σ 可用兼容仪器 (日运行分钟 / 满批时长 × 批量)，
    /// 上限 = Σ 合格操作员每日批次上限 × 参考批量
    fn method_load(
        &self,
        ctx: &AnalysisContext<'_>,
        snapshot: &ScheduleSnapshot,
        method: &Method,
    ) -> EngineResult<MethodLoad> {
        let window = ctx.window();
        let usable: Vec<_> = ctx
            .catalog
            .query_compatible_instruments(&method.method_id)?
            .into_iter()
            .filter(|c| c.instrument.has_uptime_within(&window))
            .collect();
        let certified = ctx.roster.certified_operators(
            &method.method_id,
            ctx.now.date(),
            ctx.config.min_proficiency,
        )?;

        let operating_min = ctx.config.operating_hours_per_day * 60.0;
        let instrument_daily: f64 = usable
            .iter()
            .filter(|c| c.rule.full_batch_duration_min() > 0)
            .map(|c| {
                operating_min / c.rule.full_batch_duration_min() as f64 * f64::from(c.rule.batch_size)
            })
            .sum();
        let reference_batch = usable
            .iter()
            .map(|c| c.rule.batch_size)
            .max()
            .unwrap_or(method.default_batch_size);
        let personnel_cap: f64 = certified
            .iter()
            .map(|(o, _)| f64::from(o.max_concurrent_batches) * f64::from(reference_batch))
            .sum();
        let daily_capacity = instrument_daily.min(personnel_cap);

        let working_days = ctx
            .calendar
            .working_days_between(ctx.now.date(), ctx.now.date() + Duration::days(7));
        let weekly_capacity = daily_capacity * working_days as f64;

        // ===== 负荷 =====
        let scheduled_min: i64 = snapshot
            .assignments
            .iter()
            .filter(|a| a.method_id == method.method_id)
            .map(|a| a.window().overlap_min(&window))
            .sum();
        let queued_min: i64 = snapshot
            .pending_batches
            .iter()
            .filter(|b| b.method_id == method.method_id)
            .map(|b| b.duration_min)
            .sum();
        let scheduled_hours = scheduled_min as f64 / 60.0;
        let queued_hours = queued_min as f64 / 60.0;
        let demand_hours = scheduled_hours + queued_hours;

        let instrument_hours: f64 = usable
            .iter()
            .map(|c| self.instrument_available_hours(ctx, &c.instrument))
            .sum();
        let operators: Vec<Operator> = certified.into_iter().map(|(o, _)| o).collect();
        let operator_hours: f64 = operators
            .iter()
            .map(|o| self.operator_available_hours(ctx, o))
            .sum();

        let current_utilization = ratio(scheduled_hours, instrument_hours);
        let instrument_load = load(demand_hours, instrument_hours);
        let personnel_load = load(demand_hours, operator_hours);
        let bottleneck_factor =
            classify_bottleneck(instrument_load, personnel_load, ctx.config.balance_tolerance);

        Ok(MethodLoad {
            capacity: MethodCapacity {
                method_id: method.method_id.clone(),
                method_name: method.name.clone(),
                daily_capacity,
                weekly_capacity,
                available_capacity: weekly_capacity * (1.0 - current_utilization).max(0.0),
                current_utilization,
                scheduled_hours,
                queued_hours,
                qualified_operators: operators.len(),
                available_instruments: usable.len(),
                bottleneck_factor,
            },
            instrument_load,
            personnel_load,
            operators,
        })
    }

    /// 建议规则:
    /// - 交叉培训: 方法的全部合格操作员均饱和
    /// - 采购: 仪器为瓶颈且饱和
    /// - 加班: 人员为瓶颈且饱和，且无合格操作员获批加班
    fn recommend(
        &self,
        ctx: &AnalysisContext<'_>,
        load: &MethodLoad,
        operator_util: &HashMap<&str, f64>,
    ) -> Vec<Recommendation> {
        let threshold = ctx.config.saturation_threshold;
        let method_id = &load.capacity.method_id;
        let mut out = Vec::new();

        let operator_ids: Vec<String> = load.operators.iter().map(|o| o.operator_id.clone()).collect();
        let all_saturated = !load.operators.is_empty()
            && load.operators.iter().all(|o| {
                operator_util
                    .get(o.operator_id.as_str())
                    .is_some_and(|u| *u >= threshold)
            });
        if all_saturated {
            out.push(Recommendation {
                kind: RecommendationKind::CrossTraining,
                method_id: method_id.clone(),
                resource_ids: operator_ids.clone(),
                message: format!(
                    "方法 {} 的 {} 名合格操作员均已饱和，建议交叉培训",
                    method_id,
                    operator_ids.len()
                ),
            });
        }

        match load.capacity.bottleneck_factor {
            BottleneckFactor::Instrument if load.instrument_load >= threshold => {
                out.push(Recommendation {
                    kind: RecommendationKind::Procurement,
                    method_id: method_id.clone(),
                    resource_ids: Vec::new(),
                    message: format!(
                        "方法 {} 仪器负荷 {:.0}%，建议增购兼容仪器",
                        method_id,
                        finite_pct(load.instrument_load)
                    ),
                });
            }
            BottleneckFactor::Personnel
                if load.personnel_load >= threshold
                    && !load.operators.iter().any(|o| o.overtime_approved) =>
            {
                out.push(Recommendation {
                    kind: RecommendationKind::Overtime,
                    method_id: method_id.clone(),
                    resource_ids: operator_ids,
                    message: format!(
                        "方法 {} 人员负荷 {:.0}%，且无合格操作员获批加班，建议批准加班",
                        method_id,
                        finite_pct(load.personnel_load)
                    ),
                });
            }
            _ => {}
        }
        out
    }

    // ==========================================
    // 风险需求
    // ==========================================

    /// 风险需求排序: 优先级降序 → 延误分钟降序 → 需求ID
    fn at_risk_demands(
        &self,
        ctx: &AnalysisContext<'_>,
        snapshot: &ScheduleSnapshot,
    ) -> EngineResult<Vec<AtRiskDemand>> {
        let unschedulable: BTreeSet<&str> = snapshot
            .unschedulable
            .iter()
            .map(|u| u.request_id.as_str())
            .collect();
        let pending: BTreeSet<&str> = snapshot
            .pending_batches
            .iter()
            .map(|b| b.request_id.as_str())
            .collect();

        let mut out = Vec::new();
        for request in snapshot.requests.iter().filter(|r| r.status.is_open()) {
            let due_end = end_of_day(request.due_date);
            let completion = snapshot
                .assignments_for_request(&request.request_id)
                .map(|a| a.end)
                .max();

            let entry = if unschedulable.contains(request.request_id.as_str()) {
                Some((
                    AtRiskCause::Unschedulable,
                    completion,
                    (ctx.now - due_end).num_minutes().max(0),
                ))
            } else if let Some(end) = completion.filter(|end| *end > due_end) {
                Some((AtRiskCause::LateAssignment, Some(end), (end - due_end).num_minutes()))
            } else if pending.contains(request.request_id.as_str()) {
                self.lead_time_risk(ctx, request)?
                    .map(|lateness| (AtRiskCause::LeadTimeExceeded, completion, lateness))
            } else {
                None
            };

            if let Some((cause, projected_completion, lateness_min)) = entry {
                out.push(AtRiskDemand {
                    request_id: request.request_id.clone(),
                    method_id: request.method_id.clone(),
                    priority: request.priority,
                    due_date: request.due_date,
                    projected_completion,
                    lateness_min,
                    cause,
                });
            }
        }

        out.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.lateness_min.cmp(&a.lateness_min))
                .then(a.request_id.cmp(&b.request_id))
        });
        Ok(out)
    }

    /// now + 前置天数 超过交期则返回超出分钟数
    fn lead_time_risk(
        &self,
        ctx: &AnalysisContext<'_>,
        request: &DemandRequest,
    ) -> EngineResult<Option<i64>> {
        let lead_days = ctx
            .catalog
            .method(&request.method_id)
            .map(|m| m.lead_time_days)
            .unwrap_or(0);
        let earliest = Duration::try_days(lead_days)
            .and_then(|d| ctx.now.date().checked_add_signed(d))
            .unwrap_or(NaiveDate::MAX);
        if earliest > request.due_date {
            Ok(Some((earliest - request.due_date).num_minutes()))
        } else {
            Ok(None)
        }
    }

    // ==========================================
    // 资源利用率
    // ==========================================

    fn instrument_row(
        &self,
        ctx: &AnalysisContext<'_>,
        snapshot: &ScheduleSnapshot,
        instrument: &Instrument,
    ) -> ResourceUtilization {
        let window = ctx.window();
        let scheduled_min: i64 = snapshot
            .assignments
            .iter()
            .filter(|a| a.instrument_id == instrument.instrument_id)
            .map(|a| a.window().overlap_min(&window))
            .sum();
        let available_hours = self.instrument_available_hours(ctx, instrument);
        let scheduled_hours = scheduled_min as f64 / 60.0;
        ResourceUtilization {
            resource_id: instrument.instrument_id.clone(),
            kind: ResourceKind::Instrument,
            scheduled_hours,
            available_hours,
            utilization: ratio(scheduled_hours, available_hours),
        }
    }

    fn operator_row(
        &self,
        ctx: &AnalysisContext<'_>,
        snapshot: &ScheduleSnapshot,
        operator: &Operator,
    ) -> ResourceUtilization {
        let window = ctx.window();
        let scheduled_min: i64 = snapshot
            .assignments
            .iter()
            .filter(|a| a.operator_id == operator.operator_id)
            .map(|a| a.window().overlap_min(&window))
            .sum();
        let available_hours = self.operator_available_hours(ctx, operator);
        let scheduled_hours = scheduled_min as f64 / 60.0;
        ResourceUtilization {
            resource_id: operator.operator_id.clone(),
            kind: ResourceKind::Operator,
            scheduled_hours,
            available_hours,
            utilization: ratio(scheduled_hours, available_hours),
        }
    }

    /// 窗口内工作日 × 日运行小时，扣除停机；不可用仪器为 0
    fn instrument_available_hours(&self, ctx: &AnalysisContext<'_>, instrument: &Instrument) -> f64 {
        if !instrument.status.is_available() {
            return 0.0;
        }
        let window = ctx.window();
        let days = ctx.window_days().filter(|d| ctx.calendar.is_working_day(*d)).count();
        let downtime_min: i64 = instrument
            .downtime
            .iter()
            .map(|d| d.overlap_min(&window))
            .sum();
        (days as f64 * ctx.config.operating_hours_per_day - downtime_min as f64 / 60.0).max(0.0)
    }

    /// 窗口内可工作日的班次时长（扣除请假）
    fn operator_available_hours(&self, ctx: &AnalysisContext<'_>, operator: &Operator) -> f64 {
        let shift_hours = operator.shift.length_min() as f64 / 60.0;
        let days = ctx
            .window_days()
            .filter(|d| !operator.on_leave(*d))
            .filter(|d| ctx.calendar.is_working_day_for(*d, operator.overtime_approved))
            .count();
        days as f64 * shift_hours
    }

    // ==========================================
    // 全局指标
    // ==========================================

    fn overall_metrics(
        &self,
        _ctx: &AnalysisContext<'_>,
        snapshot: &ScheduleSnapshot,
        by_method: &[MethodCapacity],
        instrument_rows: &[ResourceUtilization],
        opportunities: usize,
    ) -> OverallMetrics {
        let scheduled: f64 = instrument_rows.iter().map(|r| r.scheduled_hours).sum();
        let available: f64 = instrument_rows.iter().map(|r| r.available_hours).sum();

        let projected_bottlenecks: Vec<String> = by_method
            .iter()
            .filter(|m| m.bottleneck_factor != BottleneckFactor::Balanced || m.current_utilization >= 1.0)
            .filter(|m| m.current_utilization > 0.0 || m.queued_hours > 0.0)
            .map(|m| m.method_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let total = snapshot.assignments.len();
        let late = snapshot.assignments.iter().filter(|a| a.at_risk).count();
        let on_time_rate = if total == 0 {
            1.0
        } else {
            (total - late) as f64 / total as f64
        };

        OverallMetrics {
            total_daily_capacity: by_method.iter().map(|m| m.daily_capacity).sum(),
            total_weekly_capacity: by_method.iter().map(|m| m.weekly_capacity).sum(),
            current_demand: snapshot
                .requests
                .iter()
                .filter(|r| r.status.is_open())
                .map(|r| u64::from(r.sample_count))
                .sum(),
            capacity_utilization: ratio(scheduled, available),
            projected_bottlenecks,
            optimization_opportunities: opportunities,
            on_time_rate,
        }
    }
}

impl Default for CapacityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 纯函数
// ==========================================

fn ratio(used: f64, available: f64) -> f64 {
    if available > 0.0 {
        used / available
    } else {
        0.0
    }
}

/// 负荷率；无可用工时但有需求时视为无穷大
fn load(demand: f64, available: f64) -> f64 {
    if available > 0.0 {
        demand / available
    } else if demand > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// 负荷高的一侧先饱和；两侧差值在容差内视为均衡
pub(crate) fn classify_bottleneck(instrument: f64, personnel: f64, tolerance: f64) -> BottleneckFactor {
    if instrument.is_infinite() && personnel.is_infinite() {
        return BottleneckFactor::Balanced;
    }
    if (instrument - personnel).abs() <= tolerance {
        BottleneckFactor::Balanced
    } else if instrument > personnel {
        BottleneckFactor::Instrument
    } else {
        BottleneckFactor::Personnel
    }
}

fn finite_pct(v: f64) -> f64 {
    if v.is_finite() {
        v * 100.0
    } else {
        999.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_bottleneck() {
        assert_eq!(classify_bottleneck(0.9, 0.5, 0.1), BottleneckFactor::Instrument);
        assert_eq!(classify_bottleneck(0.4, 0.95, 0.1), BottleneckFactor::Personnel);
        assert_eq!(classify_bottleneck(0.5, 0.55, 0.1), BottleneckFactor::Balanced);
        assert_eq!(
            classify_bottleneck(f64::INFINITY, 0.2, 0.1),
            BottleneckFactor::Instrument
        );
        assert_eq!(
            classify_bottleneck(f64::INFINITY, f64::INFINITY, 0.1),
            BottleneckFactor::Balanced
        );
    }

    #[test]
    fn test_load_and_ratio() {
        assert_eq!(ratio(2.0, 0.0), 0.0);
        assert_eq!(load(0.0, 0.0), 0.0);
        assert!(load(1.0, 0.0).is_infinite());
        assert!((load(3.0, 4.0) - 0.75).abs() < 1e-9);
    }
}
