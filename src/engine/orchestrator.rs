// ==========================================
// 实验室产能排程系统 - 排程周期编排器
// ==========================================
// 用途: 协调 受理 → 事件应用 → 重排校验 → 拆分 → 分配 → 快照 的执行顺序
// 并发模型:
// - 完整周期由状态锁串行化
// - 周期运行中到达的资源事件进入队列，下个周期开始时统一应用
// - 产能查询读取最近一次提交的快照，不阻塞周期
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::calendar::CalendarConfig;
use crate::domain::capacity::CapacityOverview;
use crate::domain::demand::{Batch, DemandRequest};
use crate::domain::schedule::{ScheduleAssignment, ScheduleSnapshot, UnschedulableBatch};
use crate::domain::types::{AssignmentStatus, DemandStatus};
use crate::engine::allocator::{AllocationContext, Allocator};
use crate::engine::batch_planner::{BatchPlanner, Decomposition};
use crate::engine::calendar::CalendarService;
use crate::engine::capacity_analyzer::{AnalysisContext, CapacityAnalyzer};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{
    OptionalEventPublisher, PlanningEvent, PlanningEventType, ResourceEvent,
};
use crate::engine::personnel_roster::PersonnelRoster;
use crate::engine::priority::DemandPrioritySorter;
use crate::engine::replan::ReplanEngine;
use crate::engine::resource_catalog::ResourceCatalog;
use crate::repository::{BusyLedger, MutationLog};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// PlanningCycleReport - 周期报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningCycleReport {
    pub cycle_id: String,
    pub as_of: NaiveDateTime,
    pub events_applied: usize,
    pub events_rejected: usize,
    pub kept: usize,
    pub invalidated: usize,
    pub committed: usize,
    pub unschedulable: usize,
    pub elapsed_ms: u64,
}

// ==========================================
// 调度器内部状态（受状态锁保护）
// ==========================================
struct SchedulerState {
    requests: BTreeMap<String, DemandRequest>,
    batches: BTreeMap<String, Batch>,                   // 未完成批次
    assignments: BTreeMap<String, ScheduleAssignment>, // batch_id → 占用资源的分配
    completed: BTreeMap<String, usize>, // request_id → 已完工批次数
    unschedulable: Vec<UnschedulableBatch>,
    ledger: BusyLedger,
    next_seq: u64,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            requests: BTreeMap::new(),
            batches: BTreeMap::new(),
            assignments: BTreeMap::new(),
            completed: BTreeMap::new(),
            unschedulable: Vec::new(),
            ledger: BusyLedger::empty(),
            next_seq: 1,
        }
    }

    fn batches_of(&self, request_id: &str) -> Vec<Batch> {
        self.batches
            .values()
            .filter(|b| b.request_id == request_id)
            .cloned()
            .collect()
    }

    fn has_progress(&self, request_id: &str) -> bool {
        self.assignments.values().any(|a| a.request_id == request_id)
            || self.completed.contains_key(request_id)
    }

    fn backup(&self) -> StateBackup {
        StateBackup {
            requests: self.requests.clone(),
            batches: self.batches.clone(),
            assignments: self.assignments.clone(),
            unschedulable: self.unschedulable.clone(),
        }
    }

    fn restore(&mut self, backup: StateBackup) {
        self.requests = backup.requests;
        self.batches = backup.batches;
        self.assignments = backup.assignments;
        self.unschedulable = backup.unschedulable;
    }
}

// 排程周期会修改的部分，周期失败时整体恢复
struct StateBackup {
    requests: BTreeMap<String, DemandRequest>,
    batches: BTreeMap<String, Batch>,
    assignments: BTreeMap<String, ScheduleAssignment>,
    unschedulable: Vec<UnschedulableBatch>,
}

// 周期步骤2-5的计数与受影响需求
struct CycleTally {
    kept: usize,
    invalidated: usize,
    committed: usize,
    invalidated_requests: Vec<String>,
    unschedulable_requests: Vec<String>,
}

// ==========================================
// LabScheduler - 排程周期编排器
// ==========================================
pub struct LabScheduler {
    catalog: Arc<ResourceCatalog>,
    roster: Arc<PersonnelRoster>,
    calendar: RwLock<CalendarService>,
    config: PlanningConfig,
    log: Arc<MutationLog>,

    state: Mutex<SchedulerState>,
    events: Mutex<VecDeque<ResourceEvent>>,
    snapshot: RwLock<Arc<ScheduleSnapshot>>,
    publisher: OptionalEventPublisher,

    planner: BatchPlanner,
    sorter: DemandPrioritySorter,
    allocator: Allocator,
    replan: ReplanEngine,
    analyzer: CapacityAnalyzer,
}

impl LabScheduler {
    /// 创建调度器（目录 / 名册共享同一条变更日志）
    pub fn new(config: PlanningConfig, calendar: CalendarConfig) -> Self {
        let log = Arc::new(MutationLog::new());
        Self {
            catalog: Arc::new(ResourceCatalog::new(log.clone())),
            roster: Arc::new(PersonnelRoster::new(log.clone())),
            calendar: RwLock::new(CalendarService::new(
                calendar,
                config.calendar_search_limit_days,
            )),
            config,
            log,
            state: Mutex::new(SchedulerState::new()),
            events: Mutex::new(VecDeque::new()),
            snapshot: RwLock::new(Arc::new(ScheduleSnapshot::default())),
            publisher: OptionalEventPublisher::none(),
            planner: BatchPlanner::new(),
            sorter: DemandPrioritySorter::new(),
            allocator: Allocator::new(),
            replan: ReplanEngine::new(),
            analyzer: CapacityAnalyzer::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: OptionalEventPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn roster(&self) -> &PersonnelRoster {
        &self.roster
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    pub fn mutation_log(&self) -> &Arc<MutationLog> {
        &self.log
    }

    pub fn calendar(&self) -> EngineResult<CalendarService> {
        Ok(self
            .calendar
            .read()
            .map_err(|e| EngineError::LockError(e.to_string()))?
            .clone())
    }

    // ==========================================
    // 需求受理
    // ==========================================

    /// 受理需求
    ///
    /// 校验: 样品数 > 0、方法存在且在用、ID 未被占用（已撤回的 ID 可重新提交）
    pub fn submit(&self, request: DemandRequest) -> EngineResult<u64> {
        if request.sample_count == 0 {
            return Err(EngineError::validation("sample_count", "样品数必须大于 0"));
        }
        match self.catalog.method(&request.method_id) {
            Ok(m) if m.active => {}
            Ok(_) => {
                return Err(EngineError::validation(
                    "method_id",
                    format!("方法 {} 已停用", request.method_id),
                ))
            }
            Err(EngineError::NotFound { .. }) => {
                return Err(EngineError::validation(
                    "method_id",
                    format!("未知方法 {}", request.method_id),
                ))
            }
            Err(e) => return Err(e),
        }

        let mut state = self.lock_state()?;
        if let Some(existing) = state.requests.get(&request.request_id) {
            if existing.status != DemandStatus::Cancelled {
                return Err(EngineError::Duplicate {
                    entity: "request".to_string(),
                    id: request.request_id.clone(),
                });
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let mut request = request;
        request.submission_seq = seq;
        request.status = DemandStatus::Pending;
        state.completed.remove(&request.request_id);
        info!(
            request_id = %request.request_id,
            method_id = %request.method_id,
            samples = request.sample_count,
            priority = %request.priority,
            seq,
            "受理需求"
        );
        state.requests.insert(request.request_id.clone(), request);
        Ok(seq)
    }

    /// 撤回需求：立即释放其全部占用区间，返回释放的分配数
    ///
    /// 已有批次开工的需求不可撤回
    pub fn withdraw(&self, request_id: &str) -> EngineResult<usize> {
        let mut state = self.lock_state()?;
        let status = state
            .requests
            .get(request_id)
            .map(|r| r.status)
            .ok_or_else(|| EngineError::not_found("request", request_id))?;
        if !status.is_open() {
            return Err(self.transition_error("request", request_id, status, "cancelled"));
        }
        if state
            .assignments
            .values()
            .any(|a| a.request_id == request_id && a.status.is_frozen())
        {
            return Err(EngineError::InvalidTransition {
                entity: "request".to_string(),
                id: request_id.to_string(),
                from: "in_progress".to_string(),
                to: "cancelled".to_string(),
            });
        }

        let batch_ids: Vec<String> = state
            .assignments
            .values()
            .filter(|a| a.request_id == request_id)
            .map(|a| a.batch_id.clone())
            .collect();
        for batch_id in &batch_ids {
            state.ledger.release_batch(batch_id)?;
            state.assignments.remove(batch_id);
        }
        state.batches.retain(|_, b| b.request_id != request_id);
        state.unschedulable.retain(|u| u.request_id != request_id);
        if let Some(r) = state.requests.get_mut(request_id) {
            r.status = DemandStatus::Cancelled;
        }

        info!(request_id, released = batch_ids.len(), "需求撤回，释放占用区间");
        self.refresh_snapshot(&state)?;
        drop(state);

        self.publish(PlanningEvent::new(
            None,
            PlanningEventType::RequestWithdrawn,
            vec![request_id.to_string()],
        ));
        Ok(batch_ids.len())
    }

    /// 资源状态变更入队
    pub fn enqueue_event(&self, event: ResourceEvent) -> EngineResult<usize> {
        let mut events = self
            .events
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?;
        debug!(event_type = event.as_str(), "资源事件入队");
        events.push_back(event);
        Ok(events.len())
    }

    // ==========================================
    // 核心方法: 排程周期
    // ==========================================

    /// 执行一个完整排程周期
    #[instrument(skip(self), fields(now = %now))]
    pub fn run_cycle(&self, now: NaiveDateTime) -> EngineResult<PlanningCycleReport> {
        let started = Instant::now();
        let cycle_id = Uuid::new_v4().to_string();
        let mut state = self.lock_state()?;

        info!(cycle_id = %cycle_id, requests = state.requests.len(), "开始排程周期");

        // ==========================================
        // 步骤1: 应用排队的资源事件
        // ==========================================
        let (events_applied, events_rejected) = self.apply_pending_events()?;

        let calendar = self.calendar()?;
        let instruments = self.catalog.instruments()?;
        let operators = self.roster.operators()?;
        let ledger = BusyLedger::new(
            instruments.iter().map(|i| i.instrument_id.as_str()),
            operators.iter().map(|o| o.operator_id.as_str()),
        );
        let ctx = AllocationContext {
            catalog: &self.catalog,
            roster: &self.roster,
            calendar: &calendar,
            ledger: &ledger,
            config: &self.config,
            now,
        };

        // ==========================================
        // 步骤2-5: 就地规划，失败则恢复周期前状态
        // ==========================================
        let backup = state.backup();
        let tally = match self.plan_cycle(&mut state, &ctx) {
            Ok(tally) => tally,
            Err(e) => {
                state.restore(backup);
                warn!(cycle_id = %cycle_id, error = %e, "排程周期失败，恢复周期前状态");
                return Err(e);
            }
        };

        let previous_ledger = std::mem::replace(&mut state.ledger, ledger);
        let unschedulable_count = state.unschedulable.len();
        if let Err(e) = self.commit_snapshot(&state, Some(cycle_id.clone()), Some(now)) {
            state.ledger = previous_ledger;
            state.restore(backup);
            return Err(e);
        }
        drop(state);

        let CycleTally {
            kept: kept_count,
            invalidated: invalidated_count,
            committed,
            invalidated_requests: mut invalidated,
            unschedulable_requests,
        } = tally;

        // ==========================================
        // 步骤6: 发布周期事件
        // ==========================================
        invalidated.sort();
        invalidated.dedup();
        if !invalidated.is_empty() {
            self.publish(PlanningEvent::new(
                Some(cycle_id.clone()),
                PlanningEventType::AssignmentsInvalidated,
                invalidated,
            ));
        }
        if !unschedulable_requests.is_empty() {
            self.publish(PlanningEvent::new(
                Some(cycle_id.clone()),
                PlanningEventType::BatchesUnschedulable,
                unschedulable_requests,
            ));
        }
        self.publish(PlanningEvent::new(
            Some(cycle_id.clone()),
            PlanningEventType::CycleCompleted,
            Vec::new(),
        ));

        let report = PlanningCycleReport {
            cycle_id,
            as_of: now,
            events_applied,
            events_rejected,
            kept: kept_count,
            invalidated: invalidated_count,
            committed,
            unschedulable: unschedulable_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            cycle_id = %report.cycle_id,
            kept = report.kept,
            invalidated = report.invalidated,
            committed = report.committed,
            unschedulable = report.unschedulable,
            elapsed_ms = report.elapsed_ms,
            "排程周期完成"
        );
        Ok(report)
    }

    /// 周期步骤2-5：校验 → 拆分 → 分配 → 更新需求状态
    ///
    /// 出错时 state 可能已部分修改，由调用方回滚
    fn plan_cycle(
        &self,
        state: &mut SchedulerState,
        ctx: &AllocationContext<'_>,
    ) -> EngineResult<CycleTally> {
        // ==========================================
        // 步骤2: 重排校验，保留的分配重新写入账本
        // ==========================================
        debug!("步骤2: 校验已承诺分配");
        let existing: Vec<ScheduleAssignment> =
            std::mem::take(&mut state.assignments).into_values().collect();
        let outcome = self.replan.validate(ctx, existing)?;

        let mut kept = outcome.kept;
        kept.sort_by(|a, b| {
            b.status
                .is_frozen()
                .cmp(&a.status.is_frozen())
                .then(a.start.cmp(&b.start))
                .then_with(|| a.batch_id.cmp(&b.batch_id))
        });
        let mut invalidated: Vec<String> = outcome
            .invalidated
            .iter()
            .map(|s| s.assignment.request_id.clone())
            .collect();
        let invalidated_count = outcome.invalidated.len();
        let mut kept_count = 0;
        for a in kept {
            match ctx.ledger.reserve(&a.instrument_id, &a.operator_id, a.window(), &a.batch_id) {
                Ok(()) => {
                    kept_count += 1;
                    state.assignments.insert(a.batch_id.clone(), a);
                }
                Err(e) if a.status == AssignmentStatus::Scheduled => {
                    warn!(batch_id = %a.batch_id, error = %e, "StaleAssignment: 保留分配无法重新占用，重新排队");
                    invalidated.push(a.request_id.clone());
                }
                Err(e) => return Err(EngineError::from(e)),
            }
        }

        // ==========================================
        // 步骤3: 拆分无进展的需求
        // ==========================================
        debug!("步骤3: 拆分需求");
        state.unschedulable.clear();
        let horizon = ctx.horizon();
        let open_ids: Vec<String> = state
            .requests
            .values()
            .filter(|r| r.status.is_open())
            .map(|r| r.request_id.clone())
            .collect();
        for request_id in &open_ids {
            if state.has_progress(request_id) {
                continue;
            }
            let Some(request) = state.requests.get(request_id).cloned() else {
                continue;
            };
            state.batches.retain(|_, b| &b.request_id != request_id);
            match self.planner.decompose(&request, &self.catalog, &horizon)? {
                Decomposition::Planned(batches) => {
                    for b in batches {
                        state.batches.insert(b.batch_id.clone(), b);
                    }
                    self.set_status(state, request_id, DemandStatus::Decomposed);
                }
                Decomposition::Unschedulable(u) => {
                    state.unschedulable.push(u);
                    self.set_status(state, request_id, DemandStatus::Unschedulable);
                }
            }
        }

        // ==========================================
        // 步骤4: 排序并分配未分配批次
        // ==========================================
        debug!("步骤4: 分配批次");
        let open_requests: Vec<DemandRequest> = open_ids
            .iter()
            .filter_map(|id| state.requests.get(id).cloned())
            .collect();
        let sorted = self
            .sorter
            .sort(open_requests, self.config.policy.request_ordering);
        let queue: Vec<(DemandRequest, Vec<Batch>)> = sorted
            .into_iter()
            .map(|r| {
                let pending: Vec<Batch> = state
                    .batches_of(&r.request_id)
                    .into_iter()
                    .filter(|b| !state.assignments.contains_key(&b.batch_id))
                    .collect();
                (r, pending)
            })
            .filter(|(_, pending)| !pending.is_empty())
            .collect();

        let allocation = self.allocator.allocate(ctx, &queue)?;
        let committed = allocation.assignments.len();
        for a in allocation.assignments {
            state.assignments.insert(a.batch_id.clone(), a);
        }
        state.unschedulable.extend(allocation.unschedulable);
        let mut unschedulable_requests: Vec<String> = state
            .unschedulable
            .iter()
            .map(|u| u.request_id.clone())
            .collect();
        unschedulable_requests.sort();
        unschedulable_requests.dedup();

        // ==========================================
        // 步骤5: 更新需求状态
        // ==========================================
        for request_id in &open_ids {
            let status = if unschedulable_requests.contains(request_id) {
                DemandStatus::Unschedulable
            } else if state
                .batches_of(request_id)
                .iter()
                .all(|b| state.assignments.contains_key(&b.batch_id))
            {
                DemandStatus::Scheduled
            } else {
                DemandStatus::Decomposed
            };
            self.set_status(state, request_id, status);
        }

        Ok(CycleTally {
            kept: kept_count,
            invalidated: invalidated_count,
            committed,
            invalidated_requests: invalidated,
            unschedulable_requests,
        })
    }

    // ==========================================
    // 分配生命周期
    // ==========================================

    /// 开工: scheduled → in_progress
    pub fn start_batch(&self, batch_id: &str) -> EngineResult<ScheduleAssignment> {
        let mut state = self.lock_state()?;
        let assignment = state
            .assignments
            .get_mut(batch_id)
            .ok_or_else(|| EngineError::not_found("assignment", batch_id))?;
        if assignment.status != AssignmentStatus::Scheduled {
            let from = assignment.status;
            return Err(self.transition_error("assignment", batch_id, from, "in_progress"));
        }
        assignment.status = AssignmentStatus::InProgress;
        let out = assignment.clone();
        info!(batch_id, instrument_id = %out.instrument_id, operator_id = %out.operator_id, "批次开工");
        self.refresh_snapshot(&state)?;
        Ok(out)
    }

    /// 完工: in_progress → completed，批次销毁；全部批次完工时需求完成
    pub fn complete_batch(&self, batch_id: &str) -> EngineResult<ScheduleAssignment> {
        let mut state = self.lock_state()?;
        let current = state
            .assignments
            .get(batch_id)
            .map(|a| a.status)
            .ok_or_else(|| EngineError::not_found("assignment", batch_id))?;
        if current != AssignmentStatus::InProgress {
            return Err(self.transition_error("assignment", batch_id, current, "completed"));
        }

        let mut assignment = state
            .assignments
            .remove(batch_id)
            .ok_or_else(|| EngineError::not_found("assignment", batch_id))?;
        assignment.status = AssignmentStatus::Completed;
        state.ledger.release_batch(batch_id)?;
        state.batches.remove(batch_id);
        let request_id = assignment.request_id.clone();
        *state.completed.entry(request_id.clone()).or_insert(0) += 1;

        if state.batches_of(&request_id).is_empty() {
            self.set_status(&mut state, &request_id, DemandStatus::Completed);
            info!(request_id = %request_id, "需求全部批次完工");
        }
        info!(batch_id, "批次完工");
        self.refresh_snapshot(&state)?;
        Ok(assignment)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 最近一次提交的排程快照
    pub fn snapshot(&self) -> EngineResult<Arc<ScheduleSnapshot>> {
        Ok(self
            .snapshot
            .read()
            .map_err(|e| EngineError::LockError(e.to_string()))?
            .clone())
    }

    pub fn request(&self, request_id: &str) -> EngineResult<DemandRequest> {
        self.lock_state()?
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("request", request_id))
    }

    pub fn pending_event_count(&self) -> EngineResult<usize> {
        Ok(self
            .events
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?
            .len())
    }

    /// 基于最近快照的产能概览（不获取状态锁）
    pub fn capacity_overview(&self, now: NaiveDateTime) -> EngineResult<CapacityOverview> {
        let snapshot = self.snapshot()?;
        let calendar = self.calendar()?;
        let ctx = AnalysisContext {
            catalog: &self.catalog,
            roster: &self.roster,
            calendar: &calendar,
            config: &self.config,
            now,
        };
        self.analyzer.analyze(&ctx, &snapshot)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn lock_state(&self) -> EngineResult<MutexGuard<'_, SchedulerState>> {
        self.state
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))
    }

    /// 返回 (已应用, 被拒绝) 事件数；单个事件失败不影响其余事件
    fn apply_pending_events(&self) -> EngineResult<(usize, usize)> {
        let drained: Vec<ResourceEvent> = self
            .events
            .lock()
            .map_err(|e| EngineError::LockError(e.to_string()))?
            .drain(..)
            .collect();
        if drained.is_empty() {
            return Ok((0, 0));
        }

        let mut calendar = self
            .calendar
            .write()
            .map_err(|e| EngineError::LockError(e.to_string()))?;
        let mut applied = 0;
        let mut rejected = 0;
        for event in drained {
            match event.apply(&self.catalog, &self.roster, &mut calendar) {
                Ok(()) => applied += 1,
                Err(e @ (EngineError::LockError(_) | EngineError::Other(_))) => return Err(e),
                Err(e) => {
                    warn!(event_type = event.as_str(), error = %e, "资源事件应用失败，已丢弃");
                    rejected += 1;
                }
            }
        }
        info!(applied, rejected, "资源事件应用完成");
        Ok((applied, rejected))
    }

    fn set_status(&self, state: &mut SchedulerState, request_id: &str, status: DemandStatus) {
        if let Some(r) = state.requests.get_mut(request_id) {
            r.status = status;
        }
    }

    fn transition_error(
        &self,
        entity: &str,
        id: &str,
        from: impl std::fmt::Display,
        to: &str,
    ) -> EngineError {
        EngineError::InvalidTransition {
            entity: entity.to_string(),
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// 周期外的状态变更沿用上次周期的 ID 与时刻
    fn refresh_snapshot(&self, state: &SchedulerState) -> EngineResult<()> {
        let previous = self.snapshot()?;
        self.commit_snapshot(state, previous.cycle_id.clone(), previous.as_of)
    }

    fn commit_snapshot(
        &self,
        state: &SchedulerState,
        cycle_id: Option<String>,
        as_of: Option<NaiveDateTime>,
    ) -> EngineResult<()> {
        let mut assignments: Vec<ScheduleAssignment> =
            state.assignments.values().cloned().collect();
        assignments.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.batch_id.cmp(&b.batch_id)));

        let snapshot = ScheduleSnapshot {
            cycle_id,
            as_of,
            assignments,
            unschedulable: state.unschedulable.clone(),
            pending_batches: state
                .batches
                .values()
                .filter(|b| !state.assignments.contains_key(&b.batch_id))
                .cloned()
                .collect(),
            requests: state
                .requests
                .values()
                .filter(|r| r.status.is_open())
                .cloned()
                .collect(),
        };
        *self
            .snapshot
            .write()
            .map_err(|e| EngineError::LockError(e.to_string()))? = Arc::new(snapshot);
        Ok(())
    }

    fn publish(&self, event: PlanningEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.publisher.publish(event) {
            warn!(event_type = event_type.as_str(), error = %e, "周期事件发布失败");
        }
    }
}
