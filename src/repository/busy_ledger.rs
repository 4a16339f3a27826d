// ==========================================
// 实验室产能排程系统 - 资源忙碌区间账本
// ==========================================
// 职责: 仪器 / 操作员 忙碌区间的登记与释放
// 结构: 固定车道数组，按资源ID索引，每条车道独立互斥锁
// 红线: 同一资源的区间永不重叠；双资源预留要么全部成功要么全部不写
// ==========================================

use crate::domain::window::TimeWindow;
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

// ==========================================
// BusyRecord - 忙碌记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyRecord {
    pub window: TimeWindow,
    pub batch_id: String,
}

// ==========================================
// LaneKind - 车道类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    Instrument,
    Operator,
}

// ==========================================
// ResourceLane - 单资源车道
// ==========================================
// records 按 window.start 升序
#[derive(Debug)]
pub struct ResourceLane {
    resource_id: String,
    records: Vec<BusyRecord>,
}

impl ResourceLane {
    fn new(resource_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            records: Vec::new(),
        }
    }

    fn conflict(&self, window: &TimeWindow) -> Option<&BusyRecord> {
        self.records.iter().find(|r| r.window.overlaps(window))
    }

    fn conflict_error(&self, window: &TimeWindow) -> Option<RepositoryError> {
        self.conflict(window)
            .map(|holder| RepositoryError::ResourceConflict {
                resource_id: self.resource_id.clone(),
                start: window.start,
                end: window.end,
                holder: holder.batch_id.clone(),
            })
    }

    fn insert(&mut self, window: TimeWindow, batch_id: &str) {
        let pos = self
            .records
            .partition_point(|r| r.window.start <= window.start);
        self.records.insert(
            pos,
            BusyRecord {
                window,
                batch_id: batch_id.to_string(),
            },
        );
    }

    fn release(&mut self, batch_id: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.batch_id != batch_id);
        before - self.records.len()
    }

    fn busy_within(&self, within: &TimeWindow) -> Vec<TimeWindow> {
        self.records
            .iter()
            .filter(|r| r.window.overlaps(within))
            .map(|r| r.window)
            .collect()
    }

    fn committed_min(&self) -> i64 {
        self.records.iter().map(|r| r.window.duration_min()).sum()
    }
}

// ==========================================
// WorkloadSource - 已承诺工作量来源
// ==========================================
// 用于操作员负载均衡排序
pub trait WorkloadSource {
    /// 操作员已承诺分钟数（未知操作员返回 0）
    fn committed_minutes(&self, operator_id: &str) -> i64;
}

// ==========================================
// BusyLedger - 忙碌区间账本
// ==========================================
#[derive(Debug)]
pub struct BusyLedger {
    instrument_index: HashMap<String, usize>,
    operator_index: HashMap<String, usize>,
    lanes: Vec<Mutex<ResourceLane>>,
}

impl BusyLedger {
    /// 按资源ID列表建立固定车道
    pub fn new<'a, I, O>(instrument_ids: I, operator_ids: O) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        O: IntoIterator<Item = &'a str>,
    {
        let mut lanes = Vec::new();
        let mut instrument_index = HashMap::new();
        let mut operator_index = HashMap::new();

        for id in instrument_ids {
            instrument_index.entry(id.to_string()).or_insert_with(|| {
                lanes.push(Mutex::new(ResourceLane::new(id)));
                lanes.len() - 1
            });
        }
        for id in operator_ids {
            operator_index.entry(id.to_string()).or_insert_with(|| {
                lanes.push(Mutex::new(ResourceLane::new(id)));
                lanes.len() - 1
            });
        }

        Self {
            instrument_index,
            operator_index,
            lanes,
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty(), std::iter::empty())
    }

    pub fn has_lane(&self, kind: LaneKind, resource_id: &str) -> bool {
        self.index(kind).contains_key(resource_id)
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 原子预留 仪器 + 操作员
    ///
    /// 加锁顺序固定为 仪器车道 → 操作员车道；任一冲突则不写入
    pub fn reserve(
        &self,
        instrument_id: &str,
        operator_id: &str,
        window: TimeWindow,
        batch_id: &str,
    ) -> RepositoryResult<()> {
        let mut instrument_lane = self.lock_lane(LaneKind::Instrument, instrument_id)?;
        let mut operator_lane = self.lock_lane(LaneKind::Operator, operator_id)?;

        if let Some(err) = instrument_lane.conflict_error(&window) {
            return Err(err);
        }
        if let Some(err) = operator_lane.conflict_error(&window) {
            return Err(err);
        }

        instrument_lane.insert(window, batch_id);
        operator_lane.insert(window, batch_id);
        Ok(())
    }

    /// 释放某批次在全部车道上的区间，返回释放条数
    pub fn release_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let mut released = 0;
        for lane in &self.lanes {
            let mut guard = lane
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            released += guard.release(batch_id);
        }
        Ok(released)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 与 within 相交的忙碌区间（按开始时间升序）
    pub fn busy_within(
        &self,
        kind: LaneKind,
        resource_id: &str,
        within: &TimeWindow,
    ) -> RepositoryResult<Vec<TimeWindow>> {
        Ok(self.lock_lane(kind, resource_id)?.busy_within(within))
    }

    /// 开始时间落在 within 内的批次数
    pub fn batches_starting_within(
        &self,
        kind: LaneKind,
        resource_id: &str,
        within: &TimeWindow,
    ) -> RepositoryResult<usize> {
        let lane = self.lock_lane(kind, resource_id)?;
        Ok(lane
            .records
            .iter()
            .filter(|r| within.contains_instant(r.window.start))
            .count())
    }

    pub fn records(&self, kind: LaneKind, resource_id: &str) -> RepositoryResult<Vec<BusyRecord>> {
        Ok(self.lock_lane(kind, resource_id)?.records.clone())
    }

    pub fn committed_min(&self, kind: LaneKind, resource_id: &str) -> RepositoryResult<i64> {
        Ok(self.lock_lane(kind, resource_id)?.committed_min())
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn index(&self, kind: LaneKind) -> &HashMap<String, usize> {
        match kind {
            LaneKind::Instrument => &self.instrument_index,
            LaneKind::Operator => &self.operator_index,
        }
    }

    fn lock_lane(
        &self,
        kind: LaneKind,
        resource_id: &str,
    ) -> RepositoryResult<MutexGuard<'_, ResourceLane>> {
        let idx = self.index(kind).get(resource_id).copied().ok_or_else(|| {
            let entity = match kind {
                LaneKind::Instrument => "instrument_lane",
                LaneKind::Operator => "operator_lane",
            };
            RepositoryError::not_found(entity, resource_id)
        })?;
        self.lanes
            .get(idx)
            .ok_or_else(|| RepositoryError::not_found("lane", resource_id))?
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl WorkloadSource for BusyLedger {
    fn committed_minutes(&self, operator_id: &str) -> i64 {
        self.committed_min(LaneKind::Operator, operator_id)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;
    use std::thread;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ledger() -> BusyLedger {
        BusyLedger::new(["HPLC-01", "HPLC-02"], ["OP-A", "OP-B"])
    }

    #[test]
    fn test_reserve_rejects_overlap_on_either_lane() {
        let ledger = ledger();
        let w = TimeWindow::new(at(8, 0), at(10, 0));
        ledger.reserve("HPLC-01", "OP-A", w, "R1-B1").unwrap();

        // 仪器冲突
        let err = ledger
            .reserve("HPLC-01", "OP-B", TimeWindow::new(at(9, 0), at(11, 0)), "R2-B1")
            .unwrap_err();
        assert!(err.is_conflict());

        // 操作员冲突，且不留下半预留
        let err = ledger
            .reserve("HPLC-02", "OP-A", TimeWindow::new(at(9, 0), at(11, 0)), "R3-B1")
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(ledger
            .records(LaneKind::Instrument, "HPLC-02")
            .unwrap()
            .is_empty());

        // 首尾相接允许
        ledger
            .reserve("HPLC-01", "OP-A", TimeWindow::new(at(10, 0), at(11, 0)), "R4-B1")
            .unwrap();
        assert_eq!(ledger.committed_minutes("OP-A"), 180);
    }

    #[test]
    fn test_release_batch_frees_both_lanes() {
        let ledger = ledger();
        let w = TimeWindow::new(at(8, 0), at(10, 0));
        ledger.reserve("HPLC-01", "OP-A", w, "R1-B1").unwrap();
        assert_eq!(ledger.release_batch("R1-B1").unwrap(), 2);
        ledger.reserve("HPLC-01", "OP-B", w, "R2-B1").unwrap();
    }

    #[test]
    fn test_unknown_lane_is_not_found() {
        let ledger = ledger();
        let w = TimeWindow::new(at(8, 0), at(10, 0));
        let err = ledger.reserve("NMR-01", "OP-A", w, "R1-B1").unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_concurrent_reservations_never_overlap() {
        let ledger = Arc::new(ledger());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                thread::spawn(move || {
                    let op = if i % 2 == 0 { "OP-A" } else { "OP-B" };
                    let w = TimeWindow::new(at(8, 0), at(9, 0));
                    ledger.reserve("HPLC-01", op, w, &format!("R{}-B1", i)).is_ok()
                })
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(ok, 1);
        assert_eq!(ledger.records(LaneKind::Instrument, "HPLC-01").unwrap().len(), 1);
    }
}
