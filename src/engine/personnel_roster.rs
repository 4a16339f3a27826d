// ==========================================
// 实验室产能排程系统 - 人员名册
// ==========================================
// 职责: 操作员 / 熟练度记录 / 请假 / 加班批准
// 红线: 无熟练度记录的操作员永远不具备方法资格
// ==========================================

use crate::domain::mutation_log::MutationKind;
use crate::domain::personnel::{LeaveInterval, Operator, ProficiencyRecord};
use crate::domain::types::ProficiencyLevel;
use crate::domain::window::TimeWindow;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{EntityStore, MutationLog, WorkloadSource};
use chrono::{Duration, NaiveDate};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

// ==========================================
// QualifiedOperator - 合格操作员查询结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedOperator {
    pub operator: Operator,
    pub level: ProficiencyLevel,
    pub certified_on: NaiveDate,
    pub workload_min: i64, // 已承诺分钟数
}

// ==========================================
// PersonnelRoster - 人员名册
// ==========================================
pub struct PersonnelRoster {
    operators: RwLock<EntityStore<Operator>>,
    proficiencies: RwLock<EntityStore<ProficiencyRecord>>,
}

impl PersonnelRoster {
    pub fn new(log: Arc<MutationLog>) -> Self {
        Self {
            operators: RwLock::new(EntityStore::new(log.clone())),
            proficiencies: RwLock::new(EntityStore::new(log)),
        }
    }

    // ==========================================
    // 操作员
    // ==========================================

    pub fn register_operator(&self, operator: Operator) -> EngineResult<u32> {
        Self::validate_operator(&operator)?;
        let id = operator.operator_id.clone();
        let version = write(&self.operators)?.insert(operator)?;
        info!(operator_id = %id, "登记操作员");
        Ok(version)
    }

    pub fn update_operator(&self, operator: Operator) -> EngineResult<u32> {
        Self::validate_operator(&operator)?;
        Ok(write(&self.operators)?.update(operator)?)
    }

    /// 整体替换请假区间
    pub fn set_leave(&self, operator_id: &str, leave: Vec<LeaveInterval>) -> EngineResult<u32> {
        for l in &leave {
            Self::validate_leave(l)?;
        }
        Ok(write(&self.operators)?.modify(operator_id, MutationKind::Update, |o| {
            o.leave = leave
        })?)
    }

    pub fn add_leave(&self, operator_id: &str, leave: LeaveInterval) -> EngineResult<u32> {
        Self::validate_leave(&leave)?;
        info!(
            operator_id,
            start = %leave.start_date,
            end = %leave.end_date,
            "登记请假"
        );
        Ok(write(&self.operators)?.modify(operator_id, MutationKind::Update, |o| {
            o.leave.push(leave);
            o.leave.sort_by_key(|l| (l.start_date, l.end_date));
        })?)
    }

    pub fn set_overtime_approval(&self, operator_id: &str, approved: bool) -> EngineResult<u32> {
        info!(operator_id, approved, "加班批准状态变更");
        Ok(write(&self.operators)?.modify(operator_id, MutationKind::Update, |o| {
            o.overtime_approved = approved
        })?)
    }

    pub fn deactivate_operator(&self, operator_id: &str) -> EngineResult<u32> {
        info!(operator_id, "停用操作员");
        Ok(write(&self.operators)?.modify(operator_id, MutationKind::Deactivate, |o| {
            o.active = false
        })?)
    }

    pub fn operator(&self, operator_id: &str) -> EngineResult<Operator> {
        read(&self.operators)?
            .get(operator_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("operator", operator_id))
    }

    pub fn operators(&self) -> EngineResult<Vec<Operator>> {
        Ok(read(&self.operators)?.values().cloned().collect())
    }

    // ==========================================
    // 熟练度
    // ==========================================

    /// 登记或更新熟练度记录（操作员必须已存在）
    pub fn upsert_proficiency(&self, record: ProficiencyRecord) -> EngineResult<u32> {
        if !read(&self.operators)?.contains(&record.operator_id) {
            return Err(EngineError::not_found("operator", &record.operator_id));
        }
        info!(
            operator_id = %record.operator_id,
            method_id = %record.method_id,
            level = %record.level,
            "登记熟练度"
        );
        Ok(write(&self.proficiencies)?.upsert(record)?)
    }

    pub fn proficiency(
        &self,
        operator_id: &str,
        method_id: &str,
    ) -> EngineResult<Option<ProficiencyRecord>> {
        Ok(read(&self.proficiencies)?
            .get(&ProficiencyRecord::key(operator_id, method_id))
            .cloned())
    }

    /// 指定日期的有效熟练等级（未认证 / 低于门槛返回 None）
    pub fn qualified_level(
        &self,
        operator_id: &str,
        method_id: &str,
        on: NaiveDate,
        min_level: ProficiencyLevel,
    ) -> EngineResult<Option<ProficiencyLevel>> {
        Ok(self
            .proficiency(operator_id, method_id)?
            .filter(|r| r.effective_on(on) && r.level >= min_level)
            .map(|r| r.level))
    }

    /// 方法的已认证操作员（不看班次/请假，用于产能分析）
    pub fn certified_operators(
        &self,
        method_id: &str,
        on: NaiveDate,
        min_level: ProficiencyLevel,
    ) -> EngineResult<Vec<(Operator, ProficiencyRecord)>> {
        let operators = read(&self.operators)?;
        let proficiencies = read(&self.proficiencies)?;

        Ok(operators
            .values()
            .filter(|o| o.active)
            .filter_map(|o| {
                proficiencies
                    .get(&ProficiencyRecord::key(&o.operator_id, method_id))
                    .filter(|r| r.effective_on(on) && r.level >= min_level)
                    .map(|r| (o.clone(), r.clone()))
            })
            .collect())
    }

    /// 查询合格操作员
    ///
    /// 条件: 在岗 + 熟练度在窗口结束前生效且 ≥ min_level + 某个班次与 window 相交且当日未请假
    /// 排序: 熟练度降序 → 已承诺工作量升序 → 操作员ID升序
    ///
    /// 窗口内才生效的记录也返回，调用方按 certified_on 逐日判断
    pub fn query_qualified_operators(
        &self,
        method_id: &str,
        window: &TimeWindow,
        min_level: ProficiencyLevel,
        workload: &dyn WorkloadSource,
    ) -> EngineResult<Vec<QualifiedOperator>> {
        let last_instant = (window.end - Duration::minutes(1)).max(window.start);
        let certified = self.certified_operators(method_id, last_instant.date(), min_level)?;

        let mut out: Vec<QualifiedOperator> = certified
            .into_iter()
            .filter(|(o, r)| Self::shift_overlaps(o, r.certified_on, window))
            .map(|(operator, record)| QualifiedOperator {
                workload_min: workload.committed_minutes(&operator.operator_id),
                operator,
                level: record.level,
                certified_on: record.certified_on,
            })
            .collect();

        out.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(a.workload_min.cmp(&b.workload_min))
                .then(a.operator.operator_id.cmp(&b.operator.operator_id))
        });
        Ok(out)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 窗口内是否存在认证生效且未请假的班次
    fn shift_overlaps(operator: &Operator, certified_on: NaiveDate, window: &TimeWindow) -> bool {
        // 跨零点班次可能始于前一天
        let mut day = (window.start.date() - Duration::days(1)).max(certified_on);
        let last = window.end.date();
        while day <= last {
            if !operator.on_leave(day) && operator.shift.occurrence(day).overlaps(window) {
                return true;
            }
            day += Duration::days(1);
        }
        false
    }

    fn validate_operator(operator: &Operator) -> EngineResult<()> {
        if operator.operator_id.trim().is_empty() {
            return Err(EngineError::validation("operator_id", "操作员ID不能为空"));
        }
        if operator.max_concurrent_batches == 0 {
            return Err(EngineError::validation(
                "max_concurrent_batches",
                "每日批次上限必须大于 0",
            ));
        }
        if operator.shift.start == operator.shift.end {
            return Err(EngineError::validation("shift", "班次开始与结束不能相同"));
        }
        for l in &operator.leave {
            Self::validate_leave(l)?;
        }
        Ok(())
    }

    fn validate_leave(leave: &LeaveInterval) -> EngineResult<()> {
        if leave.end_date < leave.start_date {
            return Err(EngineError::validation("leave", "请假结束日期早于开始日期"));
        }
        Ok(())
    }
}

fn read<T>(lock: &RwLock<T>) -> EngineResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| EngineError::LockError(e.to_string()))
}

fn write<T>(lock: &RwLock<T>) -> EngineResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| EngineError::LockError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::personnel::ShiftWindow;
    use crate::domain::types::LeaveKind;
    use std::collections::HashMap;

    struct FixedWorkload(HashMap<String, i64>);

    impl FixedWorkload {
        fn empty() -> Self {
            Self(HashMap::new())
        }
    }

    impl WorkloadSource for FixedWorkload {
        fn committed_minutes(&self, operator_id: &str) -> i64 {
            self.0.get(operator_id).copied().unwrap_or(0)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn window(d: u32, h1: u32, h2: u32) -> TimeWindow {
        TimeWindow::new(
            day(d).and_hms_opt(h1, 0, 0).unwrap(),
            day(d).and_hms_opt(h2, 0, 0).unwrap(),
        )
    }

    fn operator(id: &str) -> Operator {
        Operator {
            operator_id: id.to_string(),
            name: id.to_string(),
            shift: ShiftWindow::standard(),
            max_concurrent_batches: 3,
            overtime_approved: false,
            active: true,
            leave: vec![],
        }
    }

    fn record(op: &str, level: ProficiencyLevel, certified: NaiveDate) -> ProficiencyRecord {
        ProficiencyRecord {
            operator_id: op.to_string(),
            method_id: "HPLC-001".to_string(),
            level,
            certified_on: certified,
        }
    }

    fn roster() -> PersonnelRoster {
        let roster = PersonnelRoster::new(Arc::new(MutationLog::new()));
        for id in ["OP-A", "OP-B", "OP-C", "OP-D"] {
            roster.register_operator(operator(id)).unwrap();
        }
        roster
            .upsert_proficiency(record("OP-A", ProficiencyLevel::Intermediate, day(1)))
            .unwrap();
        roster
            .upsert_proficiency(record("OP-B", ProficiencyLevel::Expert, day(1)))
            .unwrap();
        roster
            .upsert_proficiency(record("OP-C", ProficiencyLevel::Intermediate, day(1)))
            .unwrap();
        roster
    }

    #[test]
    fn test_ordering_by_level_then_workload() {
        let roster = roster();
        let workload = FixedWorkload(HashMap::from([
            ("OP-A".to_string(), 300),
            ("OP-C".to_string(), 60),
        ]));
        let ids: Vec<String> = roster
            .query_qualified_operators(
                "HPLC-001",
                &window(5, 9, 11),
                ProficiencyLevel::Beginner,
                &workload,
            )
            .unwrap()
            .into_iter()
            .map(|q| q.operator.operator_id)
            .collect();
        // OP-D 无记录
        assert_eq!(ids, vec!["OP-B", "OP-C", "OP-A"]);
    }

    #[test]
    fn test_min_level_and_certification_date() {
        let roster = roster();
        roster
            .upsert_proficiency(record("OP-D", ProficiencyLevel::Expert, day(10)))
            .unwrap();

        let experts = roster
            .query_qualified_operators(
                "HPLC-001",
                &window(5, 9, 11),
                ProficiencyLevel::Expert,
                &FixedWorkload::empty(),
            )
            .unwrap();
        // OP-D 认证日期在窗口之后
        assert_eq!(experts.len(), 1);
        assert_eq!(experts[0].operator.operator_id, "OP-B");

        let later = roster
            .query_qualified_operators(
                "HPLC-001",
                &window(12, 9, 11),
                ProficiencyLevel::Expert,
                &FixedWorkload::empty(),
            )
            .unwrap();
        assert_eq!(later.len(), 2);
    }

    #[test]
    fn test_leave_and_shift_filtering() {
        let roster = roster();
        roster
            .add_leave(
                "OP-B",
                LeaveInterval::new(day(5), day(6), LeaveKind::Training),
            )
            .unwrap();
        roster.deactivate_operator("OP-C").unwrap();

        let q = roster
            .query_qualified_operators(
                "HPLC-001",
                &window(5, 9, 11),
                ProficiencyLevel::Beginner,
                &FixedWorkload::empty(),
            )
            .unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].operator.operator_id, "OP-A");

        // 班次外
        let night = roster
            .query_qualified_operators(
                "HPLC-001",
                &window(7, 19, 21),
                ProficiencyLevel::Beginner,
                &FixedWorkload::empty(),
            )
            .unwrap();
        assert!(night.is_empty());
    }

    #[test]
    fn test_proficiency_requires_known_operator() {
        let roster = roster();
        let err = roster
            .upsert_proficiency(record("OP-Z", ProficiencyLevel::Expert, day(1)))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
