// ==========================================
// 实验室产能排程系统 - 版本化实体仓储
// ==========================================
// 职责: 每类资源一个实体仓储 + 全局只追加变更日志
// 红线: 更新产生新版本，历史版本永不覆盖
// ==========================================

use crate::domain::mutation_log::{EntityKind, MutationKind, MutationRecord};
use crate::domain::personnel::{Operator, ProficiencyRecord};
use crate::domain::resource::{CompatibilityRule, Instrument, Method};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

// ==========================================
// StoredEntity - 可入库实体
// ==========================================
pub trait StoredEntity: Clone + Serialize {
    const KIND: EntityKind;

    /// 仓储主键
    fn entity_key(&self) -> String;
}

impl StoredEntity for Method {
    const KIND: EntityKind = EntityKind::Method;
    fn entity_key(&self) -> String {
        self.method_id.clone()
    }
}

impl StoredEntity for Instrument {
    const KIND: EntityKind = EntityKind::Instrument;
    fn entity_key(&self) -> String {
        self.instrument_id.clone()
    }
}

impl StoredEntity for CompatibilityRule {
    const KIND: EntityKind = EntityKind::CompatibilityRule;
    fn entity_key(&self) -> String {
        CompatibilityRule::key(&self.method_id, &self.instrument_id)
    }
}

impl StoredEntity for Operator {
    const KIND: EntityKind = EntityKind::Operator;
    fn entity_key(&self) -> String {
        self.operator_id.clone()
    }
}

impl StoredEntity for ProficiencyRecord {
    const KIND: EntityKind = EntityKind::Proficiency;
    fn entity_key(&self) -> String {
        ProficiencyRecord::key(&self.operator_id, &self.method_id)
    }
}

// ==========================================
// MutationLog - 只追加变更日志
// ==========================================
#[derive(Debug, Default)]
pub struct MutationLog {
    entries: Mutex<Vec<MutationRecord>>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_entries(&self) -> RepositoryResult<MutexGuard<'_, Vec<MutationRecord>>> {
        self.entries
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条变更，返回日志序号
    pub fn append<P: Serialize>(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        version: u32,
        kind: MutationKind,
        payload: &P,
    ) -> RepositoryResult<u64> {
        let payload = serde_json::to_value(payload)?;
        let mut entries = self.get_entries()?;
        let seq = entries.len() as u64 + 1;
        entries.push(MutationRecord {
            seq,
            mutation_id: Uuid::new_v4(),
            entity_kind,
            entity_id: entity_id.to_string(),
            version,
            kind,
            payload,
            recorded_at: Utc::now(),
        });
        Ok(seq)
    }

    pub fn len(&self) -> RepositoryResult<usize> {
        Ok(self.get_entries()?.len())
    }

    pub fn is_empty(&self) -> RepositoryResult<bool> {
        Ok(self.get_entries()?.is_empty())
    }

    /// 日志快照（按序号）
    pub fn entries(&self) -> RepositoryResult<Vec<MutationRecord>> {
        Ok(self.get_entries()?.clone())
    }

    /// 某实体的全部变更
    pub fn entries_for(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
    ) -> RepositoryResult<Vec<MutationRecord>> {
        Ok(self
            .get_entries()?
            .iter()
            .filter(|r| r.entity_kind == entity_kind && r.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

// ==========================================
// Versioned - 版本化记录
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u32, // 1 起
    pub value: T,
}

// ==========================================
// EntityStore - 单类实体仓储
// ==========================================
// 非线程安全，由上层服务加锁
#[derive(Debug)]
pub struct EntityStore<T: StoredEntity> {
    versions: BTreeMap<String, Vec<Versioned<T>>>,
    removed: BTreeSet<String>,
    log: Arc<MutationLog>,
}

impl<T: StoredEntity> EntityStore<T> {
    pub fn new(log: Arc<MutationLog>) -> Self {
        Self {
            versions: BTreeMap::new(),
            removed: BTreeSet::new(),
            log,
        }
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 首次登记（已存在则返回 Duplicate）
    pub fn insert(&mut self, value: T) -> RepositoryResult<u32> {
        let id = value.entity_key();
        if self.contains(&id) {
            return Err(RepositoryError::Duplicate {
                entity: T::KIND.to_string(),
                id,
            });
        }
        self.push_version(id, value, MutationKind::Register)
    }

    /// 更新为新版本（不存在则返回 NotFound）
    pub fn update(&mut self, value: T) -> RepositoryResult<u32> {
        let id = value.entity_key();
        if !self.contains(&id) {
            return Err(RepositoryError::not_found(&T::KIND.to_string(), &id));
        }
        self.push_version(id, value, MutationKind::Update)
    }

    /// 登记或更新
    pub fn upsert(&mut self, value: T) -> RepositoryResult<u32> {
        let id = value.entity_key();
        if self.contains(&id) {
            self.push_version(id, value, MutationKind::Update)
        } else {
            self.push_version(id, value, MutationKind::Register)
        }
    }

    /// 以当前值为基础修改并生成新版本
    pub fn modify<F>(&mut self, id: &str, kind: MutationKind, f: F) -> RepositoryResult<u32>
    where
        F: FnOnce(&mut T),
    {
        let mut value = self
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(&T::KIND.to_string(), id))?;
        f(&mut value);
        self.push_version(id.to_string(), value, kind)
    }

    /// 删除（历史版本保留）
    pub fn remove(&mut self, id: &str) -> RepositoryResult<T> {
        let current = self
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(&T::KIND.to_string(), id))?;
        let version = self.current_version(id).unwrap_or(0);
        self.log
            .append(T::KIND, id, version, MutationKind::Remove, &current)?;
        self.removed.insert(id.to_string());
        Ok(current)
    }

    fn push_version(&mut self, id: String, value: T, kind: MutationKind) -> RepositoryResult<u32> {
        let history = self.versions.entry(id.clone()).or_default();
        let version = history.last().map(|v| v.version + 1).unwrap_or(1);
        self.log.append(T::KIND, &id, version, kind, &value)?;
        history.push(Versioned { version, value });
        self.removed.remove(&id);
        Ok(version)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn contains(&self, id: &str) -> bool {
        self.versions.contains_key(id) && !self.removed.contains(id)
    }

    /// 当前生效值
    pub fn get(&self, id: &str) -> Option<&T> {
        if self.removed.contains(id) {
            return None;
        }
        self.versions
            .get(id)
            .and_then(|h| h.last())
            .map(|v| &v.value)
    }

    pub fn current_version(&self, id: &str) -> Option<u32> {
        self.versions.get(id).and_then(|h| h.last()).map(|v| v.version)
    }

    /// 指定历史版本（已删除实体仍可回溯）
    pub fn get_version(&self, id: &str, version: u32) -> Option<&T> {
        self.versions
            .get(id)?
            .iter()
            .find(|v| v.version == version)
            .map(|v| &v.value)
    }

    pub fn history(&self, id: &str) -> &[Versioned<T>] {
        self.versions.get(id).map(|h| h.as_slice()).unwrap_or(&[])
    }

    /// 全部当前值，按主键排序
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.versions
            .iter()
            .filter(|(id, _)| !self.removed.contains(*id))
            .filter_map(|(_, h)| h.last().map(|v| &v.value))
    }

    pub fn len(&self) -> usize {
        self.versions.len() - self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn log(&self) -> &Arc<MutationLog> {
        &self.log
    }
}
