// ==========================================
// 实验室产能排程系统 - 资源目录
// ==========================================
// 职责: 方法 / 仪器 / 兼容规则 的登记与查询
// 红线: 所有变更写入只追加变更日志；方法更新产生新版本
// ==========================================

use crate::config::MAX_WINDOW_DAYS;
use crate::domain::mutation_log::MutationKind;
use crate::domain::resource::{CompatibilityRule, Instrument, Method, ResolvedRule};
use crate::domain::types::InstrumentStatus;
use crate::domain::window::TimeWindow;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{EntityStore, MutationLog};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// 单批次时长上限（分钟）：不超过最长排程窗口
pub const MAX_BATCH_DURATION_MIN: i64 = MAX_WINDOW_DAYS * 24 * 60;

// ==========================================
// CompatibleInstrument - 兼容仪器查询结果
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibleInstrument {
    pub instrument: Instrument,
    pub rule: ResolvedRule,
}

// ==========================================
// ResourceCatalog - 资源目录
// ==========================================
pub struct ResourceCatalog {
    methods: RwLock<EntityStore<Method>>,
    instruments: RwLock<EntityStore<Instrument>>,
    rules: RwLock<EntityStore<CompatibilityRule>>,
}

impl ResourceCatalog {
    pub fn new(log: Arc<MutationLog>) -> Self {
        Self {
            methods: RwLock::new(EntityStore::new(log.clone())),
            instruments: RwLock::new(EntityStore::new(log.clone())),
            rules: RwLock::new(EntityStore::new(log)),
        }
    }

    // ==========================================
    // 方法 (Method)
    // ==========================================

    /// 登记方法，返回版本号
    pub fn register_method(&self, method: Method) -> EngineResult<u32> {
        Self::validate_method(&method)?;
        let id = method.method_id.clone();
        let version = write(&self.methods)?.insert(method)?;
        info!(method_id = %id, version, "登记方法");
        Ok(version)
    }

    /// 更新方法（生成新版本，历史批次仍引用旧版本）
    pub fn update_method(&self, method: Method) -> EngineResult<u32> {
        Self::validate_method(&method)?;
        let id = method.method_id.clone();
        let version = write(&self.methods)?.update(method)?;
        info!(method_id = %id, version, "方法更新为新版本");
        Ok(version)
    }

    pub fn deactivate_method(&self, method_id: &str) -> EngineResult<u32> {
        let version = write(&self.methods)?.modify(method_id, MutationKind::Deactivate, |m| {
            m.active = false
        })?;
        info!(method_id, version, "停用方法");
        Ok(version)
    }

    pub fn method(&self, method_id: &str) -> EngineResult<Method> {
        read(&self.methods)?
            .get(method_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("method", method_id))
    }

    /// 当前生效版本号
    pub fn method_version(&self, method_id: &str) -> EngineResult<u32> {
        read(&self.methods)?
            .current_version(method_id)
            .ok_or_else(|| EngineError::not_found("method", method_id))
    }

    pub fn method_at_version(&self, method_id: &str, version: u32) -> EngineResult<Option<Method>> {
        Ok(read(&self.methods)?.get_version(method_id, version).cloned())
    }

    pub fn methods(&self) -> EngineResult<Vec<Method>> {
        Ok(read(&self.methods)?.values().cloned().collect())
    }

    // ==========================================
    // 仪器 (Instrument)
    // ==========================================

    pub fn register_instrument(&self, instrument: Instrument) -> EngineResult<u32> {
        Self::validate_instrument(&instrument)?;
        let id = instrument.instrument_id.clone();
        let version = write(&self.instruments)?.insert(instrument)?;
        info!(instrument_id = %id, "登记仪器");
        Ok(version)
    }

    pub fn update_instrument(&self, instrument: Instrument) -> EngineResult<u32> {
        Self::validate_instrument(&instrument)?;
        Ok(write(&self.instruments)?.update(instrument)?)
    }

    pub fn set_instrument_status(
        &self,
        instrument_id: &str,
        status: InstrumentStatus,
    ) -> EngineResult<u32> {
        let version = write(&self.instruments)?.modify(instrument_id, MutationKind::Update, |i| {
            i.status = status
        })?;
        info!(instrument_id, status = %status, "仪器状态变更");
        Ok(version)
    }

    pub fn add_downtime(&self, instrument_id: &str, window: TimeWindow) -> EngineResult<u32> {
        if window.is_empty() {
            return Err(EngineError::validation("downtime", "停机窗口为空"));
        }
        let version = write(&self.instruments)?.modify(instrument_id, MutationKind::Update, |i| {
            i.downtime.push(window);
            i.downtime.sort();
        })?;
        info!(instrument_id, start = %window.start, end = %window.end, "登记停机窗口");
        Ok(version)
    }

    pub fn set_calibration(
        &self,
        instrument_id: &str,
        calibration: Option<TimeWindow>,
    ) -> EngineResult<u32> {
        Ok(write(&self.instruments)?.modify(instrument_id, MutationKind::Update, |i| {
            i.calibration = calibration
        })?)
    }

    pub fn instrument(&self, instrument_id: &str) -> EngineResult<Instrument> {
        read(&self.instruments)?
            .get(instrument_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("instrument", instrument_id))
    }

    pub fn instruments(&self) -> EngineResult<Vec<Instrument>> {
        Ok(read(&self.instruments)?.values().cloned().collect())
    }

    // ==========================================
    // 兼容规则 (CompatibilityRule)
    // ==========================================

    /// 登记或更新兼容规则（方法与仪器必须已存在）
    pub fn register_rule(&self, rule: CompatibilityRule) -> EngineResult<u32> {
        if rule.batch_size == 0 {
            return Err(EngineError::validation("batch_size", "批量必须大于 0"));
        }
        // 批次时长恒大于 0
        if rule.run_time_per_sample_min <= 0 {
            return Err(EngineError::validation(
                "run_time_per_sample_min",
                "单样运行时间必须大于 0",
            ));
        }
        if rule.setup_min.is_some_and(|v| v < 0)
            || rule.cleanup_min.is_some_and(|v| v < 0)
        {
            return Err(EngineError::validation("setup_min", "准备/清洗时间不能为负"));
        }
        if !read(&self.methods)?.contains(&rule.method_id) {
            return Err(EngineError::not_found("method", &rule.method_id));
        }
        let full_batch_min = match read(&self.instruments)?.get(&rule.instrument_id) {
            Some(instrument) => ResolvedRule::resolve(&rule, instrument).full_batch_duration_min(),
            None => return Err(EngineError::not_found("instrument", &rule.instrument_id)),
        };
        if full_batch_min > MAX_BATCH_DURATION_MIN {
            return Err(EngineError::validation(
                "run_time_per_sample_min",
                format!("满批时长 {} 分钟超出上限 {}", full_batch_min, MAX_BATCH_DURATION_MIN),
            ));
        }
        debug!(method_id = %rule.method_id, instrument_id = %rule.instrument_id, "登记兼容规则");
        Ok(write(&self.rules)?.upsert(rule)?)
    }

    pub fn remove_rule(&self, method_id: &str, instrument_id: &str) -> EngineResult<()> {
        write(&self.rules)?.remove(&CompatibilityRule::key(method_id, instrument_id))?;
        info!(method_id, instrument_id, "删除兼容规则");
        Ok(())
    }

    /// 生效规则（规则或仪器不存在返回 None）
    pub fn rule(&self, method_id: &str, instrument_id: &str) -> EngineResult<Option<ResolvedRule>> {
        let rules = read(&self.rules)?;
        let Some(rule) = rules.get(&CompatibilityRule::key(method_id, instrument_id)) else {
            return Ok(None);
        };
        let instruments = read(&self.instruments)?;
        Ok(instruments
            .get(instrument_id)
            .map(|instrument| ResolvedRule::resolve(rule, instrument)))
    }

    /// 查询方法的兼容仪器
    ///
    /// 排序: 偏好仪器优先 → 满批时长升序 → 仪器ID升序
    ///
    /// # 错误
    /// - NotFound: 方法不存在
    pub fn query_compatible_instruments(
        &self,
        method_id: &str,
    ) -> EngineResult<Vec<CompatibleInstrument>> {
        if !read(&self.methods)?.contains(method_id) {
            return Err(EngineError::not_found("method", method_id));
        }

        let rules = read(&self.rules)?;
        let instruments = read(&self.instruments)?;

        let mut out = Vec::new();
        for rule in rules.values().filter(|r| r.method_id == method_id) {
            let instrument = instruments
                .get(&rule.instrument_id)
                .ok_or_else(|| EngineError::not_found("instrument", &rule.instrument_id))?;
            out.push(CompatibleInstrument {
                rule: ResolvedRule::resolve(rule, instrument),
                instrument: instrument.clone(),
            });
        }

        out.sort_by(|a, b| {
            b.rule
                .preferred
                .cmp(&a.rule.preferred)
                .then(
                    a.rule
                        .full_batch_duration_min()
                        .cmp(&b.rule.full_batch_duration_min()),
                )
                .then(a.instrument.instrument_id.cmp(&b.instrument.instrument_id))
        });
        Ok(out)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    fn validate_method(method: &Method) -> EngineResult<()> {
        if method.method_id.trim().is_empty() {
            return Err(EngineError::validation("method_id", "方法ID不能为空"));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&method.lead_time_days) {
            return Err(EngineError::validation(
                "lead_time_days",
                format!("前置天数必须在 [0, {}] 内", MAX_WINDOW_DAYS),
            ));
        }
        Ok(())
    }

    fn validate_instrument(instrument: &Instrument) -> EngineResult<()> {
        if instrument.instrument_id.trim().is_empty() {
            return Err(EngineError::validation("instrument_id", "仪器ID不能为空"));
        }
        if instrument.max_batch_size == 0 {
            return Err(EngineError::validation("max_batch_size", "最大批量必须大于 0"));
        }
        if instrument.setup_min < 0 || instrument.cleanup_min < 0 {
            return Err(EngineError::validation("setup_min", "准备/清洗时间不能为负"));
        }
        if instrument.setup_min.saturating_add(instrument.cleanup_min) > MAX_BATCH_DURATION_MIN {
            return Err(EngineError::validation(
                "setup_min",
                format!("准备+清洗时间超出上限 {} 分钟", MAX_BATCH_DURATION_MIN),
            ));
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
