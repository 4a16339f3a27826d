// ==========================================
// 实验室产能排程系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::planning_config::{
    OvertimePrecedence, PlanningConfig, RequestOrdering, MAX_WINDOW_DAYS,
};
use crate::config::planning_config_trait::PlanningConfigReader;
use crate::db::{configure_sqlite_connection, init_config_schema, open_sqlite_connection};
use crate::domain::types::ProficiencyLevel;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（配置表不存在时自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_config_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(format!("锁获取失败: {}", e)))?;
            configure_sqlite_connection(&conn_guard)?;
            init_config_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 内存库（测试 / 场景运行）
    pub fn in_memory() -> ConfigResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(format!("锁获取失败: {}", e)))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 解析数值配置；缺失取默认，格式错误告警后取默认
    fn parse_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        "配置值格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }

    /// 解析枚举配置
    fn parse_enum_or_default<T, F>(&self, key: &str, default: T, parse: F) -> ConfigResult<T>
    where
        F: Fn(&str) -> Option<T>,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => Ok(parse(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    "配置枚举值无法识别，使用默认值"
                );
                default
            })),
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 在排程周期报告中记录生效配置
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// PlanningConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PlanningConfigReader for ConfigManager {
    // ===== 排程窗口 =====

    async fn get_horizon_days(&self) -> ConfigResult<i64> {
        let days = self.parse_or_default(config_keys::HORIZON_DAYS, PlanningConfig::default().horizon_days)?;
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            tracing::warn!(config_key = config_keys::HORIZON_DAYS, days, max = MAX_WINDOW_DAYS, "排程窗口超出 [1, 上限]，使用默认值");
            return Ok(PlanningConfig::default().horizon_days);
        }
        Ok(days)
    }

    async fn get_calendar_search_limit_days(&self) -> ConfigResult<i64> {
        self.parse_or_default(
            config_keys::CALENDAR_SEARCH_LIMIT_DAYS,
            PlanningConfig::default().calendar_search_limit_days,
        )
    }

    // ===== 资格与加班 =====

    async fn get_min_proficiency(&self) -> ConfigResult<ProficiencyLevel> {
        self.parse_enum_or_default(
            config_keys::MIN_PROFICIENCY,
            PlanningConfig::default().min_proficiency,
            ProficiencyLevel::parse,
        )
    }

    async fn get_overtime_extension_minutes(&self) -> ConfigResult<i64> {
        let minutes = self.parse_or_default(
            config_keys::OVERTIME_EXTENSION_MINUTES,
            PlanningConfig::default().overtime_extension_minutes,
        )?;
        Ok(minutes.max(0))
    }

    async fn get_max_reservation_rounds(&self) -> ConfigResult<u32> {
        let rounds = self.parse_or_default(
            config_keys::MAX_RESERVATION_ROUNDS,
            PlanningConfig::default().max_reservation_rounds,
        )?;
        Ok(rounds.max(1))
    }

    // ===== 产能分析 =====

    async fn get_operating_hours_per_day(&self) -> ConfigResult<f64> {
        let hours = self.parse_or_default(
            config_keys::OPERATING_HOURS_PER_DAY,
            PlanningConfig::default().operating_hours_per_day,
        )?;
        if !(hours > 0.0 && hours <= 24.0) {
            tracing::warn!(config_key = config_keys::OPERATING_HOURS_PER_DAY, hours, "日运行小时超出 (0, 24]，使用默认值");
            return Ok(PlanningConfig::default().operating_hours_per_day);
        }
        Ok(hours)
    }

    async fn get_analysis_window_days(&self) -> ConfigResult<i64> {
        let days = self.parse_or_default(
            config_keys::ANALYSIS_WINDOW_DAYS,
            PlanningConfig::default().analysis_window_days,
        )?;
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            tracing::warn!(config_key = config_keys::ANALYSIS_WINDOW_DAYS, days, max = MAX_WINDOW_DAYS, "分析窗口超出 [1, 上限]，使用默认值");
            return Ok(PlanningConfig::default().analysis_window_days);
        }
        Ok(days)
    }

    async fn get_saturation_threshold(&self) -> ConfigResult<f64> {
        self.parse_or_default(
            config_keys::SATURATION_THRESHOLD,
            PlanningConfig::default().saturation_threshold,
        )
    }

    async fn get_balance_tolerance(&self) -> ConfigResult<f64> {
        self.parse_or_default(
            config_keys::BALANCE_TOLERANCE,
            PlanningConfig::default().balance_tolerance,
        )
    }

    // ===== 策略 =====

    async fn get_request_ordering(&self) -> ConfigResult<RequestOrdering> {
        self.parse_enum_or_default(
            config_keys::REQUEST_ORDERING,
            RequestOrdering::default(),
            RequestOrdering::parse,
        )
    }

    async fn get_overtime_precedence(&self) -> ConfigResult<OvertimePrecedence> {
        self.parse_enum_or_default(
            config_keys::OVERTIME_PRECEDENCE,
            OvertimePrecedence::default(),
            OvertimePrecedence::parse,
        )
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 排程窗口
    pub const HORIZON_DAYS: &str = "planning_horizon_days";
    pub const CALENDAR_SEARCH_LIMIT_DAYS: &str = "calendar_search_limit_days";

    // 资格与加班
    pub const MIN_PROFICIENCY: &str = "min_proficiency_level";
    pub const OVERTIME_EXTENSION_MINUTES: &str = "overtime_extension_minutes";
    pub const MAX_RESERVATION_ROUNDS: &str = "max_reservation_rounds";

    // 产能分析
    pub const OPERATING_HOURS_PER_DAY: &str = "operating_hours_per_day";
    pub const ANALYSIS_WINDOW_DAYS: &str = "analysis_window_days";
    pub const SATURATION_THRESHOLD: &str = "saturation_threshold";
    pub const BALANCE_TOLERANCE: &str = "bottleneck_balance_tolerance";

    // 策略
    pub const REQUEST_ORDERING: &str = "request_ordering";
    pub const OVERTIME_PRECEDENCE: &str = "overtime_precedence";
}
