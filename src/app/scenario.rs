// ==========================================
// 实验室产能排程系统 - 场景运行器
// ==========================================
// 输入: JSON 场景（资源目录 / 人员 / 日历 / 需求 / 事件 / 时刻）
// 流程:
// 1. 写入配置覆写 → 读取排程参数
// 2. 登记方法 / 仪器 / 规则 / 操作员 / 熟练度
// 3. 受理需求 → 首个周期
// 4. 若有资源事件: 入队 → 重排周期
// 5. 输出分配 / 无法排程 / 产能概览
// ==========================================

use crate::app::state::AppState;
use crate::config::ConfigManager;
use crate::domain::calendar::CalendarConfig;
use crate::domain::capacity::CapacityOverview;
use crate::domain::demand::DemandRequest;
use crate::domain::personnel::{Operator, ProficiencyRecord};
use crate::domain::resource::{CompatibilityRule, Instrument, Method};
use crate::domain::schedule::{ScheduleAssignment, UnschedulableBatch};
use crate::engine::{LabScheduler, PlanningCycleReport, ResourceEvent};
use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// Scenario - 场景输入
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub now: NaiveDateTime,
    /// config_kv 覆写（key → value）
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub instruments: Vec<Instrument>,
    #[serde(default)]
    pub rules: Vec<CompatibilityRule>,
    #[serde(default)]
    pub operators: Vec<Operator>,
    #[serde(default)]
    pub proficiencies: Vec<ProficiencyRecord>,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub demands: Vec<DemandRequest>,
    /// 首个周期后到达的资源事件
    #[serde(default)]
    pub events: Vec<ResourceEvent>,
    /// 重排周期时刻（缺省同 now）
    #[serde(default)]
    pub replan_at: Option<NaiveDateTime>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取场景文件: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("场景文件格式错误: {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ==========================================
// ScenarioOutput - 场景输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedDemand {
    pub request_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub cycles: Vec<PlanningCycleReport>,
    pub rejected_demands: Vec<RejectedDemand>,
    pub assignments: Vec<ScheduleAssignment>,
    pub unschedulable: Vec<UnschedulableBatch>,
    pub capacity_overview: CapacityOverview,
}

// ==========================================
// ScenarioRunner
// ==========================================
pub struct ScenarioRunner {
    config_manager: Arc<ConfigManager>,
}

impl ScenarioRunner {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(ConfigManager::in_memory()?)))
    }

    pub async fn run(&self, scenario: Scenario) -> anyhow::Result<ScenarioOutput> {
        for (key, value) in &scenario.config {
            self.config_manager
                .set_global_config_value(key, value)
                .with_context(|| format!("写入配置失败: {}", key))?;
        }
        let state = AppState::from_config_manager(
            ":memory:",
            self.config_manager.clone(),
            scenario.calendar.clone(),
        )
        .await?;
        let scheduler = state.scheduler.as_ref();

        self.register_resources(scheduler, &scenario)?;

        let mut rejected_demands = Vec::new();
        for demand in scenario.demands {
            let request_id = demand.request_id.clone();
            if let Err(e) = scheduler.submit(demand) {
                warn!(request_id = %request_id, error = %e, "场景需求被拒绝");
                rejected_demands.push(RejectedDemand {
                    request_id,
                    reason: e.to_string(),
                });
            }
        }

        let mut cycles = vec![scheduler.run_cycle(scenario.now)?];
        let mut as_of = scenario.now;
        if !scenario.events.is_empty() {
            for event in scenario.events {
                scheduler.enqueue_event(event)?;
            }
            as_of = scenario.replan_at.unwrap_or(scenario.now);
            cycles.push(scheduler.run_cycle(as_of)?);
        }

        let snapshot = scheduler.snapshot()?;
        let capacity_overview = scheduler.capacity_overview(as_of)?;
        info!(
            cycles = cycles.len(),
            assignments = snapshot.assignments.len(),
            unschedulable = snapshot.unschedulable.len(),
            "场景运行完成"
        );

        Ok(ScenarioOutput {
            cycles,
            rejected_demands,
            assignments: snapshot.assignments.clone(),
            unschedulable: snapshot.unschedulable.clone(),
            capacity_overview,
        })
    }

    fn register_resources(&self, scheduler: &LabScheduler, scenario: &Scenario) -> anyhow::Result<()> {
        let catalog = scheduler.catalog();
        let roster = scheduler.roster();
        for m in &scenario.methods {
            catalog
                .register_method(m.clone())
                .with_context(|| format!("登记方法失败: {}", m.method_id))?;
        }
        for i in &scenario.instruments {
            catalog
                .register_instrument(i.clone())
                .with_context(|| format!("登记仪器失败: {}", i.instrument_id))?;
        }
        for r in &scenario.rules {
            catalog.register_rule(r.clone()).with_context(|| {
                format!("登记兼容规则失败: {} / {}", r.method_id, r.instrument_id)
            })?;
        }
        for o in &scenario.operators {
            roster
                .register_operator(o.clone())
                .with_context(|| format!("登记操作员失败: {}", o.operator_id))?;
        }
        for p in &scenario.proficiencies {
            roster.upsert_proficiency(p.clone()).with_context(|| {
                format!("登记熟练度失败: {} / {}", p.operator_id, p.method_id)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "now": "2026-01-05T08:00:00",
        "config": { "planning_horizon_days": "30" },
        "methods": [{
            "method_id": "HPLC-001", "name": "Assay", "category": "HPLC",
            "lead_time_days": 1, "default_batch_size": 24, "default_run_time_min": 10
        }],
        "instruments": [{
            "instrument_id": "HPLC-01", "name": "HPLC", "category": "HPLC",
            "status": "active", "location": "Lab A", "max_batch_size": 96,
            "setup_min": 30, "cleanup_min": 15
        }],
        "rules": [{
            "method_id": "HPLC-001", "instrument_id": "HPLC-01", "batch_size": 24,
            "run_time_per_sample_min": 10, "preferred": true
        }],
        "operators": [{
            "operator_id": "OP-1", "name": "Ana",
            "shift": { "start": "08:00:00", "end": "17:00:00" },
            "max_concurrent_batches": 4, "overtime_approved": false
        }],
        "proficiencies": [{
            "operator_id": "OP-1", "method_id": "HPLC-001",
            "level": "expert", "certified_on": "2025-06-01"
        }],
        "demands": [
            { "request_id": "REQ-1", "method_id": "HPLC-001", "sample_count": 30,
              "priority": "high", "due_date": "2026-01-09" },
            { "request_id": "REQ-0", "method_id": "HPLC-001", "sample_count": 0,
              "priority": "low", "due_date": "2026-01-09" }
        ]
    }"#;

    #[tokio::test]
    async fn test_scenario_runs_one_cycle() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let output = ScenarioRunner::in_memory().unwrap().run(scenario).await.unwrap();

        assert_eq!(output.cycles.len(), 1);
        assert_eq!(output.assignments.len(), 2);
        assert!(output.unschedulable.is_empty());
        assert_eq!(output.rejected_demands.len(), 1);
        assert_eq!(output.rejected_demands[0].request_id, "REQ-0");
        assert_eq!(output.capacity_overview.by_method.len(), 1);
    }
}
