// ==========================================
// 端到端场景测试
// ==========================================
// 测试目标: JSON 场景文件 → 配置覆写 → 首个周期 → 资源事件重排 → 产能概览
// ==========================================


use lab_capacity_aps::app::{Scenario, ScenarioRunner};
use lab_capacity_aps::config::{config_keys, ConfigManager};
use lab_capacity_aps::domain::types::UnschedulableReason;
use std::io::Write;
use std::sync::Arc;
use test_helpers::{assert_no_overlaps, at, create_test_db};

const SCENARIO: &str = r#"{
    "now": "2026-01-05T08:00:00",
    "config": { "planning_horizon_days": "30", "request_ordering": "due_date_first" },
    "methods": [
        { "method_id": "HPLC-001", "name": "Assay", "category": "HPLC",
          "lead_time_days": 1, "default_batch_size": 24, "default_run_time_min": 10 },
        { "method_id": "GC-002", "name": "Residual solvents", "category": "GC",
          "lead_time_days": 2, "default_batch_size": 12, "default_run_time_min": 15 }
    ],
    "instruments": [
        { "instrument_id": "HPLC-01", "name": "HPLC A", "category": "HPLC",
          "status": "active", "location": "Lab A", "max_batch_size": 96,
          "setup_min": 30, "cleanup_min": 15 },
        { "instrument_id": "HPLC-02", "name": "HPLC B", "category": "HPLC",
          "status": "active", "location": "Lab B", "max_batch_size": 96,
          "setup_min": 30, "cleanup_min": 15 },
        { "instrument_id": "GC-01", "name": "GC", "category": "GC",
          "status": "active", "location": "Lab C", "max_batch_size": 12,
          "setup_min": 20, "cleanup_min": 10 }
    ],
    "rules": [
        { "method_id": "HPLC-001", "instrument_id": "HPLC-01", "batch_size": 24,
          "run_time_per_sample_min": 10, "preferred": true },
        { "method_id": "HPLC-001", "instrument_id": "HPLC-02", "batch_size": 24,
          "run_time_per_sample_min": 10 },
        { "method_id": "GC-002", "instrument_id": "GC-01", "batch_size": 24,
          "run_time_per_sample_min": 15 }
    ],
    "operators": [
        { "operator_id": "OP-1", "name": "Ana",
          "shift": { "start": "08:00:00", "end": "17:00:00" },
          "max_concurrent_batches": 4, "overtime_approved": false },
        { "operator_id": "OP-2", "name": "Ben",
          "shift": { "start": "08:00:00", "end": "17:00:00" },
          "max_concurrent_batches": 4, "overtime_approved": true }
    ],
    "proficiencies": [
        { "operator_id": "OP-1", "method_id": "HPLC-001", "level": "expert", "certified_on": "2025-06-01" },
        { "operator_id": "OP-2", "method_id": "HPLC-001", "level": "intermediate", "certified_on": "2025-06-01" },
        { "operator_id": "OP-2", "method_id": "GC-002", "level": "beginner", "certified_on": "2025-06-01" }
    ],
    "calendar": { "holidays": [{ "date": "2026-01-07", "name": "Site closure" }] },
    "demands": [
        { "request_id": "REQ-1", "method_id": "HPLC-001", "sample_count": 30,
          "priority": "high", "due_date": "2026-01-09" },
        { "request_id": "REQ-2", "method_id": "HPLC-001", "sample_count": 20,
          "priority": "medium", "due_date": "2026-01-06" },
        { "request_id": "REQ-3", "method_id": "GC-002", "sample_count": 30,
          "priority": "critical", "due_date": "2026-01-12" },
        { "request_id": "REQ-X", "method_id": "UNKNOWN", "sample_count": 5,
          "priority": "low", "due_date": "2026-01-12" }
    ],
    "events": [
        { "type": "instrument_status_changed", "instrument_id": "GC-01", "status": "repair" }
    ]
}"#;

fn write_scenario() -> tempfile::NamedTempFile {
    let mut temp_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(temp_file, "{}", SCENARIO).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[tokio::test]
async fn test_full_scenario_with_replan() {
    let scenario_file = write_scenario();
    let (_db_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = Arc::new(ConfigManager::new(&db_path).unwrap());

    let scenario = Scenario::load(scenario_file.path()).unwrap();
    let output = ScenarioRunner::new(config_manager.clone())
        .run(scenario)
        .await
        .unwrap();

    // 场景覆写写入配置库
    assert_eq!(
        config_manager
            .get_global_config_value(config_keys::HORIZON_DAYS)
            .unwrap()
            .as_deref(),
        Some("30")
    );

    assert_eq!(output.rejected_demands.len(), 1);
    assert_eq!(output.rejected_demands[0].request_id, "REQ-X");

    // 首个周期 + 事件触发的重排周期
    assert_eq!(output.cycles.len(), 2);
    assert_eq!(output.cycles[1].events_applied, 1);

    // GC-01 维修后 GC 需求重新排队且无可用仪器
    assert!(output.assignments.iter().all(|a| a.method_id != "GC-002"));
    assert!(output
        .unschedulable
        .iter()
        .any(|u| u.request_id == "REQ-3"
            && u.reason_code == UnschedulableReason::NoCompatibleInstrument));

    // HPLC 需求全部排入，且避开 1 月 7 日
    let hplc: Vec<_> = output
        .assignments
        .iter()
        .filter(|a| a.method_id == "HPLC-001")
        .cloned()
        .collect();
    assert_eq!(hplc.len(), 3);
    assert_no_overlaps(&hplc);
    assert!(hplc.iter().all(|a| a.start.date() != at(2, 0, 0).date()));

    // 交期优先: REQ-2 最早开始
    let req2 = hplc.iter().find(|a| a.request_id == "REQ-2").unwrap();
    assert_eq!(req2.start, at(0, 8, 0));
    assert!(hplc.iter().all(|a| a.start >= req2.start));

    assert!(output.capacity_overview.method("GC-002").is_some());
    assert!(output
        .capacity_overview
        .at_risk
        .iter()
        .any(|r| r.request_id == "REQ-3"));
}

#[tokio::test]
async fn test_output_serializes_to_json() {
    let scenario = Scenario::from_json(SCENARIO).unwrap();
    let output = ScenarioRunner::in_memory().unwrap().run(scenario).await.unwrap();

    let json = serde_json::to_value(&output).unwrap();
    assert!(json["assignments"].is_array());
    assert!(json["capacity_overview"]["by_method"].is_array());
    let reason = json["unschedulable"][0]["reason_code"].as_str().unwrap();
    assert_eq!(reason, "NO_COMPATIBLE_INSTRUMENT");
}
