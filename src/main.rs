// ==========================================
// 实验室产能排程系统 - 场景运行入口
// ==========================================
// 输出: 排程结果 JSON（stdout），日志 JSON 行（stderr）
// ==========================================

use anyhow::Context;
use clap::Parser;
use lab_capacity_aps::app::{get_default_db_path, Scenario, ScenarioRunner};
use lab_capacity_aps::config::ConfigManager;
use lab_capacity_aps::logging;
use std::path::PathBuf;
use std::sync::Arc;

/// 运行 JSON 场景：登记资源、提交需求、执行排程周期并输出结果
#[derive(Parser, Debug)]
#[command(name = "lab-capacity-aps", version, about = lab_capacity_aps::APP_NAME)]
struct Cli {
    /// 场景文件 (JSON)
    scenario: PathBuf,

    /// 配置库路径；":memory:" 表示不落盘，缺省读取 LAB_CAPACITY_APS_DB_PATH
    db: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_json();

    tracing::info!(
        version = lab_capacity_aps::VERSION,
        scenario = %cli.scenario.display(),
        "{}",
        lab_capacity_aps::APP_NAME
    );

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    let config_manager = if db_path == ":memory:" {
        ConfigManager::in_memory()?
    } else {
        ConfigManager::new(&db_path).with_context(|| format!("无法打开配置库: {}", db_path))?
    };

    let scenario = Scenario::load(&cli.scenario)?;
    let output = ScenarioRunner::new(Arc::new(config_manager))
        .run(scenario)
        .await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
