// ==========================================
// 产线排产系统 - 主入口
// ==========================================
// 模式:
//   serve        启动 HTTP 服务（默认）
//   daily-check  执行一次日检并输出 JSON（供 cron 等外部调度调用）
// 环境变量:
//   LINE_PLANNER_DB_PATH  数据库路径
//   LINE_PLANNER_BIND     监听地址（默认 127.0.0.1:8080）
//   RUST_LOG              日志级别
// ==========================================

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use line_planning_aps::app::{get_default_db_path, run_serve, AppState};
use line_planning_aps::logging;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());

    tracing::info!("==================================================");
    tracing::info!("{} v{}", line_planning_aps::APP_NAME, line_planning_aps::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = tokio::task::spawn_blocking(move || AppState::new(db_path))
        .await
        .context("初始化任务失败")?
        .map_err(|e| anyhow!(e))
        .context("无法初始化AppState")?;
    let state = Arc::new(state);

    match state.config_manager.get_config_snapshot() {
        Ok(snapshot) if !snapshot.is_empty() => tracing::info!(?snapshot, "已加载配置覆写"),
        Ok(_) => tracing::info!("未配置覆写, 使用默认排产参数"),
        Err(e) => tracing::warn!("读取配置快照失败: {}", e),
    }

    match mode.as_str() {
        "serve" => {
            let bind = std::env::var("LINE_PLANNER_BIND")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BIND.to_string());
            run_serve(state, bind.trim()).await
        }
        "daily-check" => {
            let checker = state.checker.clone();
            let report = tokio::task::spawn_blocking(move || checker.run())
                .await
                .context("日检任务失败")??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        other => bail!("未知模式: {} (可用: serve, daily-check)", other),
    }
}
