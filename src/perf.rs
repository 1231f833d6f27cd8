// ==========================================
// 产线排产系统 - 性能统计
// ==========================================
// 职责: 按 API 操作统计耗时、SQL 语句数、慢 SQL 数
// 开关:
// - `LINE_PLANNER_PERF_SQL=1` 强制开启 SQL 统计（Debug 默认开启）
// - `LINE_PLANNER_SLOW_SQL_MS=50` 慢 SQL 阈值（毫秒）
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static PERF_DEPTH: Cell<u32> = Cell::new(0);
    static SQL_COUNT: Cell<u64> = Cell::new(0);
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// 安装 SQLite 语句 trace/profile（用于 SQL 计数 + 慢查询日志）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag("LINE_PLANNER_PERF_SQL").unwrap_or(cfg!(debug_assertions));
    PERF_SQL_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("LINE_PLANNER_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(if cfg!(debug_assertions) { 50 } else { 200 });
    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(sql_trace_callback));
    conn.profile(Some(sql_profile_callback));
}

fn sql_trace_callback(_sql: &str) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if PERF_DEPTH.with(|d| d.get() > 0) {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn sql_profile_callback(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold > 0 && ms >= threshold {
        let mut sql_short: String = sql.trim().replace('\n', " ").chars().take(300).collect();
        if sql_short.len() < sql.trim().len() {
            sql_short.push('…');
        }
        tracing::warn!(target: "slow_sql", duration_ms = ms, sql = %sql_short, "slow sql");
    }
}

/// 性能统计 Guard：Drop 时记录 elapsed_ms + SQL 语句数
///
/// ```ignore
/// let _perf = line_planning_aps::perf::PerfGuard::new("planning.save_cell");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        PERF_DEPTH.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);

        tracing::info!(target: "perf", op = self.op, elapsed_ms, sql_count, "done");

        PERF_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
