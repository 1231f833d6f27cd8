// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、基础资料写入等功能
// 说明: 基础资料由外部 CRUD 层维护, 测试直接写 SQL
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use line_planning_aps::app::AppState;
use line_planning_aps::db::{ensure_schema, open_sqlite_connection};
use line_planning_aps::logging;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const LINE_A: &str = "a0000000-0000-4000-8000-000000000001";
pub const LINE_B: &str = "a0000000-0000-4000-8000-000000000002";

/// 测试环境（临时文件需保持存活）
pub struct TestEnv {
    pub temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub state: AppState,
}

impl TestEnv {
    /// 直接执行 SQL（写入基础资料 / 模拟外部 CRUD）
    pub fn execute(&self, sql: &str, values: &[&dyn rusqlite::ToSql]) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.execute(sql, values).unwrap()
    }

    /// 统计产线当日单元格数
    pub fn count_cells(&self, line_uuid: &str, date: NaiveDate) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM planning_cell WHERE line_uuid = ?1 AND plan_date = ?2",
            params![line_uuid, date.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )
        .unwrap()
    }

    /// 订单在产线当日的单元格 (hour, minute), 按时间排序
    pub fn order_slots(&self, order_uuid: &str, line_uuid: &str, date: NaiveDate) -> Vec<(u8, u8)> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT hour, minute FROM planning_cell \
                 WHERE order_uuid = ?1 AND line_uuid = ?2 AND plan_date = ?3 \
                 ORDER BY hour, minute",
            )
            .unwrap();
        stmt.query_map(
            params![order_uuid, line_uuid, date.format("%Y-%m-%d").to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
    }
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - TestEnv: 临时库 + 共享连接 + 已装配的 AppState
pub fn create_test_env() -> Result<TestEnv, Box<dyn Error>> {
    logging::init_test();

    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let state = AppState::from_connection(db_path.clone(), conn.clone());

    Ok(TestEnv {
        temp_file,
        db_path,
        conn,
        state,
    })
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

// ==========================================
// 基础资料写入
// ==========================================

/// 写入产线
pub fn insert_work_line(env: &TestEnv, line_uuid: &str, nominal_workers: Option<i32>) {
    env.execute(
        "INSERT INTO work_line (line_uuid, name, nominal_workers, sort_order, active) VALUES (?1, ?2, ?3, 0, 1)",
        &[&line_uuid, &format!("产线-{}", &line_uuid[line_uuid.len() - 4..]), &nominal_workers],
    );
}

/// 订单构建器: 同时写入 offer / article / orders
///
/// 默认: 数量 1, 已报工 0, 单件 1h, 每组 1 件, 标准人数 1, 优先级 0, 启用
pub struct OrderSeed {
    order_uuid: String,
    quantity: i64,
    worked_quantity: i64,
    throughput_rate: f64,
    piece: i64,
    expected_workers: i32,
    priority: i32,
    active: bool,
    created_at: String,
}

impl OrderSeed {
    pub fn new(order_uuid: &str) -> Self {
        Self {
            order_uuid: order_uuid.to_string(),
            quantity: 1,
            worked_quantity: 0,
            throughput_rate: 1.0,
            piece: 1,
            expected_workers: 1,
            priority: 0,
            active: true,
            created_at: "2026-01-01 08:00:00".to_string(),
        }
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn worked(mut self, worked_quantity: i64) -> Self {
        self.worked_quantity = worked_quantity;
        self
    }

    pub fn rate(mut self, throughput_rate: f64, piece: i64) -> Self {
        self.throughput_rate = throughput_rate;
        self.piece = piece;
        self
    }

    pub fn expected_workers(mut self, workers: i32) -> Self {
        self.expected_workers = workers;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn created_at(mut self, created_at: &str) -> Self {
        self.created_at = created_at.to_string();
        self
    }

    pub fn insert(self, env: &TestEnv) {
        let offer_uuid = format!("offer-{}", self.order_uuid);
        let article_uuid = format!("article-{}", self.order_uuid);

        env.execute(
            "INSERT INTO offer (offer_uuid, piece, expected_workers) VALUES (?1, ?2, ?3)",
            &[&offer_uuid, &self.piece, &self.expected_workers],
        );
        env.execute(
            "INSERT INTO article (article_uuid, offer_uuid, throughput_rate) VALUES (?1, ?2, ?3)",
            &[&article_uuid, &offer_uuid, &self.throughput_rate],
        );
        env.execute(
            r#"
            INSERT INTO orders (order_uuid, article_uuid, quantity, worked_quantity, priority, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            &[
                &self.order_uuid,
                &article_uuid,
                &self.quantity,
                &self.worked_quantity,
                &self.priority,
                &i32::from(self.active),
                &self.created_at,
            ],
        );
    }
}

/// 模拟外部报工
pub fn set_worked_quantity(env: &TestEnv, order_uuid: &str, worked_quantity: i64) {
    env.execute(
        "UPDATE orders SET worked_quantity = ?1 WHERE order_uuid = ?2",
        &[&worked_quantity, &order_uuid],
    );
}

/// 模拟外部停用订单
pub fn deactivate_order(env: &TestEnv, order_uuid: &str) {
    env.execute("UPDATE orders SET active = 0 WHERE order_uuid = ?1", &[&order_uuid]);
}
