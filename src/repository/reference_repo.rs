// ==========================================
// 产线排产系统 - 基础资料只读仓储
// ==========================================
// 红线: 只读; 基础资料的增删改由外部 CRUD 层负责
// 软删除: is_deleted = 1 的记录对排产核心不可见
// ==========================================

use crate::domain::reference::{Article, Offer, Order, OrderFacts, WorkLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::parse_datetime_column;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str =
    "o.order_uuid, o.article_uuid, o.quantity, o.worked_quantity, o.priority, o.active, o.created_at";

fn map_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        order_uuid: row.get(0)?,
        article_uuid: row.get(1)?,
        quantity: row.get(2)?,
        worked_quantity: row.get(3)?,
        priority: row.get(4)?,
        active: row.get::<_, i32>(5)? != 0,
        created_at: parse_datetime_column(6, &row.get::<_, String>(6)?)?,
    })
}

fn map_work_line(row: &Row<'_>) -> rusqlite::Result<WorkLine> {
    Ok(WorkLine {
        line_uuid: row.get(0)?,
        name: row.get(1)?,
        nominal_workers: row.get(2)?,
        sort_order: row.get(3)?,
        active: row.get::<_, i32>(4)? != 0,
    })
}

// ==========================================
// ReferenceRepository - 基础资料访问器
// ==========================================
pub struct ReferenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReferenceRepository {
    /// 从已有连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 订单
    // ==========================================

    /// 按 UUID 查询订单（含停用订单, 不含已删除）
    pub fn find_order(&self, order_uuid: &str) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM orders o WHERE o.order_uuid = ?1 AND o.is_deleted = 0",
            ORDER_COLUMNS
        );
        let order = conn.query_row(&sql, params![order_uuid], map_order).optional()?;
        Ok(order)
    }

    /// 查询所有启用订单
    pub fn list_active_orders(&self) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM orders o WHERE o.active = 1 AND o.is_deleted = 0 ORDER BY o.created_at, o.order_uuid",
            ORDER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map([], map_order)?
            .collect::<rusqlite::Result<Vec<Order>>>()?;
        Ok(orders)
    }

    /// 查询订单的工时计算事实（订单 + 物料 + 报价）
    ///
    /// # 返回
    /// - Ok(Some): 三者均存在且未删除
    /// - Ok(None): 任一缺失
    pub fn find_order_facts(&self, order_uuid: &str) -> RepositoryResult<Option<OrderFacts>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {},
                   a.article_uuid, a.offer_uuid, a.throughput_rate,
                   f.offer_uuid, f.piece, f.expected_workers
            FROM orders o
            JOIN article a ON a.article_uuid = o.article_uuid AND a.is_deleted = 0
            JOIN offer f ON f.offer_uuid = a.offer_uuid AND f.is_deleted = 0
            WHERE o.order_uuid = ?1 AND o.is_deleted = 0
            "#,
            ORDER_COLUMNS
        );

        let facts = conn
            .query_row(&sql, params![order_uuid], |row| {
                Ok(OrderFacts {
                    order: map_order(row)?,
                    article: Article {
                        article_uuid: row.get(7)?,
                        offer_uuid: row.get(8)?,
                        throughput_rate: row.get(9)?,
                    },
                    offer: Offer {
                        offer_uuid: row.get(10)?,
                        piece: row.get(11)?,
                        expected_workers: row.get(12)?,
                    },
                })
            })
            .optional()?;
        Ok(facts)
    }

    // ==========================================
    // 产线
    // ==========================================

    /// 按 UUID 查询产线（含停用, 不含已删除）
    pub fn find_work_line(&self, line_uuid: &str) -> RepositoryResult<Option<WorkLine>> {
        let conn = self.get_conn()?;
        let line = conn
            .query_row(
                r#"
                SELECT line_uuid, name, nominal_workers, sort_order, active
                FROM work_line
                WHERE line_uuid = ?1 AND is_deleted = 0
                "#,
                params![line_uuid],
                map_work_line,
            )
            .optional()?;
        Ok(line)
    }

    /// 查询可展示的产线（启用且未删除, 按 sort_order 排序）
    pub fn list_active_work_lines(&self) -> RepositoryResult<Vec<WorkLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT line_uuid, name, nominal_workers, sort_order, active
            FROM work_line
            WHERE active = 1 AND is_deleted = 0
            ORDER BY sort_order, name, line_uuid
            "#,
        )?;
        let lines = stmt
            .query_map([], map_work_line)?
            .collect::<rusqlite::Result<Vec<WorkLine>>>()?;
        Ok(lines)
    }
}
