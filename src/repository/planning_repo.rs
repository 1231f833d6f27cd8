// ==========================================
// 产线排产系统 - 排产单元格仓储
// ==========================================
// 红线: Repository 不含业务逻辑（重排规则在 engine::replanner）
// 红线: 同一产线的批量变更必须在单个事务中落库
// ==========================================

use crate::domain::planning::PlanningCell;
use crate::domain::types::ZoomLevel;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_date, parse_date_column};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const CELL_COLUMNS: &str =
    "planning_uuid, line_uuid, order_uuid, plan_date, hour, minute, workers, zoom_level";

fn map_cell(row: &Row<'_>) -> rusqlite::Result<PlanningCell> {
    let zoom_raw: String = row.get(7)?;
    let zoom_level = ZoomLevel::parse(&zoom_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("未知的 zoom_level: {}", zoom_raw).into(),
        )
    })?;

    Ok(PlanningCell {
        planning_uuid: row.get(0)?,
        line_uuid: row.get(1)?,
        order_uuid: row.get(2)?,
        plan_date: parse_date_column(3, &row.get::<_, String>(3)?)?,
        hour: row.get(4)?,
        minute: row.get(5)?,
        workers: row.get(6)?,
        zoom_level,
    })
}

// ==========================================
// PlanningCellRepository - 排产单元格仓储
// ==========================================
pub struct PlanningCellRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlanningCellRepository {
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

    /// 按 UUID 查询单元格
    pub fn find_by_id(&self, planning_uuid: &str) -> RepositoryResult<Option<PlanningCell>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM planning_cell WHERE planning_uuid = ?1", CELL_COLUMNS);
        let cell = conn.query_row(&sql, params![planning_uuid], map_cell).optional()?;
        Ok(cell)
    }

    /// 查询某产线在日期范围内的单元格（按时间升序）
    pub fn find_by_line_and_dates(
        &self,
        line_uuid: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<PlanningCell>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM planning_cell
            WHERE line_uuid = ?1 AND plan_date BETWEEN ?2 AND ?3
            ORDER BY plan_date, hour, minute
            "#,
            CELL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let cells = stmt
            .query_map(
                params![line_uuid, format_date(start_date), format_date(end_date)],
                map_cell,
            )?
            .collect::<rusqlite::Result<Vec<PlanningCell>>>()?;
        Ok(cells)
    }

    /// 查询订单在日期范围内各产线的单元格
    pub fn find_by_order_and_dates(
        &self,
        order_uuid: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<PlanningCell>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM planning_cell
            WHERE order_uuid = ?1 AND plan_date BETWEEN ?2 AND ?3
            ORDER BY line_uuid, plan_date, hour, minute
            "#,
            CELL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let cells = stmt
            .query_map(
                params![order_uuid, format_date(start_date), format_date(end_date)],
                map_cell,
            )?
            .collect::<rusqlite::Result<Vec<PlanningCell>>>()?;
        Ok(cells)
    }

    /// 查询日期范围内所有产线的单元格
    pub fn find_by_dates(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<PlanningCell>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM planning_cell
            WHERE plan_date BETWEEN ?1 AND ?2
            ORDER BY line_uuid, plan_date, hour, minute
            "#,
            CELL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let cells = stmt
            .query_map(params![format_date(start_date), format_date(end_date)], map_cell)?
            .collect::<rusqlite::Result<Vec<PlanningCell>>>()?;
        Ok(cells)
    }

    /// 单产线变更落库（单事务）
    ///
    /// # 参数
    /// - removed: 需删除的单元格 UUID
    /// - upserts: 新建或移动后的单元格（以 planning_uuid 为准）
    ///
    /// # 说明
    /// 先删除 removed 与 upserts 的旧行再整体写入, 避免移动过程中
    /// 触发 (line_uuid, plan_date, hour, minute) 唯一约束
    pub fn apply_line_changes(
        &self,
        removed: &[String],
        upserts: &[PlanningCell],
    ) -> RepositoryResult<usize> {
        if removed.is_empty() && upserts.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut delete_stmt =
                tx.prepare("DELETE FROM planning_cell WHERE planning_uuid = ?1")?;
            for id in removed {
                delete_stmt.execute(params![id])?;
            }
            for cell in upserts {
                delete_stmt.execute(params![cell.planning_uuid])?;
            }

            let mut insert_stmt = tx.prepare(
                r#"
                INSERT INTO planning_cell (
                    planning_uuid, line_uuid, order_uuid, plan_date, hour, minute,
                    workers, zoom_level, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
                "#,
            )?;
            for cell in upserts {
                insert_stmt.execute(params![
                    cell.planning_uuid,
                    cell.line_uuid,
                    cell.order_uuid,
                    format_date(cell.plan_date),
                    cell.hour,
                    cell.minute,
                    cell.workers,
                    cell.zoom_level.to_db_str(),
                ])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(removed.len() + upserts.len())
    }

    /// 删除订单在某产线某日、从指定分钟起（含）的单元格
    ///
    /// # 返回
    /// 删除的行数
    pub fn delete_for_order_from(
        &self,
        order_uuid: &str,
        line_uuid: &str,
        plan_date: NaiveDate,
        from_minute_of_day: u32,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            DELETE FROM planning_cell
            WHERE order_uuid = ?1 AND line_uuid = ?2 AND plan_date = ?3
              AND (hour * 60 + minute) >= ?4
            "#,
            params![order_uuid, line_uuid, format_date(plan_date), from_minute_of_day],
        )?;
        Ok(affected)
    }
}
