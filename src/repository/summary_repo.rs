// ==========================================
// 产线排产系统 - 汇总叠加层仓储
// ==========================================
// 并发: 单键读-算-写在 IMMEDIATE 事务内完成, 不依赖产线锁
// ==========================================

use crate::domain::planning::Slot;
use crate::domain::summary::{SummaryEntry, SummaryWrite};
use crate::domain::types::ZoomLevel;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_utils::{format_date, parse_date_column};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn map_entry(row: &Row<'_>) -> rusqlite::Result<SummaryEntry> {
    let zoom_raw: String = row.get(6)?;
    let zoom_level = ZoomLevel::parse(&zoom_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("未知的 zoom_level: {}", zoom_raw).into(),
        )
    })?;
    Ok(SummaryEntry {
        summary_uuid: row.get(0)?,
        summary_type: row.get(1)?,
        entry_date: parse_date_column(2, &row.get::<_, String>(2)?)?,
        hour: row.get(3)?,
        minute: row.get(4)?,
        value: row.get(5)?,
        zoom_level,
    })
}

// ==========================================
// SummaryEntryRepository - 汇总条目仓储
// ==========================================
pub struct SummaryEntryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SummaryEntryRepository {
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

    /// 按写入方式更新单个键
    ///
    /// # 参数
    /// - summary_type: 汇总类型标签
    /// - slot: 槽位
    /// - zoom_level: 写入时的粒度
    /// - write: Reset / Accumulate
    ///
    /// # 返回
    /// 写入后的条目（已存在时沿用原 summary_uuid）
    pub fn write(
        &self,
        summary_type: &str,
        slot: Slot,
        zoom_level: ZoomLevel,
        write: SummaryWrite,
    ) -> RepositoryResult<SummaryEntry> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let date_str = format_date(slot.date);

        let existing: Option<(String, f64)> = tx
            .query_row(
                r#"
                SELECT summary_uuid, value FROM summary_entry
                WHERE summary_type = ?1 AND entry_date = ?2 AND hour = ?3 AND minute = ?4
                "#,
                params![summary_type, date_str, slot.hour, slot.minute],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let value = write.apply(existing.as_ref().map(|(_, v)| *v));

        let summary_uuid = match existing {
            Some((id, _)) => {
                tx.execute(
                    r#"
                    UPDATE summary_entry
                    SET value = ?1, zoom_level = ?2, updated_at = datetime('now')
                    WHERE summary_uuid = ?3
                    "#,
                    params![value, zoom_level.to_db_str(), id],
                )?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    r#"
                    INSERT INTO summary_entry (
                        summary_uuid, summary_type, entry_date, hour, minute, value, zoom_level
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        id,
                        summary_type,
                        date_str,
                        slot.hour,
                        slot.minute,
                        value,
                        zoom_level.to_db_str()
                    ],
                )?;
                id
            }
        };

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(SummaryEntry {
            summary_uuid,
            summary_type: summary_type.to_string(),
            entry_date: slot.date,
            hour: slot.hour,
            minute: slot.minute,
            value,
            zoom_level,
        })
    }

    /// 按键查询
    pub fn find_by_key(&self, summary_type: &str, slot: Slot) -> RepositoryResult<Option<SummaryEntry>> {
        let conn = self.get_conn()?;
        let entry = conn
            .query_row(
                r#"
                SELECT summary_uuid, summary_type, entry_date, hour, minute, value, zoom_level
                FROM summary_entry
                WHERE summary_type = ?1 AND entry_date = ?2 AND hour = ?3 AND minute = ?4
                "#,
                params![summary_type, format_date(slot.date), slot.hour, slot.minute],
                map_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// 查询日期范围内的条目
    pub fn find_by_dates(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<SummaryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT summary_uuid, summary_type, entry_date, hour, minute, value, zoom_level
            FROM summary_entry
            WHERE entry_date BETWEEN ?1 AND ?2
            ORDER BY entry_date, hour, minute, summary_type
            "#,
        )?;
        let entries = stmt
            .query_map(params![format_date(start_date), format_date(end_date)], map_entry)?
            .collect::<rusqlite::Result<Vec<SummaryEntry>>>()?;
        Ok(entries)
    }
}
