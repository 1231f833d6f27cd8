// ==========================================
// 产线排产系统 - 行映射工具
// ==========================================
// 约定: 日期 TEXT "YYYY-MM-DD"; 时间戳 TEXT "YYYY-MM-DD HH:MM:SS"
// 解析失败不做静默兜底, 统一转为 FromSqlConversionFailure
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;

pub const DATE_FMT: &str = "%Y-%m-%d";

const DATETIME_FMTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// 解析日期列
pub fn parse_date_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析时间戳列（兼容 datetime('now') 与 ISO 格式）
pub fn parse_datetime_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    let mut last_err = None;
    for fmt in DATETIME_FMTS {
        match NaiveDateTime::parse_from_str(raw, fmt) {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Err(rusqlite::Error::InvalidColumnType(idx, raw.to_string(), Type::Text)),
    }
}
