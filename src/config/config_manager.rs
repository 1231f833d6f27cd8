// ==========================================
// 产线排产系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    /// 产线默认额定人数（产线未配置 nominal_workers 时使用）
    pub const DEFAULT_LINE_CAPACITY: &str = "planning/default_line_capacity";
    /// 挤占链最大长度
    pub const REPLAN_MAX_CHAIN: &str = "planning/replan_max_chain";
    /// 重排窗口天数（含保存当日）
    pub const REPLAN_HORIZON_DAYS: &str = "planning/replan_horizon_days";
    /// 每日可排产起始小时（含）
    pub const WORK_DAY_START_HOUR: &str = "planning/work_day_start_hour";
    /// 每日可排产结束小时（不含）
    pub const WORK_DAY_END_HOUR: &str = "planning/work_day_end_hour";
}

// ==========================================
// PlanningConfig - 排产参数快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    pub default_line_capacity: i32,
    pub replan_max_chain: usize,
    pub replan_horizon_days: u32,
    pub work_day_start_hour: u8,
    pub work_day_end_hour: u8,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            default_line_capacity: 10,
            replan_max_chain: 8,
            replan_horizon_days: 7,
            work_day_start_hour: 6,
            work_day_end_hour: 22,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（独立连接）
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置（用于诊断输出）
    pub fn get_config_snapshot(&self) -> Result<HashMap<String, String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    /// 读取数值配置; 缺失或格式错误时返回默认值（格式错误记 warn）
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy,
    {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 加载排产参数快照
    ///
    /// # 说明
    /// - 各项独立回退到默认值
    /// - 工作时段非法（起始 >= 结束 或 超过 24）时整体回退到默认工作时段
    pub fn load_planning_config(&self) -> Result<PlanningConfig, Box<dyn Error>> {
        let defaults = PlanningConfig::default();

        let mut cfg = PlanningConfig {
            default_line_capacity: self
                .get_parsed_or_default(config_keys::DEFAULT_LINE_CAPACITY, defaults.default_line_capacity)?,
            replan_max_chain: self
                .get_parsed_or_default(config_keys::REPLAN_MAX_CHAIN, defaults.replan_max_chain)?,
            replan_horizon_days: self
                .get_parsed_or_default(config_keys::REPLAN_HORIZON_DAYS, defaults.replan_horizon_days)?,
            work_day_start_hour: self
                .get_parsed_or_default(config_keys::WORK_DAY_START_HOUR, defaults.work_day_start_hour)?,
            work_day_end_hour: self
                .get_parsed_or_default(config_keys::WORK_DAY_END_HOUR, defaults.work_day_end_hour)?,
        };

        if cfg.default_line_capacity <= 0 {
            tracing::warn!(value = cfg.default_line_capacity, "产线默认额定人数非法，使用默认值");
            cfg.default_line_capacity = defaults.default_line_capacity;
        }
        if cfg.replan_horizon_days == 0 {
            cfg.replan_horizon_days = 1;
        }
        if cfg.work_day_start_hour >= cfg.work_day_end_hour || cfg.work_day_end_hour > 24 {
            tracing::warn!(
                start = cfg.work_day_start_hour,
                end = cfg.work_day_end_hour,
                "工作时段配置非法，使用默认工作时段"
            );
            cfg.work_day_start_hour = defaults.work_day_start_hour;
            cfg.work_day_end_hour = defaults.work_day_end_hour;
        }

        Ok(cfg)
    }
}
