// ==========================================
// 产线排产系统 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 时间网格粒度 (Zoom Level)
// ==========================================
// 一刻钟 (quarter unit) 是所有单元格跨度的公共度量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomLevel {
    Hour,    // 整点槽位, 分钟只能为 0
    Quarter, // 刻钟槽位, 分钟为 0/15/30/45
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ZoomLevel {
    /// 从字符串解析粒度（大小写不敏感），无法识别返回 None
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hour" => Some(ZoomLevel::Hour),
            "quarter" => Some(ZoomLevel::Quarter),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ZoomLevel::Hour => "hour",
            ZoomLevel::Quarter => "quarter",
        }
    }

    /// 单个槽位覆盖的刻钟数
    pub fn units(&self) -> u16 {
        match self {
            ZoomLevel::Hour => 4,
            ZoomLevel::Quarter => 1,
        }
    }

    /// 该粒度下合法的分钟值
    pub fn valid_minutes(&self) -> &'static [u8] {
        match self {
            ZoomLevel::Hour => &[0],
            ZoomLevel::Quarter => &[0, 15, 30, 45],
        }
    }

    pub fn is_valid_minute(&self, minute: i64) -> bool {
        self.valid_minutes().iter().any(|m| i64::from(*m) == minute)
    }
}

// ==========================================
// 重排冲突类型 (Conflict Kind)
// ==========================================
// 冲突不是错误: 以数据形式出现在 replan_result 中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    WorkersExceedCapacity, // 人数超过产线额定人数（已截断）
    ChainLimitExceeded,    // 挤占链超过上限，已回滚
    HorizonExhausted,      // 重排窗口内无可用槽位
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::WorkersExceedCapacity => write!(f, "WORKERS_EXCEED_CAPACITY"),
            ConflictKind::ChainLimitExceeded => write!(f, "CHAIN_LIMIT_EXCEEDED"),
            ConflictKind::HorizonExhausted => write!(f, "HORIZON_EXHAUSTED"),
        }
    }
}

// ==========================================
// 日检动作 (Check Action)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckAction {
    NoChange,         // 状态一致
    RemovedCompleted, // 订单已完工, 删除当日后续排产
    RemovedInactive,  // 订单已停用/取消, 删除当日后续排产
    Unplanned,        // 订单有剩余量但当日未排产（仅报告）
    LookupFailed,     // 订单资料读取失败（仅报告）
    RemoveFailed,     // 删除后续排产失败（单元格保留）
}

impl CheckAction {
    /// 是否属于“已修改”
    pub fn is_modification(&self) -> bool {
        matches!(self, CheckAction::RemovedCompleted | CheckAction::RemovedInactive)
    }
}

impl fmt::Display for CheckAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckAction::NoChange => write!(f, "NO_CHANGE"),
            CheckAction::RemovedCompleted => write!(f, "REMOVED_COMPLETED"),
            CheckAction::RemovedInactive => write!(f, "REMOVED_INACTIVE"),
            CheckAction::Unplanned => write!(f, "UNPLANNED"),
            CheckAction::LookupFailed => write!(f, "LOOKUP_FAILED"),
            CheckAction::RemoveFailed => write!(f, "REMOVE_FAILED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_minutes() {
        assert!(ZoomLevel::Hour.is_valid_minute(0));
        assert!(!ZoomLevel::Hour.is_valid_minute(15));
        for m in [0, 15, 30, 45] {
            assert!(ZoomLevel::Quarter.is_valid_minute(m));
        }
        assert!(!ZoomLevel::Quarter.is_valid_minute(10));
        assert!(!ZoomLevel::Quarter.is_valid_minute(60));
    }

    #[test]
    fn test_zoom_parse() {
        assert_eq!(ZoomLevel::parse("HOUR"), Some(ZoomLevel::Hour));
        assert_eq!(ZoomLevel::parse(" quarter "), Some(ZoomLevel::Quarter));
        assert_eq!(ZoomLevel::parse("day"), None);
        assert_eq!(serde_json::to_string(&ZoomLevel::Quarter).unwrap(), "\"quarter\"");
    }

    #[test]
    fn test_check_action_text() {
        assert_eq!(CheckAction::RemoveFailed.to_string(), "REMOVE_FAILED");
        assert_eq!(
            serde_json::to_string(&CheckAction::RemoveFailed).unwrap(),
            "\"REMOVE_FAILED\""
        );
        assert_eq!(CheckAction::LookupFailed.to_string(), "LOOKUP_FAILED");
        assert!(!CheckAction::RemoveFailed.is_modification());
        assert!(!CheckAction::LookupFailed.is_modification());
        assert!(CheckAction::RemovedInactive.is_modification());
    }
}
