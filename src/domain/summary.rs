// ==========================================
// 产线排产系统 - 汇总叠加层领域模型
// ==========================================
// 用途: 记录非订单类产能占用（缺勤等），不参与重排
// ==========================================

use crate::domain::types::ZoomLevel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// SummaryEntry - 汇总条目
// ==========================================
// 唯一键: (summary_type, entry_date, hour, minute)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub summary_uuid: String,
    pub summary_type: String,
    pub entry_date: NaiveDate,
    pub hour: u8,
    pub minute: u8,
    pub value: f64,
    pub zoom_level: ZoomLevel,
}

// ==========================================
// SummaryWrite - 写入方式
// ==========================================
// Reset: 覆盖原值; Accumulate: 在原值上累加（不存在时按 value 新建）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SummaryWrite {
    Reset(f64),
    Accumulate(f64),
}

impl SummaryWrite {
    /// 由请求中的 reset 标志构造
    pub fn from_flag(reset: bool, value: f64) -> Self {
        if reset {
            SummaryWrite::Reset(value)
        } else {
            SummaryWrite::Accumulate(value)
        }
    }

    /// 计算写入后的值
    pub fn apply(&self, existing: Option<f64>) -> f64 {
        match *self {
            SummaryWrite::Reset(v) => v,
            SummaryWrite::Accumulate(v) => existing.unwrap_or(0.0) + v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_then_accumulate_then_reset() {
        let v = SummaryWrite::Reset(5.0).apply(None);
        assert_eq!(v, 5.0);
        let v = SummaryWrite::Accumulate(3.0).apply(Some(v));
        assert_eq!(v, 8.0);
        let v = SummaryWrite::Reset(2.0).apply(Some(v));
        assert_eq!(v, 2.0);
    }

    #[test]
    fn test_accumulate_creates_at_value() {
        assert_eq!(SummaryWrite::Accumulate(1.5).apply(None), 1.5);
        assert_eq!(SummaryWrite::from_flag(false, 2.0), SummaryWrite::Accumulate(2.0));
    }
}
