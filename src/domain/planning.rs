// ==========================================
// 产线排产系统 - 排产单元格领域模型
// ==========================================
// 红线: 同一 (产线, 日期, 槽位) 最多一个单元格, 后写覆盖先写
// 度量: 单元格跨度以刻钟计 (hour=4, quarter=1), 同产线跨度不重叠
// ==========================================

use crate::domain::types::ZoomLevel;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Slot - 时间槽位
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub hour: u8,
    pub minute: u8,
}

impl Slot {
    pub fn new(date: NaiveDate, hour: u8, minute: u8) -> Self {
        Self { date, hour, minute }
    }

    /// 当日第几个刻钟 (0..96)
    pub fn quarter_index(&self) -> u16 {
        u16::from(self.hour) * 4 + u16::from(self.minute) / 15
    }

    /// 由刻钟序号还原槽位
    pub fn from_quarter_index(date: NaiveDate, quarter: u16) -> Self {
        Self {
            date,
            hour: (quarter / 4) as u8,
            minute: ((quarter % 4) * 15) as u8,
        }
    }

    /// 槽位起始时刻
    pub fn start(&self) -> NaiveDateTime {
        self.date
            .and_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_else(|| self.date.and_time(chrono::NaiveTime::MIN))
    }

    /// 查询结果中使用的键: "YYYY-MM-DD HH:MM"
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:{:02}", self.date.format("%Y-%m-%d"), self.hour, self.minute)
    }
}

// ==========================================
// PlanningCell - 排产单元格
// ==========================================
// 生命周期: save 创建/覆盖; 重排时被取代则删除; 日检时订单失效则删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningCell {
    pub planning_uuid: String,
    pub line_uuid: String,
    pub order_uuid: String,
    pub plan_date: NaiveDate,
    pub hour: u8,
    pub minute: u8,
    pub workers: i32,
    pub zoom_level: ZoomLevel,
}

impl PlanningCell {
    pub fn slot(&self) -> Slot {
        Slot::new(self.plan_date, self.hour, self.minute)
    }

    /// 跨度起点（含）
    pub fn start_quarter(&self) -> u16 {
        self.slot().quarter_index()
    }

    /// 跨度终点（不含）
    pub fn end_quarter(&self) -> u16 {
        self.start_quarter() + self.zoom_level.units()
    }

    /// 与另一单元格在同一天内是否时间重叠（不比较产线）
    pub fn overlaps(&self, other: &PlanningCell) -> bool {
        self.plan_date == other.plan_date
            && self.start_quarter() < other.end_quarter()
            && other.start_quarter() < self.end_quarter()
    }

    /// 移动到新槽位
    pub fn move_to(&mut self, slot: Slot) {
        self.plan_date = slot.date;
        self.hour = slot.hour;
        self.minute = slot.minute;
    }
}
