// ==========================================
// 产线排产系统 - 基础资料领域模型
// ==========================================
// 红线: 基础资料由外部 CRUD 层维护, 排产核心只读
// 引用方式: 一律使用 UUID, 不使用内部自增主键
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Offer - 报价
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub offer_uuid: String,
    pub piece: i64,            // 每作业组件数
    pub expected_workers: i32, // 工时定额对应的标准班组人数
}

// ==========================================
// Article - 物料
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_uuid: String,
    pub offer_uuid: String,
    pub throughput_rate: f64, // 每作业组平均实耗工时 (h)
}

// ==========================================
// Order - 订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_uuid: String,
    pub article_uuid: String,
    pub quantity: i64,
    pub worked_quantity: i64,
    pub priority: i32, // 越大越优先（挤占时使用）
    pub active: bool,
    pub created_at: NaiveDateTime,
}

impl Order {
    /// 剩余数量（已报工超过总量视为完工, 不返回负数）
    pub fn remaining_quantity(&self) -> i64 {
        (self.quantity - self.worked_quantity).max(0)
    }

    pub fn is_satisfied(&self) -> bool {
        self.remaining_quantity() == 0
    }
}

// ==========================================
// WorkLine - 产线
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkLine {
    pub line_uuid: String,
    pub name: String,
    pub nominal_workers: Option<i32>, // 额定人数; 为空时取全局默认
    pub sort_order: i32,
    pub active: bool,
}

impl WorkLine {
    /// 产线额定人数
    pub fn capacity(&self, default_capacity: i32) -> i32 {
        self.nominal_workers
            .filter(|w| *w > 0)
            .unwrap_or(default_capacity)
    }
}

// ==========================================
// OrderFacts - 工时计算所需的订单事实
// ==========================================
#[derive(Debug, Clone)]
pub struct OrderFacts {
    pub order: Order,
    pub article: Article,
    pub offer: Offer,
}
