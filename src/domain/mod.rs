// ==========================================
// 产线排产系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯业务规则
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod planning;
pub mod reference;
pub mod summary;
pub mod types;

// 重导出核心类型
pub use planning::{PlanningCell, Slot};
pub use reference::{Article, Offer, Order, OrderFacts, WorkLine};
pub use summary::{SummaryEntry, SummaryWrite};
pub use types::{CheckAction, ConflictKind, ZoomLevel};
