// ==========================================
// 产线排产系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + axum
// 系统定位: 产能规划与重排引擎 (订单/产线等基础资料由外部 CRUD 层维护)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CheckAction, ConflictKind, ZoomLevel};

// 领域实体
pub use domain::{
    Article, Offer, Order, OrderFacts, PlanningCell, Slot, SummaryEntry, SummaryWrite, WorkLine,
};

// 引擎
pub use engine::{
    CapacityGrid, DailyConsistencyChecker, HoursCalculator, LineLockRegistry, Replanner,
    SummaryOverlay,
};

// API
pub use api::PlanningApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "产线排产系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
