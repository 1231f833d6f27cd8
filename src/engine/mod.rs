// ==========================================
// 产线排产系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 冲突以数据形式输出, 不作为错误
// ==========================================

pub mod capacity_grid;
pub mod consistency;
pub mod hours;
pub mod line_lock;
pub mod replanner;
pub mod summary_overlay;

// 重导出核心引擎
pub use capacity_grid::{CapacityGrid, SaveCellCommand, SaveCellOutcome};
pub use consistency::{CheckDetail, DailyCheckReport, DailyConsistencyChecker};
pub use hours::{HoursCalculator, HoursEstimate};
pub use line_lock::LineLockRegistry;
pub use replanner::{
    CellMove, CellRef, OrderRank, ReplanConflict, ReplanOutcome, ReplanRequest, ReplanResult,
    ReplanSettings, Replanner,
};
pub use summary_overlay::SummaryOverlay;
