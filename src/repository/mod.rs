// ==========================================
// 产线排产系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// 连接: 所有仓储共享 Arc<Mutex<Connection>>, 连接锁只在单条语句/单个事务内持有
// ==========================================

pub mod error;
pub mod planning_repo;
pub mod reference_repo;
pub mod sql_utils;
pub mod summary_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use planning_repo::PlanningCellRepository;
pub use reference_repo::ReferenceRepository;
pub use summary_repo::SummaryEntryRepository;
