// ==========================================
// 产线排产系统 - 应用层
// ==========================================
// 职责: 装配仓储/引擎/API, 对外提供 HTTP 接口
// ==========================================

pub mod http;
pub mod state;

// 重导出
pub use http::{build_router, run_serve};
pub use state::{get_default_db_path, AppState};
