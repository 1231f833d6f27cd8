// ==========================================
// 产线排产系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 路由调用
// ==========================================

pub mod dto;
pub mod error;
pub mod planning_api;
pub mod validator;

// 重导出核心类型
pub use dto::{
    success_envelope, CalculateHoursResponse, ContractView, DailyCheckResponse, QueryGridResponse,
    SaveSummaryResponse,
};
pub use error::{ApiError, ApiResult, FieldViolation};
pub use planning_api::PlanningApi;
pub use validator::{FieldValidator, RangeBound};
