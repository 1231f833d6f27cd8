// ==========================================
// 产线排产系统 - API 响应数据结构
// ==========================================
// 约定: 成功响应 = {error_code: 0} + 载荷字段（平铺）
// ==========================================

use crate::domain::planning::PlanningCell;
use crate::domain::reference::WorkLine;
use crate::domain::summary::SummaryEntry;
use crate::engine::consistency::DailyCheckReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 排产网格: line_uuid → "YYYY-MM-DD HH:MM" → 单元格
pub type PlanningGrid = BTreeMap<String, BTreeMap<String, PlanningCell>>;

/// 订单视图（含剩余工时）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractView {
    pub order_uuid: String,
    pub article_uuid: String,
    pub quantity: i64,
    pub worked_quantity: i64,
    pub remaining_quantity: i64,
    pub priority: i32,
    /// 物料/报价缺失时为空
    pub hours_needed: Option<f64>,
    pub quarters_needed: Option<u64>,
}

/// 网格查询响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryGridResponse {
    pub lines: Vec<WorkLine>,
    pub planning: PlanningGrid,
    pub contracts: Vec<ContractView>,
    pub summary: Vec<SummaryEntry>,
}

/// 汇总写入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSummaryResponse {
    pub summary_id: String,
}

/// 工时计算响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateHoursResponse {
    pub order_uuid: String,
    pub hours_needed: f64,
    pub quarters_needed: u64,
}

/// 日检响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCheckResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: DailyCheckReport,
}

/// 成功响应体: 载荷对象平铺并附加 error_code = 0
pub fn success_envelope<T: Serialize>(payload: &T) -> serde_json::Value {
    let mut body = match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
        Err(e) => {
            tracing::error!(error = %e, "响应序列化失败");
            return serde_json::json!({
                "error_code": -1,
                "code": "INTERNAL_ERROR",
                "message": "服务器内部错误",
            });
        }
    };
    body.insert("error_code".to_string(), serde_json::json!(0));
    serde_json::Value::Object(body)
}
