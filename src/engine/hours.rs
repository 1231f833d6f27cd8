// ==========================================
// 产线排产系统 - 工时计算引擎
// ==========================================
// 公式:
//   remaining       = max(quantity - worked_quantity, 0)
//   hours_needed    = remaining * throughput_rate / piece
//   quarters_needed = ceil(hours_needed * 4)
// 红线: 刻钟数只能向上取整, 少排工时会导致后续排产不足
// ==========================================

use crate::domain::reference::OrderFacts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::reference_repo::ReferenceRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// 工时保留精度（小数点后 9 位）
const HOURS_PRECISION: f64 = 1e9;

/// 工时舍入到固定精度, 消除乘除法的浮点噪声
///
/// 对外报告的 hours_needed 即为舍入后的值, 刻钟数由它直接向上取整
pub fn round_hours(hours: f64) -> f64 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0.0;
    }
    (hours * HOURS_PRECISION).round() / HOURS_PRECISION
}

/// 工时 → 刻钟数（严格向上取整, 不小于 0）
pub fn quarters_from_hours(hours: f64) -> u64 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * 4.0).ceil() as u64
}

// ==========================================
// HoursEstimate - 工时估算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoursEstimate {
    pub order_uuid: String,
    pub remaining_quantity: i64,
    pub hours_needed: f64,
    pub quarters_needed: u64,
    /// 工时定额对应的标准班组人数
    pub expected_workers: i32,
}

impl HoursEstimate {
    /// 实际班组人数下所需刻钟数
    ///
    /// 标准班组 expected_workers 人需要 hours_needed 小时;
    /// workers 人时按人数等比折算。expected_workers 或 workers 非正时不折算。
    pub fn crew_quarters(&self, workers: i32) -> u64 {
        if workers <= 0 || self.expected_workers <= 0 || workers == self.expected_workers {
            return self.quarters_needed;
        }
        let scaled = self.hours_needed * f64::from(self.expected_workers) / f64::from(workers);
        quarters_from_hours(round_hours(scaled))
    }
}

// ==========================================
// HoursCalculator - 工时计算引擎
// ==========================================
pub struct HoursCalculator {
    reference_repo: Arc<ReferenceRepository>,
}

impl HoursCalculator {
    pub fn new(reference_repo: Arc<ReferenceRepository>) -> Self {
        Self { reference_repo }
    }

    /// 纯计算: 由订单事实得出工时（无副作用）
    ///
    /// # 边界
    /// - throughput_rate <= 0 或 piece <= 0: 视为无需工时, hours_needed = 0
    pub fn estimate(facts: &OrderFacts) -> HoursEstimate {
        let remaining = facts.order.remaining_quantity();
        let rate = facts.article.throughput_rate;
        let piece = facts.offer.piece;

        let hours_needed = if rate.is_finite() && rate > 0.0 && piece > 0 {
            round_hours(remaining as f64 * rate / piece as f64)
        } else {
            0.0
        };

        HoursEstimate {
            order_uuid: facts.order.order_uuid.clone(),
            remaining_quantity: remaining,
            hours_needed,
            quarters_needed: quarters_from_hours(hours_needed),
            expected_workers: facts.offer.expected_workers,
        }
    }

    /// 计算订单剩余工时
    ///
    /// # 返回
    /// - Ok(HoursEstimate)
    /// - Err(NotFound): 订单不存在、已删除、已停用, 或物料/报价缺失
    #[instrument(skip(self))]
    pub fn calculate(&self, order_uuid: &str) -> RepositoryResult<HoursEstimate> {
        let facts = self
            .reference_repo
            .find_order_facts(order_uuid)?
            .filter(|f| f.order.active)
            .ok_or_else(|| RepositoryError::not_found("Order", order_uuid))?;

        let estimate = Self::estimate(&facts);
        tracing::debug!(
            remaining = estimate.remaining_quantity,
            hours_needed = estimate.hours_needed,
            quarters_needed = estimate.quarters_needed,
            "工时计算完成"
        );
        Ok(estimate)
    }
}
