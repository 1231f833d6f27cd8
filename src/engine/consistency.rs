// ==========================================
// 产线排产系统 - 日检引擎
// ==========================================
// 职责: 对账当日网格与订单状态
// 规则:
//   1) 剩余量归零 → 删除当日尚未开始的单元格（REMOVED_COMPLETED）
//   2) 订单停用/取消/已删除 → 同上（REMOVED_INACTIVE）
//   3) 启用且有剩余量但当日未排产 → 仅报告（UNPLANNED）
//   4) 单个订单读取失败 → 记录（LOOKUP_FAILED）, 不中断整轮
//   5) 删除失败 → 记录（REMOVE_FAILED）, 单元格保留待下次检查
// 幂等: 第二次运行无可删除单元格, orders_modified = 0
// 并发: 只在每次删除时持有对应产线锁
// ==========================================

use crate::domain::reference::Order;
use crate::domain::types::CheckAction;
use crate::engine::line_lock::LineLockRegistry;
use crate::repository::error::RepositoryResult;
use crate::repository::planning_repo::PlanningCellRepository;
use crate::repository::reference_repo::ReferenceRepository;
use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::instrument;

/// 单个订单的检查明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDetail {
    pub order_uuid: String,
    pub action: CheckAction,
    pub removed_cells: usize,
    pub message: String,
}

/// 日检报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCheckReport {
    pub date: NaiveDate,
    pub orders_checked: usize,
    pub orders_modified: usize,
    pub details: Vec<CheckDetail>,
}

// ==========================================
// DailyConsistencyChecker - 日检引擎
// ==========================================
pub struct DailyConsistencyChecker {
    planning_repo: Arc<PlanningCellRepository>,
    reference_repo: Arc<ReferenceRepository>,
    line_locks: Arc<LineLockRegistry>,
}

impl DailyConsistencyChecker {
    pub fn new(
        planning_repo: Arc<PlanningCellRepository>,
        reference_repo: Arc<ReferenceRepository>,
        line_locks: Arc<LineLockRegistry>,
    ) -> Self {
        Self {
            planning_repo,
            reference_repo,
            line_locks,
        }
    }

    /// 以本地当前时间检查今天
    pub fn run(&self) -> RepositoryResult<DailyCheckReport> {
        let now = Local::now().naive_local();
        self.run_for(now.date(), now)
    }

    /// 检查指定日期
    ///
    /// # 参数
    /// - date: 被检查的日期
    /// - now: 当前时刻; 只删除起始时刻不早于 now 的单元格
    ///
    /// # 返回
    /// 日检报告（单个订单失败记入明细, 不返回错误）
    #[instrument(skip(self))]
    pub fn run_for(&self, date: NaiveDate, now: NaiveDateTime) -> RepositoryResult<DailyCheckReport> {
        // 订单 → 当日有单元格的产线
        let mut planned: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for cell in self.planning_repo.find_by_dates(date, date)? {
            planned
                .entry(cell.order_uuid)
                .or_default()
                .insert(cell.line_uuid);
        }

        let mut order_ids: BTreeSet<String> = planned.keys().cloned().collect();
        for order in self.reference_repo.list_active_orders()? {
            if !order.is_satisfied() {
                order_ids.insert(order.order_uuid);
            }
        }

        let from_minute = first_removable_minute(date, now);
        let mut details = Vec::with_capacity(order_ids.len());

        for order_uuid in &order_ids {
            let lines = planned.get(order_uuid);
            let detail = match self.reference_repo.find_order(order_uuid) {
                Ok(Some(order)) => self.check_order(&order, date, lines, from_minute),
                Ok(None) => match lines {
                    Some(lines) => self.remove_for(
                        order_uuid,
                        CheckAction::RemovedInactive,
                        lines,
                        date,
                        from_minute,
                    ),
                    None => CheckDetail {
                        order_uuid: order_uuid.clone(),
                        action: CheckAction::NoChange,
                        removed_cells: 0,
                        message: "订单不存在或已删除, 当日无排产".to_string(),
                    },
                },
                Err(e) => {
                    tracing::warn!(order_uuid = %order_uuid, error = %e, "订单读取失败");
                    CheckDetail {
                        order_uuid: order_uuid.clone(),
                        action: CheckAction::LookupFailed,
                        removed_cells: 0,
                        message: e.to_string(),
                    }
                }
            };
            details.push(detail);
        }

        let orders_modified = details.iter().filter(|d| d.action.is_modification()).count();
        tracing::info!(
            %date,
            orders_checked = details.len(),
            orders_modified,
            "日检完成"
        );

        Ok(DailyCheckReport {
            date,
            orders_checked: details.len(),
            orders_modified,
            details,
        })
    }

    fn check_order(
        &self,
        order: &Order,
        date: NaiveDate,
        lines: Option<&BTreeSet<String>>,
        from_minute: Option<u32>,
    ) -> CheckDetail {
        let detail = |action, removed_cells, message: String| CheckDetail {
            order_uuid: order.order_uuid.clone(),
            action,
            removed_cells,
            message,
        };

        let removal_action = if !order.active {
            Some(CheckAction::RemovedInactive)
        } else if order.is_satisfied() {
            Some(CheckAction::RemovedCompleted)
        } else {
            None
        };

        match (removal_action, lines) {
            (Some(action), Some(lines)) => {
                self.remove_for(&order.order_uuid, action, lines, date, from_minute)
            }
            (Some(_), None) => detail(CheckAction::NoChange, 0, "当日无排产".to_string()),
            (None, Some(_)) => detail(CheckAction::NoChange, 0, "状态一致".to_string()),
            (None, None) => detail(
                CheckAction::Unplanned,
                0,
                format!("剩余 {} 件, 当日未排产", order.remaining_quantity()),
            ),
        }
    }

    /// 删除订单当日尚未开始的单元格, 并生成明细
    ///
    /// # 参数
    /// - action: 删除成功时记录的动作
    /// - from_minute: None 表示当日已过, 不做删除
    fn remove_for(
        &self,
        order_uuid: &str,
        action: CheckAction,
        lines: &BTreeSet<String>,
        date: NaiveDate,
        from_minute: Option<u32>,
    ) -> CheckDetail {
        let detail = |action, removed_cells, message: String| CheckDetail {
            order_uuid: order_uuid.to_string(),
            action,
            removed_cells,
            message,
        };

        let Some(from_minute) = from_minute else {
            return detail(CheckAction::NoChange, 0, "当日已过, 不删除历史排产".to_string());
        };
        match self.remove_remaining_cells(order_uuid, lines, date, from_minute) {
            Ok(0) => detail(CheckAction::NoChange, 0, "无待删除的后续排产".to_string()),
            Ok(removed) => {
                tracing::info!(order_uuid = %order_uuid, removed, %action, "删除后续排产");
                detail(action, removed, format!("已删除 {} 个后续单元格", removed))
            }
            Err(e) => {
                tracing::warn!(order_uuid = %order_uuid, error = %e, "删除后续排产失败");
                detail(CheckAction::RemoveFailed, 0, e.to_string())
            }
        }
    }

    fn remove_remaining_cells(
        &self,
        order_uuid: &str,
        lines: &BTreeSet<String>,
        date: NaiveDate,
        from_minute: u32,
    ) -> RepositoryResult<usize> {
        let mut removed = 0;
        for line_uuid in lines {
            removed += self.line_locks.with_line_lock(line_uuid, || {
                self.planning_repo
                    .delete_for_order_from(order_uuid, line_uuid, date, from_minute)
            })?;
        }
        Ok(removed)
    }
}

/// 当日可删除单元格的最早起始分钟
///
/// - 未来日期: 0
/// - 今天: 向上取整到下一个整分钟
/// - 过去日期: None
fn first_removable_minute(date: NaiveDate, now: NaiveDateTime) -> Option<u32> {
    if date > now.date() {
        return Some(0);
    }
    if date < now.date() {
        return None;
    }
    let time = now.time();
    let partial = u32::from(time.second() > 0 || time.nanosecond() > 0);
    Some(time.hour() * 60 + time.minute() + partial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_first_removable_minute() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        assert_eq!(first_removable_minute(today, at(8, 0, 0)), Some(480));
        assert_eq!(first_removable_minute(today, at(8, 0, 30)), Some(481));
        assert_eq!(first_removable_minute(today.succ_opt().unwrap(), at(8, 0, 0)), Some(0));
        assert_eq!(first_removable_minute(today.pred_opt().unwrap(), at(8, 0, 0)), None);
    }
}
