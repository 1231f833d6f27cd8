// ==========================================
// 产线排产系统 - 产能网格
// ==========================================
// 职责: 单元格保存 = 覆盖写入 + 重排 + 单事务落库
// 并发: 产线锁覆盖整个读-改-写（加载窗口 → 重排 → 落库）
// ==========================================

use crate::config::{ConfigManager, PlanningConfig};
use crate::domain::planning::{PlanningCell, Slot};
use crate::domain::reference::{OrderFacts, WorkLine};
use crate::domain::types::ZoomLevel;
use crate::engine::hours::HoursCalculator;
use crate::engine::line_lock::LineLockRegistry;
use crate::engine::replanner::{OrderRank, ReplanRequest, ReplanResult, ReplanSettings, Replanner};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::planning_repo::PlanningCellRepository;
use crate::repository::reference_repo::ReferenceRepository;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// 单元格保存命令（已通过 API 层校验）
#[derive(Debug, Clone)]
pub struct SaveCellCommand {
    pub order_uuid: String,
    pub line_uuid: String,
    pub slot: Slot,
    pub workers: i32,
    pub zoom_level: ZoomLevel,
}

/// 单元格保存结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCellOutcome {
    pub planning_id: String,
    pub replan_result: ReplanResult,
}

// ==========================================
// CapacityGrid - 产能网格
// ==========================================
pub struct CapacityGrid {
    planning_repo: Arc<PlanningCellRepository>,
    reference_repo: Arc<ReferenceRepository>,
    config_manager: Arc<ConfigManager>,
    line_locks: Arc<LineLockRegistry>,
}

impl CapacityGrid {
    pub fn new(
        planning_repo: Arc<PlanningCellRepository>,
        reference_repo: Arc<ReferenceRepository>,
        config_manager: Arc<ConfigManager>,
        line_locks: Arc<LineLockRegistry>,
    ) -> Self {
        Self {
            planning_repo,
            reference_repo,
            config_manager,
            line_locks,
        }
    }

    fn load_config(&self) -> RepositoryResult<PlanningConfig> {
        self.config_manager
            .load_planning_config()
            .map_err(|e| RepositoryError::InternalError(format!("加载排产配置失败: {}", e)))
    }

    /// 启用中的产线（停用/删除视为不存在）
    pub fn active_line(&self, line_uuid: &str) -> RepositoryResult<WorkLine> {
        self.reference_repo
            .find_work_line(line_uuid)?
            .filter(|l| l.active)
            .ok_or_else(|| RepositoryError::not_found("WorkLine", line_uuid))
    }

    /// 启用中订单的工时事实（停用/删除视为不存在）
    pub fn active_order_facts(&self, order_uuid: &str) -> RepositoryResult<OrderFacts> {
        self.reference_repo
            .find_order_facts(order_uuid)?
            .filter(|f| f.order.active)
            .ok_or_else(|| RepositoryError::not_found("Order", order_uuid))
    }

    /// 保存单元格并重排
    ///
    /// # 参数
    /// - cmd: 已校验的保存命令
    ///
    /// # 返回
    /// - Ok(SaveCellOutcome): 单元格 UUID + 重排结果（冲突以数据形式返回）
    /// - Err(NotFound): 订单或产线不存在/已停用
    #[instrument(skip(self, cmd), fields(
        order_uuid = %cmd.order_uuid,
        line_uuid = %cmd.line_uuid,
        slot = %cmd.slot,
        workers = cmd.workers
    ))]
    pub fn save_cell(&self, cmd: SaveCellCommand) -> RepositoryResult<SaveCellOutcome> {
        let config = self.load_config()?;
        let line = self.active_line(&cmd.line_uuid)?;
        let facts = self.active_order_facts(&cmd.order_uuid)?;

        let line_capacity = line.capacity(config.default_line_capacity);
        let crew = cmd.workers.min(line_capacity);
        let total_units = HoursCalculator::estimate(&facts).crew_quarters(crew);

        let replanner = Replanner::new(ReplanSettings::from(&config));
        let saved = PlanningCell {
            planning_uuid: Uuid::new_v4().to_string(),
            line_uuid: cmd.line_uuid.clone(),
            order_uuid: cmd.order_uuid.clone(),
            plan_date: cmd.slot.date,
            hour: cmd.slot.hour,
            minute: cmd.slot.minute,
            workers: cmd.workers,
            zoom_level: cmd.zoom_level,
        };

        self.line_locks.with_line_lock(&cmd.line_uuid, || {
            let (start, end) = replanner.window_dates(cmd.slot.date);
            let existing = self
                .planning_repo
                .find_by_line_and_dates(&cmd.line_uuid, start, end)?;

            // 订单在其他产线上已排的刻钟从需求中扣除
            let planned_elsewhere = self.units_on_other_lines(&cmd, start, end)?;
            let required_units = total_units.saturating_sub(planned_elsewhere);
            if planned_elsewhere > 0 {
                tracing::debug!(
                    total_units,
                    planned_elsewhere,
                    required_units,
                    "扣除其他产线已排工时"
                );
            }

            let mut ranks = self.collect_ranks(&existing)?;
            ranks.insert(facts.order.order_uuid.clone(), OrderRank::from_order(&facts.order));

            let outcome = replanner.replan(ReplanRequest {
                saved,
                existing,
                required_units,
                line_capacity,
                ranks,
            });

            self.planning_repo
                .apply_line_changes(&outcome.removed_ids, &outcome.upserts)?;

            tracing::info!(
                planning_id = %outcome.saved.planning_uuid,
                partial = outcome.result.partial,
                "单元格已保存"
            );

            Ok(SaveCellOutcome {
                planning_id: outcome.saved.planning_uuid,
                replan_result: outcome.result,
            })
        })
    }

    /// 订单在窗口内其他产线上已占用的刻钟数
    fn units_on_other_lines(
        &self,
        cmd: &SaveCellCommand,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<u64> {
        let cells = self
            .planning_repo
            .find_by_order_and_dates(&cmd.order_uuid, start, end)?;
        Ok(cells
            .iter()
            .filter(|c| c.line_uuid != cmd.line_uuid)
            .map(|c| u64::from(c.zoom_level.units()))
            .sum())
    }

    /// 窗口内各订单的挤占优先级（订单资料缺失时不登记, 按最低优先级处理）
    fn collect_ranks(&self, cells: &[PlanningCell]) -> RepositoryResult<HashMap<String, OrderRank>> {
        let mut ranks = HashMap::new();
        for cell in cells {
            if ranks.contains_key(&cell.order_uuid) {
                continue;
            }
            match self.reference_repo.find_order(&cell.order_uuid)? {
                Some(order) => {
                    ranks.insert(cell.order_uuid.clone(), OrderRank::from_order(&order));
                }
                None => {
                    tracing::warn!(order_uuid = %cell.order_uuid, "单元格引用的订单不存在");
                }
            }
        }
        Ok(ranks)
    }
}
