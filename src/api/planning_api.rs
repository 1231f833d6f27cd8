// ==========================================
// 产线排产系统 - 排产 API
// ==========================================
// 职责: 请求校验 → 引擎调用 → 响应组装
// 红线: 校验全部通过后才写入; 冲突以数据形式返回
// ==========================================

use crate::api::dto::{
    CalculateHoursResponse, ContractView, DailyCheckResponse, PlanningGrid, QueryGridResponse,
    SaveSummaryResponse,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{FieldValidator, RangeBound};
use crate::domain::planning::Slot;
use crate::domain::summary::SummaryWrite;
use crate::engine::capacity_grid::{CapacityGrid, SaveCellCommand, SaveCellOutcome};
use crate::engine::consistency::DailyConsistencyChecker;
use crate::engine::hours::HoursCalculator;
use crate::engine::summary_overlay::SummaryOverlay;
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryError;
use crate::repository::planning_repo::PlanningCellRepository;
use crate::repository::reference_repo::ReferenceRepository;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

// ==========================================
// PlanningApi - 排产 API
// ==========================================
pub struct PlanningApi {
    reference_repo: Arc<ReferenceRepository>,
    planning_repo: Arc<PlanningCellRepository>,
    grid: Arc<CapacityGrid>,
    overlay: Arc<SummaryOverlay>,
    hours: Arc<HoursCalculator>,
    checker: Arc<DailyConsistencyChecker>,
}

impl PlanningApi {
    pub fn new(
        reference_repo: Arc<ReferenceRepository>,
        planning_repo: Arc<PlanningCellRepository>,
        grid: Arc<CapacityGrid>,
        overlay: Arc<SummaryOverlay>,
        hours: Arc<HoursCalculator>,
        checker: Arc<DailyConsistencyChecker>,
    ) -> Self {
        Self {
            reference_repo,
            planning_repo,
            grid,
            overlay,
            hours,
            checker,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询时间范围内的网格
    ///
    /// # 参数
    /// - body: {start_date, end_date}（支持纯日期）
    ///
    /// # 返回
    /// 产线、单元格、订单（含剩余工时）、汇总条目
    pub fn query_grid(&self, body: &Value) -> ApiResult<QueryGridResponse> {
        let _perf = PerfGuard::new("planning.query_grid");

        let mut v = FieldValidator::new(body);
        let start = v.datetime("start_date", RangeBound::Start);
        let end = v.datetime("end_date", RangeBound::End);
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                v.reject("end_date", "结束时间不能早于开始时间");
            }
        }
        v.finish("查询排产")?;
        let (Some(start), Some(end)) = (start, end) else {
            return Err(ApiError::InternalError("校验通过但日期缺失".to_string()));
        };

        let lines = self.reference_repo.list_active_work_lines()?;

        let mut planning = PlanningGrid::new();
        let mut referenced = HashSet::new();
        for cell in self.planning_repo.find_by_dates(start.date(), end.date())? {
            let slot = cell.slot();
            if slot.start() < start || slot.start() > end {
                continue;
            }
            referenced.insert(cell.order_uuid.clone());
            planning
                .entry(cell.line_uuid.clone())
                .or_default()
                .insert(slot.key(), cell);
        }

        let mut contracts = Vec::new();
        for order in self.reference_repo.list_active_orders()? {
            if order.is_satisfied() && !referenced.contains(&order.order_uuid) {
                continue;
            }
            let estimate = self
                .reference_repo
                .find_order_facts(&order.order_uuid)?
                .map(|facts| HoursCalculator::estimate(&facts));
            contracts.push(ContractView {
                remaining_quantity: order.remaining_quantity(),
                hours_needed: estimate.as_ref().map(|e| e.hours_needed),
                quarters_needed: estimate.as_ref().map(|e| e.quarters_needed),
                order_uuid: order.order_uuid,
                article_uuid: order.article_uuid,
                quantity: order.quantity,
                worked_quantity: order.worked_quantity,
                priority: order.priority,
            });
        }

        let summary = self
            .overlay
            .entries_between(start.date(), end.date())?
            .into_iter()
            .filter(|e| {
                let at = Slot::new(e.entry_date, e.hour, e.minute).start();
                at >= start && at <= end
            })
            .collect();

        Ok(QueryGridResponse {
            lines,
            planning,
            contracts,
            summary,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 保存排产单元格并触发重排
    ///
    /// # 参数
    /// - body: {order_uuid, lasworkline_uuid, date, hour, minute, workers, zoom_level}
    ///
    /// # 返回
    /// - Ok: {planning_id, replan_result}
    /// - Err(ValidationFailed): 列出全部不合法字段（含不存在/已停用的订单、产线）
    pub fn save_cell(&self, body: &Value) -> ApiResult<SaveCellOutcome> {
        let _perf = PerfGuard::new("planning.save_cell");

        let mut v = FieldValidator::new(body);
        let order_uuid = v.uuid("order_uuid");
        let line_uuid = v.uuid("lasworkline_uuid");
        let date = v.date("date");
        let zoom = v.zoom_level("zoom_level");
        let time = v.slot_time(zoom);
        let workers = v.int_in_range("workers", 1, i64::from(i32::MAX));

        if let Some(id) = &order_uuid {
            if let Err(e) = self.grid.active_order_facts(id) {
                reject_missing(&mut v, "order_uuid", "订单不存在、已停用或基础资料不完整", e)?;
            }
        }
        if let Some(id) = &line_uuid {
            if let Err(e) = self.grid.active_line(id) {
                reject_missing(&mut v, "lasworkline_uuid", "产线不存在或已停用", e)?;
            }
        }
        v.finish("保存排产")?;

        let (Some(order_uuid), Some(line_uuid), Some(date), Some(zoom_level), Some((hour, minute)), Some(workers)) =
            (order_uuid, line_uuid, date, zoom, time, workers)
        else {
            return Err(ApiError::InternalError("校验通过但字段缺失".to_string()));
        };

        let outcome = self.grid.save_cell(SaveCellCommand {
            order_uuid,
            line_uuid,
            slot: Slot::new(date, hour, minute),
            workers: workers as i32,
            zoom_level,
        })?;
        Ok(outcome)
    }

    /// 写入汇总条目
    ///
    /// # 参数
    /// - body: {summary_type, date, hour, minute, value, reset, zoom_level}
    pub fn save_summary(&self, body: &Value) -> ApiResult<SaveSummaryResponse> {
        let _perf = PerfGuard::new("planning.save_summary");

        let mut v = FieldValidator::new(body);
        let summary_type = v.required_str("summary_type");
        let date = v.date("date");
        let zoom = v.zoom_level("zoom_level");
        let time = v.slot_time(zoom);
        let value = v.number("value");
        let reset = v.boolean("reset");
        v.finish("保存汇总")?;

        let (Some(summary_type), Some(date), Some(zoom_level), Some((hour, minute)), Some(value), Some(reset)) =
            (summary_type, date, zoom, time, value, reset)
        else {
            return Err(ApiError::InternalError("校验通过但字段缺失".to_string()));
        };

        let entry = self.overlay.save(
            &summary_type,
            Slot::new(date, hour, minute),
            zoom_level,
            SummaryWrite::from_flag(reset, value),
        )?;
        Ok(SaveSummaryResponse {
            summary_id: entry.summary_uuid,
        })
    }

    // ==========================================
    // 计算与日检
    // ==========================================

    /// 计算订单剩余工时
    ///
    /// # 返回
    /// - Err(NotFound): 订单不存在或已停用（404）
    pub fn calculate_hours(&self, body: &Value) -> ApiResult<CalculateHoursResponse> {
        let _perf = PerfGuard::new("planning.calculate_hours");

        let mut v = FieldValidator::new(body);
        let order_uuid = v.uuid("order_uuid");
        v.finish("计算工时")?;
        let Some(order_uuid) = order_uuid else {
            return Err(ApiError::InternalError("校验通过但字段缺失".to_string()));
        };

        let estimate = self.hours.calculate(&order_uuid)?;
        Ok(CalculateHoursResponse {
            order_uuid: estimate.order_uuid,
            hours_needed: estimate.hours_needed,
            quarters_needed: estimate.quarters_needed,
        })
    }

    /// 执行日检（今天, 本地时间）
    pub fn daily_check(&self) -> ApiResult<DailyCheckResponse> {
        let _perf = PerfGuard::new("planning.daily_check");

        let report = self.checker.run()?;
        Ok(DailyCheckResponse {
            message: format!(
                "日检完成: 检查 {} 个订单, 修改 {} 个",
                report.orders_checked, report.orders_modified
            ),
            report,
        })
    }
}

/// NotFound 记为字段违规; 其他错误直接返回
fn reject_missing(
    v: &mut FieldValidator<'_>,
    field: &str,
    message: &str,
    err: RepositoryError,
) -> ApiResult<()> {
    match err {
        RepositoryError::NotFound { .. } => {
            v.reject(field, message);
            Ok(())
        }
        other => Err(other.into()),
    }
}
