// ==========================================
// 产线排产系统 - 重排引擎
// ==========================================
// 职责: 单元格保存后, 在重排窗口内向前补齐订单所需刻钟
// 输入: 新保存的单元格 + 产线窗口内现有单元格 + 订单优先级
// 输出: 需删除/写入的单元格 + ReplanResult
// ==========================================
// 红线: Engine 不拼 SQL, 本模块为纯内存计算
// 红线: 同产线跨度不重叠; 被挤占的单元格只能后移, 不能丢失
// 规则:
//   1) 人数超过产线额定时按额定人数保存, 并记冲突
//   2) 保存槽位上的他人单元格被覆盖; 同订单在窗口内的其余单元格被取代
//   3) 从保存槽位之后按同一粒度向前补齐, 只用工作时段
//   4) 空槽直接占用; 低优先级占用者被挤到其后最近可用槽, 递归深度受限
//   5) 高优先级（或同订单）占用的槽位跳过
//   6) 挤占失败整链回滚, 记冲突并停止补齐
// ==========================================

use crate::config::PlanningConfig;
use crate::domain::planning::{PlanningCell, Slot};
use crate::domain::reference::Order;
use crate::domain::types::{ConflictKind, ZoomLevel};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;
use uuid::Uuid;

// ==========================================
// OrderRank - 挤占优先级
// ==========================================
// 比较键: priority 降序 → created_at 升序 → order_uuid 升序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRank {
    pub priority: i32,
    pub created_at: NaiveDateTime,
    pub order_uuid: String,
}

impl OrderRank {
    pub fn from_order(order: &Order) -> Self {
        Self {
            priority: order.priority,
            created_at: order.created_at,
            order_uuid: order.order_uuid.clone(),
        }
    }

    /// 基础资料缺失的订单: 排在最后
    pub fn unknown(order_uuid: &str) -> Self {
        Self {
            priority: i32::MIN,
            created_at: NaiveDateTime::MAX,
            order_uuid: order_uuid.to_string(),
        }
    }

    fn sort_key(&self) -> (Reverse<i32>, NaiveDateTime, &str) {
        (Reverse(self.priority), self.created_at, self.order_uuid.as_str())
    }

    /// 是否严格优先于 other（同订单永不互相挤占）
    pub fn outranks(&self, other: &OrderRank) -> bool {
        self.sort_key() < other.sort_key()
    }
}

fn rank_of(ranks: &HashMap<String, OrderRank>, order_uuid: &str) -> OrderRank {
    ranks
        .get(order_uuid)
        .cloned()
        .unwrap_or_else(|| OrderRank::unknown(order_uuid))
}

// ==========================================
// ReplanSettings - 重排参数
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ReplanSettings {
    pub horizon_days: u32,
    pub day_start_hour: u8,
    pub day_end_hour: u8,
    pub max_chain: usize,
}

impl From<&PlanningConfig> for ReplanSettings {
    fn from(cfg: &PlanningConfig) -> Self {
        Self {
            horizon_days: cfg.replan_horizon_days.max(1),
            day_start_hour: cfg.work_day_start_hour,
            day_end_hour: cfg.work_day_end_hour,
            max_chain: cfg.replan_max_chain,
        }
    }
}

// ==========================================
// 结果类型
// ==========================================

/// 单元格引用（结果报告用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRef {
    pub planning_uuid: String,
    pub order_uuid: String,
    pub slot: String,
    pub zoom_level: ZoomLevel,
}

impl CellRef {
    fn of(cell: &PlanningCell) -> Self {
        Self {
            planning_uuid: cell.planning_uuid.clone(),
            order_uuid: cell.order_uuid.clone(),
            slot: cell.slot().key(),
            zoom_level: cell.zoom_level,
        }
    }
}

/// 单元格移动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMove {
    pub planning_uuid: String,
    pub order_uuid: String,
    pub from: String,
    pub to: String,
}

/// 重排冲突
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanConflict {
    pub kind: ConflictKind,
    pub order_uuid: String,
    pub slot: Option<String>,
    pub message: String,
}

/// 重排结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplanResult {
    pub required_units: u64,
    pub allocated_units: u64,
    /// 是否未能补齐所需刻钟
    pub partial: bool,
    pub created: Vec<CellRef>,
    pub moved: Vec<CellMove>,
    pub removed: Vec<CellRef>,
    pub conflicts: Vec<ReplanConflict>,
}

/// 重排请求
#[derive(Debug, Clone)]
pub struct ReplanRequest {
    /// 新保存的单元格（planning_uuid 为新生成; 同订单原位覆盖时沿用旧 UUID）
    pub saved: PlanningCell,
    /// 产线在重排窗口内的现有单元格
    pub existing: Vec<PlanningCell>,
    /// 订单按保存人数折算后所需刻钟
    pub required_units: u64,
    pub line_capacity: i32,
    /// 窗口内涉及订单的优先级
    pub ranks: HashMap<String, OrderRank>,
}

/// 重排输出（由调用方在单事务内落库）
#[derive(Debug, Clone)]
pub struct ReplanOutcome {
    pub saved: PlanningCell,
    pub removed_ids: Vec<String>,
    pub upserts: Vec<PlanningCell>,
    pub result: ReplanResult,
}

// ==========================================
// 内部: 窗口与时间轴
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    date: NaiveDate,
    quarter: u16,
}

impl Position {
    fn slot(&self) -> Slot {
        Slot::from_quarter_index(self.date, self.quarter)
    }

    fn end(&self, units: u16) -> (NaiveDate, u16) {
        (self.date, self.quarter + units)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    end_date: NaiveDate,
    day_start_q: u16,
    day_end_q: u16,
}

impl Window {
    /// 不早于 (date, quarter) 的第一个可用起点（按粒度对齐、限工作时段）
    fn normalize(&self, date: NaiveDate, quarter: u16, units: u16) -> Option<Position> {
        let mut date = date;
        let mut quarter = quarter.div_ceil(units) * units;
        loop {
            if date > self.end_date {
                return None;
            }
            if quarter < self.day_start_q {
                quarter = self.day_start_q;
            }
            if quarter + units <= self.day_end_q {
                return Some(Position { date, quarter });
            }
            date = date.succ_opt()?;
            quarter = self.day_start_q;
        }
    }

    fn advance(&self, pos: Position, units: u16) -> Option<Position> {
        self.normalize(pos.date, pos.quarter + units, units)
    }
}

/// 产线时间轴: 刻钟 → 占用单元格
#[derive(Debug, Clone, Default)]
struct Timeline {
    cells: HashMap<String, PlanningCell>,
    occupancy: BTreeMap<(NaiveDate, u16), String>,
}

impl Timeline {
    fn insert(&mut self, cell: PlanningCell) {
        for q in cell.start_quarter()..cell.end_quarter() {
            self.occupancy
                .insert((cell.plan_date, q), cell.planning_uuid.clone());
        }
        self.cells.insert(cell.planning_uuid.clone(), cell);
    }

    fn remove(&mut self, id: &str) -> Option<PlanningCell> {
        let cell = self.cells.remove(id)?;
        for q in cell.start_quarter()..cell.end_quarter() {
            let key = (cell.plan_date, q);
            if self.occupancy.get(&key).map(String::as_str) == Some(id) {
                self.occupancy.remove(&key);
            }
        }
        Some(cell)
    }

    fn get(&self, id: &str) -> Option<&PlanningCell> {
        self.cells.get(id)
    }

    /// 与 [start, start+units) 重叠的单元格（去重, 按时间顺序）
    fn occupants(&self, date: NaiveDate, start: u16, units: u16) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for (_, id) in self.occupancy.range((date, start)..(date, start + units)) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    fn ids_of_order(&self, order_uuid: &str) -> Vec<String> {
        self.cells
            .values()
            .filter(|c| c.order_uuid == order_uuid)
            .map(|c| c.planning_uuid.clone())
            .collect()
    }
}

// ==========================================
// Replanner - 重排引擎
// ==========================================
pub struct Replanner {
    settings: ReplanSettings,
}

impl Replanner {
    pub fn new(settings: ReplanSettings) -> Self {
        Self { settings }
    }

    /// 重排窗口 [保存日, 保存日 + horizon_days - 1]
    pub fn window_dates(&self, plan_date: NaiveDate) -> (NaiveDate, NaiveDate) {
        let span = u64::from(self.settings.horizon_days.max(1) - 1);
        let end = plan_date
            .checked_add_days(Days::new(span))
            .unwrap_or(NaiveDate::MAX);
        (plan_date, end)
    }

    fn window(&self, plan_date: NaiveDate) -> Window {
        Window {
            end_date: self.window_dates(plan_date).1,
            day_start_q: u16::from(self.settings.day_start_hour) * 4,
            day_end_q: u16::from(self.settings.day_end_hour) * 4,
        }
    }

    /// 执行重排
    ///
    /// # 参数
    /// - request: 保存的单元格、窗口内现有单元格、所需刻钟与优先级
    ///
    /// # 返回
    /// ReplanOutcome（纯计算结果, 未落库）
    #[instrument(skip(self, request), fields(
        line_uuid = %request.saved.line_uuid,
        order_uuid = %request.saved.order_uuid,
        slot = %request.saved.slot(),
        required_units = request.required_units
    ))]
    pub fn replan(&self, request: ReplanRequest) -> ReplanOutcome {
        let ReplanRequest {
            mut saved,
            existing,
            required_units,
            line_capacity,
            ranks,
        } = request;

        let mut result = ReplanResult {
            required_units,
            ..Default::default()
        };

        // 1) 人数上限
        if line_capacity > 0 && saved.workers > line_capacity {
            result.conflicts.push(ReplanConflict {
                kind: ConflictKind::WorkersExceedCapacity,
                order_uuid: saved.order_uuid.clone(),
                slot: Some(saved.slot().key()),
                message: format!(
                    "人数 {} 超过产线额定人数 {}, 已按额定人数保存",
                    saved.workers, line_capacity
                ),
            });
            saved.workers = line_capacity;
        }

        let original: HashMap<String, PlanningCell> = existing
            .iter()
            .map(|c| (c.planning_uuid.clone(), c.clone()))
            .collect();
        let mut timeline = Timeline::default();
        for cell in existing {
            timeline.insert(cell);
        }

        // 2) 后写覆盖
        let units = saved.zoom_level.units();
        for id in timeline.occupants(saved.plan_date, saved.start_quarter(), units) {
            if let Some(old) = timeline.remove(&id) {
                if old.order_uuid == saved.order_uuid && old.slot() == saved.slot() {
                    saved.planning_uuid = old.planning_uuid;
                } else {
                    result.removed.push(CellRef::of(&old));
                }
            }
        }

        // 3) 同订单其余单元格被取代
        for id in timeline.ids_of_order(&saved.order_uuid) {
            if let Some(old) = timeline.remove(&id) {
                result.removed.push(CellRef::of(&old));
            }
        }

        // 4) 向前补齐
        let window = self.window(saved.plan_date);
        let filler_rank = rank_of(&ranks, &saved.order_uuid);
        let template = saved.clone();
        let mut cursor = window.advance(
            Position {
                date: saved.plan_date,
                quarter: saved.start_quarter(),
            },
            units,
        );
        timeline.insert(saved);
        let mut allocated = u64::from(units);

        while allocated < required_units {
            let Some(pos) = cursor else {
                result.conflicts.push(ReplanConflict {
                    kind: ConflictKind::HorizonExhausted,
                    order_uuid: template.order_uuid.clone(),
                    slot: None,
                    message: format!(
                        "重排窗口内可用槽位不足, 仍缺 {} 个刻钟",
                        required_units - allocated
                    ),
                });
                break;
            };

            let occupants = timeline.occupants(pos.date, pos.quarter, units);
            if self.can_take(&filler_rank, &occupants, &timeline, &ranks) {
                let cleared =
                    self.clear_for_filler(&mut timeline, &occupants, pos.end(units), &window, &ranks);
                if let Err(kind) = cleared {
                    tracing::warn!(slot = %pos.slot(), ?kind, "挤占失败, 停止补齐");
                    result.conflicts.push(ReplanConflict {
                        kind,
                        order_uuid: template.order_uuid.clone(),
                        slot: Some(pos.slot().key()),
                        message: format!(
                            "槽位 {} 的占用单元格无法后移, 仍缺 {} 个刻钟",
                            pos.slot(),
                            required_units - allocated
                        ),
                    });
                    break;
                }

                let slot = pos.slot();
                timeline.insert(PlanningCell {
                    planning_uuid: Uuid::new_v4().to_string(),
                    plan_date: slot.date,
                    hour: slot.hour,
                    minute: slot.minute,
                    ..template.clone()
                });
                allocated += u64::from(units);
            }
            cursor = window.advance(pos, units);
        }

        result.allocated_units = allocated;
        result.partial = allocated < required_units;

        // 5) 与原状态比对, 得出新建/移动
        let mut finals: Vec<&PlanningCell> = timeline.cells.values().collect();
        finals.sort_by_key(|c| (c.plan_date, c.start_quarter()));

        let mut upserts = Vec::new();
        for cell in finals {
            match original.get(&cell.planning_uuid) {
                None => {
                    if cell.planning_uuid != template.planning_uuid {
                        result.created.push(CellRef::of(cell));
                    }
                    upserts.push(cell.clone());
                }
                Some(_) if cell.planning_uuid == template.planning_uuid => {
                    upserts.push(cell.clone());
                }
                Some(before) if before.slot() != cell.slot() => {
                    result.moved.push(CellMove {
                        planning_uuid: cell.planning_uuid.clone(),
                        order_uuid: cell.order_uuid.clone(),
                        from: before.slot().key(),
                        to: cell.slot().key(),
                    });
                    upserts.push(cell.clone());
                }
                Some(_) => {}
            }
        }

        let removed_ids = result
            .removed
            .iter()
            .map(|r| r.planning_uuid.clone())
            .collect();

        tracing::info!(
            allocated_units = result.allocated_units,
            created = result.created.len(),
            moved = result.moved.len(),
            removed = result.removed.len(),
            conflicts = result.conflicts.len(),
            "重排完成"
        );

        ReplanOutcome {
            saved: template,
            removed_ids,
            upserts,
            result,
        }
    }

    /// rank 能否占用被 occupants 占据的槽位（空槽恒可占用）
    fn can_take(
        &self,
        rank: &OrderRank,
        occupants: &[String],
        timeline: &Timeline,
        ranks: &HashMap<String, OrderRank>,
    ) -> bool {
        occupants.iter().all(|id| {
            timeline
                .get(id)
                .map(|o| rank.outranks(&rank_of(ranks, &o.order_uuid)))
                .unwrap_or(true)
        })
    }

    /// 为补齐单元格腾出槽位: 依次后移全部占用单元格
    ///
    /// 任一挤占链失败时时间轴整体恢复原状; 空槽不做快照
    fn clear_for_filler(
        &self,
        timeline: &mut Timeline,
        occupants: &[String],
        not_before: (NaiveDate, u16),
        window: &Window,
        ranks: &HashMap<String, OrderRank>,
    ) -> Result<(), ConflictKind> {
        if occupants.is_empty() {
            return Ok(());
        }
        let snapshot = timeline.clone();
        let displaced = occupants
            .iter()
            .try_for_each(|id| self.displace(timeline, id, not_before, 1, window, ranks));
        if displaced.is_err() {
            *timeline = snapshot;
        }
        displaced
    }

    /// 把单元格挤到 not_before 之后最近的可用槽
    ///
    /// 可用槽: 空槽, 或只被更低优先级单元格占用（这些单元格递归后移）
    fn displace(
        &self,
        timeline: &mut Timeline,
        id: &str,
        not_before: (NaiveDate, u16),
        depth: usize,
        window: &Window,
        ranks: &HashMap<String, OrderRank>,
    ) -> Result<(), ConflictKind> {
        if depth > self.settings.max_chain {
            return Err(ConflictKind::ChainLimitExceeded);
        }
        let Some(mut cell) = timeline.remove(id) else {
            return Ok(());
        };

        let units = cell.zoom_level.units();
        let rank = rank_of(ranks, &cell.order_uuid);
        let (date, quarter) = (cell.plan_date, cell.end_quarter()).max(not_before);

        let mut cursor = window.normalize(date, quarter, units);
        while let Some(pos) = cursor {
            let occupants = timeline.occupants(pos.date, pos.quarter, units);
            if self.can_take(&rank, &occupants, timeline, ranks) {
                for occupant in &occupants {
                    self.displace(timeline, occupant, pos.end(units), depth + 1, window, ranks)?;
                }
                tracing::debug!(
                    planning_uuid = %cell.planning_uuid,
                    from = %cell.slot(),
                    to = %pos.slot(),
                    depth,
                    "单元格后移"
                );
                cell.move_to(pos.slot());
                timeline.insert(cell);
                return Ok(());
            }
            cursor = window.advance(pos, units);
        }

        Err(ConflictKind::HorizonExhausted)
    }
}
