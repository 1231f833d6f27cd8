// ==========================================
// 产线排产系统 - 汇总叠加层
// ==========================================
// 职责: 非订单类产能占用（缺勤等）的按键写入
// 规则: Reset 覆盖; Accumulate 累加, 不存在时按 value 新建
// 红线: 不触发重排, 不持有产线锁
// ==========================================

use crate::domain::planning::Slot;
use crate::domain::summary::{SummaryEntry, SummaryWrite};
use crate::domain::types::ZoomLevel;
use crate::repository::error::RepositoryResult;
use crate::repository::summary_repo::SummaryEntryRepository;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::instrument;

pub struct SummaryOverlay {
    summary_repo: Arc<SummaryEntryRepository>,
}

impl SummaryOverlay {
    pub fn new(summary_repo: Arc<SummaryEntryRepository>) -> Self {
        Self { summary_repo }
    }

    /// 写入汇总条目（单键原子读-算-写）
    ///
    /// # 返回
    /// 写入后的条目; 同一键始终沿用首次创建时的 summary_uuid
    #[instrument(skip(self))]
    pub fn save(
        &self,
        summary_type: &str,
        slot: Slot,
        zoom_level: ZoomLevel,
        write: SummaryWrite,
    ) -> RepositoryResult<SummaryEntry> {
        let entry = self.summary_repo.write(summary_type, slot, zoom_level, write)?;
        tracing::info!(summary_id = %entry.summary_uuid, value = entry.value, "汇总条目已写入");
        Ok(entry)
    }

    /// 日期范围内的条目
    pub fn entries_between(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> RepositoryResult<Vec<SummaryEntry>> {
        self.summary_repo.find_by_dates(start_date, end_date)
    }
}
