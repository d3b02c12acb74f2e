// ==========================================
// 住院医师排班系统 - 休假申请领域模型
// ==========================================
// 约束: start <= end; 创建时 start >= 今日
// 红线: 批准后不可变更,除非显式 override
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::TimeOffStatus;

// ==========================================
// TimeOffRequest - 休假申请
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeOffRequest {
    pub request_id: String,            // 申请ID
    pub resident_id: String,           // 住院医师ID
    pub start_date: NaiveDate,         // 开始日期
    pub end_date: NaiveDate,           // 结束日期
    pub reason: Option<String>,        // 申请事由
    pub status: TimeOffStatus,         // 审批状态
    pub reviewed_by: Option<String>,   // 审批人
    pub reviewed_at: Option<NaiveDateTime>, // 审批时间
    pub created_at: NaiveDateTime,     // 创建时间
}

impl TimeOffRequest {
    /// 日期是否落在申请区间内 (闭区间)
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// 是否为已批准申请
    pub fn is_approved(&self) -> bool {
        self.status == TimeOffStatus::Approved
    }
}
