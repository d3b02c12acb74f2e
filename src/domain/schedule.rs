// ==========================================
// 住院医师排班系统 - 排班表领域模型
// ==========================================
// 红线: Assignment 是求解器产物的原子单元,
//       归属且仅归属一个 Schedule
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{ScheduleStatus, ShiftCategory};

// ==========================================
// Schedule - 排班表
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub schedule_id: String,            // 排班表ID
    pub academic_year: String,          // 所属学年
    pub start_date: NaiveDate,          // 起始日期
    pub end_date: NaiveDate,            // 结束日期
    pub algorithm: String,              // 生成算法标识 (如 CSP_BACKTRACKING_V1)
    pub status: ScheduleStatus,         // 状态 (Draft/Active/Archived)
    // ===== 聚合计数 =====
    pub hard_rule_violations: i32,      // 硬规则违规数
    pub soft_rule_cost: i64,            // 软规则总成本
    pub total_assignments: i32,         // 指派总数
    // ===== 生成现场 =====
    pub config_snapshot_json: Option<String>, // 生成时配置快照 (JSON)
    pub created_at: NaiveDateTime,      // 创建时间
    pub updated_at: NaiveDateTime,      // 更新时间
}

impl Schedule {
    /// 判断是否为草稿状态
    pub fn is_draft(&self) -> bool {
        self.status == ScheduleStatus::Draft
    }

    /// 判断是否为生效状态
    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Active
    }

    /// 判断是否为归档状态
    pub fn is_archived(&self) -> bool {
        self.status == ScheduleStatus::Archived
    }

    /// 日期是否落在排班区间 (闭区间)
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

// ==========================================
// Assignment - 指派明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: String,     // 指派ID
    pub schedule_id: String,       // 所属排班表
    pub resident_id: String,       // 住院医师ID
    pub duty_date: NaiveDate,      // 值班日期
    pub category: ShiftCategory,   // 班次类别
    // ===== 推导字段 (由类别+日期固化,便于合规引擎与前端展示) =====
    pub start_at: NaiveDateTime,   // 班次开始
    pub end_at: NaiveDateTime,     // 班次结束
    pub created_at: NaiveDateTime, // 创建时间
}

impl Assignment {
    /// 构造指派并推导班次时间窗
    pub fn new(
        assignment_id: String,
        schedule_id: String,
        resident_id: String,
        duty_date: NaiveDate,
        category: ShiftCategory,
        created_at: NaiveDateTime,
    ) -> Self {
        let (start_at, end_at) = category.duty_window(duty_date);
        Self {
            assignment_id,
            schedule_id,
            resident_id,
            duty_date,
            category,
            start_at,
            end_at,
            created_at,
        }
    }

    /// 班次时长 (小时)
    pub fn duty_hours(&self) -> i64 {
        (self.end_at - self.start_at).num_hours()
    }
}
