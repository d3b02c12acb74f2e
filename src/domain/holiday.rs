// ==========================================
// 住院医师排班系统 - 节假日覆盖领域模型
// ==========================================
// 结构: HolidayDefinition 是可复用模板,
//       HolidayCoverageInstance 是绑定到具体学年日期的可变记录
// 红线: coverage_required 实例未指派前,覆盖其日期的排班表不可激活
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{AssignmentMethod, CoverageTier, HolidayType, PgyLevel};

// ==========================================
// HolidayDefinition - 节假日模板
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayDefinition {
    pub definition_id: String,       // 模板ID
    pub name: String,                // 名称 (如 "Thanksgiving")
    pub holiday_type: HolidayType,   // 类型
    pub coverage_required: bool,     // 默认是否需要覆盖
    pub min_pgy_level: PgyLevel,     // 主值班最低 PGY 级别
    pub coverage_tier: CoverageTier, // 覆盖层级
    pub created_at: NaiveDateTime,   // 创建时间
}

// ==========================================
// HolidayCoverageInstance - 学年节假日实例
// ==========================================
// 这是 HolidayCoverageManager 更新的可变记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayCoverageInstance {
    pub instance_id: String,             // 实例ID
    pub definition_id: String,           // 来源模板
    pub academic_year: String,           // 学年 (如 "2025-2026")
    pub holiday_date: NaiveDate,         // 具体日期
    // ===== 模板快照 (实例化时固化,模板后续修改不回溯) =====
    pub name: String,                    // 名称快照
    pub holiday_type: HolidayType,       // 类型快照
    pub coverage_required: bool,         // 是否需要覆盖 (可被总值班覆写)
    pub min_pgy_level: PgyLevel,         // 最低级别快照
    pub coverage_tier: CoverageTier,     // 覆盖层级快照
    // ===== 指派状态 =====
    pub primary_resident_id: Option<String>,     // 主值班
    pub backup_resident_id: Option<String>,      // 备班
    pub assignment_method: Option<AssignmentMethod>, // 指派方式
    pub chief_notes: Option<String>,             // 总值班备注
    pub created_at: NaiveDateTime,       // 创建时间
    pub updated_at: NaiveDateTime,       // 更新时间
}

impl HolidayCoverageInstance {
    /// 是否已完成主值班指派
    pub fn is_assigned(&self) -> bool {
        self.primary_resident_id.is_some()
    }
}

// ==========================================
// CoverageRequirement - 覆盖需求 (给约束编译器)
// ==========================================
// 由 requirements_for 按日期输出, ConstraintCompiler 转为硬约束
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRequirement {
    pub instance_id: String,         // 来源实例
    pub name: String,                // 节假日名称
    pub holiday_type: HolidayType,   // 类型
    pub requires_coverage: bool,     // 是否需要覆盖
    pub min_pgy_level: PgyLevel,     // 最低级别
    pub coverage_tier: CoverageTier, // 覆盖层级
}

// ==========================================
// CoverageUpdate - 命名更新操作
// ==========================================
// 总值班覆写不使用自由 merge-patch, 而是封闭的幂等操作集
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageUpdate {
    /// 覆写"是否需要覆盖"标志
    SetCoverageRequired { required: bool },
    /// 覆写总值班备注
    SetNotes { notes: Option<String> },
    /// 覆写主/备指派
    SetCoverageOverride {
        primary_resident_id: String,
        backup_resident_id: Option<String>,
        method: AssignmentMethod,
    },
}
