// ==========================================
// 住院医师排班系统 - 配额领域模型
// ==========================================
// 说明: 配额目标在注册时由 PGY 级别默认值派生,
//       completed_count 随排班确认增量更新,
//       读取侧按已落库 assignment 幂等重算
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::{PgyLevel, ShiftCategory};

// ==========================================
// QuotaTable - 级别配额表
// ==========================================
// 来源: RuleCatalog 按项目配置给出的常量表
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaTable {
    pub pgy_level: PgyLevel,       // 适用级别
    pub weekday_call_target: i32,  // 工作日值班目标数
    pub weekend_call_target: i32,  // 周末值班目标数
    pub moonlight_target: i32,     // 夜间兼职目标数
    pub max_total_shifts: i32,     // 班次总数上限
}

impl QuotaTable {
    /// 指定类别的目标数
    ///
    /// 节假日值班不设目标 (由覆盖需求驱动), 返回 0
    pub fn target_for(&self, category: ShiftCategory) -> i32 {
        match category {
            ShiftCategory::WeekdayCall => self.weekday_call_target,
            ShiftCategory::WeekendCall => self.weekend_call_target,
            ShiftCategory::Moonlight => self.moonlight_target,
            ShiftCategory::HolidayCall => 0,
        }
    }
}

// ==========================================
// QuotaTarget - 个人配额进度
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaTarget {
    pub resident_id: String,       // 住院医师ID
    pub category: ShiftCategory,   // 班次类别
    pub target_count: i32,         // 目标数
    pub completed_count: i32,      // 已完成数
}

impl QuotaTarget {
    /// 剩余配额 (不为负)
    pub fn remaining(&self) -> i32 {
        (self.target_count - self.completed_count).max(0)
    }
}
