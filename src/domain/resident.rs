// ==========================================
// 住院医师排班系统 - 住院医师领域模型
// ==========================================
// 红线: 住院医师记录只停用,不物理删除
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::PgyLevel;

// ==========================================
// Resident - 住院医师
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resident {
    pub resident_id: String,           // 住院医师ID
    pub name: String,                  // 姓名
    pub email: String,                 // 邮箱
    pub pgy_level: PgyLevel,           // PGY 级别
    pub start_date: NaiveDate,         // 入项日期
    pub active: bool,                  // 在岗标志 (false = 已停用)
    pub specializations: Vec<String>,  // 专科方向标签
    pub preferences: ResidentPreferences, // 排班偏好
    pub created_at: NaiveDateTime,     // 创建时间
    pub updated_at: NaiveDateTime,     // 更新时间
}

impl Resident {
    /// 指定日期是否可参与排班 (在岗且已入项)
    pub fn available_on(&self, date: NaiveDate) -> bool {
        self.active && self.start_date <= date
    }
}

// ==========================================
// ResidentPreferences - 排班偏好
// ==========================================
// 存储: resident.preferences_json (JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidentPreferences {
    pub preferred_dates: Vec<NaiveDate>, // 希望排班的日期
    pub avoided_dates: Vec<NaiveDate>,   // 希望避开的日期
    pub notes: Option<String>,           // 备注
    pub submitted: bool,                 // 是否已提交 (工作流偏好收集步骤使用)
}

impl ResidentPreferences {
    /// 日期是否在避开列表
    pub fn avoids(&self, date: NaiveDate) -> bool {
        self.avoided_dates.contains(&date)
    }

    /// 日期是否在期望列表
    pub fn prefers(&self, date: NaiveDate) -> bool {
        self.preferred_dates.contains(&date)
    }
}
