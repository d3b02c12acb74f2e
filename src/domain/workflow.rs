// ==========================================
// 住院医师排班系统 - 学年工作流领域模型
// ==========================================
// 说明: AcademicYearWorkflow 是编排器读写的顶层不变式对象,
//       状态推进只经由 WorkflowOrchestrator 的转换表
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::{PgyLevel, WorkflowState};

// ==========================================
// AcademicYearWorkflow - 学年工作流记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicYearWorkflow {
    pub year_id: String,                  // 学年ID (如 "2025-2026")
    pub state: WorkflowState,             // 当前状态
    pub year_start: NaiveDate,            // 学年开始 (7月1日)
    pub year_end: NaiveDate,              // 学年结束 (次年6月30日)
    pub required_resident_count: i32,     // 要求住院医师人数
    pub required_pgy_levels: Vec<PgyLevel>, // 要求覆盖的 PGY 级别
    pub completion_pct: f64,              // 完成度 (0.0..=100.0)
    pub created_at: NaiveDateTime,        // 创建时间
    pub updated_at: NaiveDateTime,        // 更新时间
}

impl AcademicYearWorkflow {
    /// 解析学年ID并给出学年边界
    ///
    /// # 参数
    /// - year_id: "YYYY-YYYY" 形式, 后一年必须等于前一年+1
    ///
    /// # 返回
    /// - Some((7月1日, 次年6月30日))
    /// - None: 格式非法
    pub fn year_bounds(year_id: &str) -> Option<(NaiveDate, NaiveDate)> {
        let (first, second) = year_id.split_once('-')?;
        let first: i32 = first.parse().ok()?;
        let second: i32 = second.parse().ok()?;
        if second != first + 1 {
            return None;
        }
        let start = NaiveDate::from_ymd_opt(first, 7, 1)?;
        let end = NaiveDate::from_ymd_opt(second, 6, 30)?;
        Some((start, end))
    }

    /// 是否已进入可发布前的终态链路
    pub fn is_published(&self) -> bool {
        self.state == WorkflowState::Published
    }
}

// ==========================================
// WorkflowStatusReport - 工作流状态报告
// ==========================================
// validate() 的产物: 纯重算,不改状态,可随时调用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStatusReport {
    pub year_id: String,                 // 学年ID
    pub state: WorkflowState,            // 当前状态
    pub completion_pct: f64,             // 完成度
    pub next_step: Option<WorkflowState>, // 下一步 (Published 后为 None)
    pub ready_for_next: bool,            // 下一步守卫是否满足
    pub validation_errors: Vec<String>,  // 阻碍推进的原因列表
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_bounds_parsing() {
        let (start, end) = AcademicYearWorkflow::year_bounds("2025-2026").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 6, 30).unwrap());

        assert!(AcademicYearWorkflow::year_bounds("2025-2027").is_none());
        assert!(AcademicYearWorkflow::year_bounds("garbage").is_none());
    }
}
