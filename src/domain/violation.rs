// ==========================================
// 住院医师排班系统 - ACGME 违规领域模型
// ==========================================
// 说明: ACGME 违规是附着在排班表上的告知性结论,
//       不阻断生成; 只有硬规则违规阻断发布
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::types::{Severity, ViolationKind};

// ==========================================
// AcgmeViolation - 工时合规违规
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcgmeViolation {
    pub violation_id: String,      // 违规ID
    pub schedule_id: String,       // 所属排班表
    pub resident_id: String,       // 涉及住院医师
    pub kind: ViolationKind,       // 违规类别
    pub severity: Severity,        // 严重度
    pub measured_value: f64,       // 实测值 (小时/天)
    pub limit_value: f64,          // 限值
    pub window_start: NaiveDate,   // 检查窗口起点
    pub window_end: NaiveDate,     // 检查窗口终点
    pub detail: Option<String>,    // 可读描述
}

impl AcgmeViolation {
    /// 超限幅度
    pub fn excess(&self) -> f64 {
        self.measured_value - self.limit_value
    }
}
