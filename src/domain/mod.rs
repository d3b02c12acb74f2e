// ==========================================
// 住院医师排班系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体与封闭类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod holiday;
pub mod quota;
pub mod resident;
pub mod rule;
pub mod schedule;
pub mod timeoff;
pub mod types;
pub mod violation;
pub mod workflow;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use holiday::{CoverageRequirement, CoverageUpdate, HolidayCoverageInstance, HolidayDefinition};
pub use quota::{QuotaTable, QuotaTarget};
pub use resident::{Resident, ResidentPreferences};
pub use rule::{HardRule, HardRuleId, RuleScope, SchedulingRule, SoftRule, SoftRuleId};
pub use schedule::{Assignment, Schedule};
pub use timeoff::TimeOffRequest;
pub use types::{
    AssignmentMethod, CoverageTier, HolidayType, PgyLevel, ScheduleStatus, Severity,
    ShiftCategory, SolveStatus, TimeOffStatus, ViolationKind, WorkflowState,
};
pub use violation::AcgmeViolation;
pub use workflow::{AcademicYearWorkflow, WorkflowStatusReport};
