// ==========================================
// 住院医师排班系统 - 操作日志领域模型
// ==========================================
// 红线: 所有写入路径必须留痕
// 用途: 审计追踪 (注册/覆写/生成/发布等关键动作)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,             // 日志ID
    pub academic_year: Option<String>, // 关联学年 (系统级操作可为 None)
    pub action_type: ActionType,       // 操作类型
    pub action_ts: NaiveDateTime,      // 操作时间戳
    pub actor: String,                 // 操作人
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,        // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CreateAcademicYear, // 创建学年
    AdvanceWorkflow,    // 工作流推进
    RegisterResident,   // 注册住院医师
    UpdateResident,     // 更新住院医师
    DeactivateResident, // 停用住院医师
    SubmitPreferences,  // 提交排班偏好
    RequestTimeOff,     // 提交休假申请
    ReviewTimeOff,      // 审批休假申请
    DefineHoliday,      // 定义节假日模板
    InstantiateHoliday, // 实例化节假日
    AssignCoverage,     // 指派节假日覆盖
    UpdateCoverage,     // 覆写节假日实例
    GenerateSchedule,   // 生成排班
    ActivateSchedule,   // 激活/发布排班
}

impl ActionType {
    /// 数据库存储字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateAcademicYear => "CREATE_ACADEMIC_YEAR",
            ActionType::AdvanceWorkflow => "ADVANCE_WORKFLOW",
            ActionType::RegisterResident => "REGISTER_RESIDENT",
            ActionType::UpdateResident => "UPDATE_RESIDENT",
            ActionType::DeactivateResident => "DEACTIVATE_RESIDENT",
            ActionType::SubmitPreferences => "SUBMIT_PREFERENCES",
            ActionType::RequestTimeOff => "REQUEST_TIME_OFF",
            ActionType::ReviewTimeOff => "REVIEW_TIME_OFF",
            ActionType::DefineHoliday => "DEFINE_HOLIDAY",
            ActionType::InstantiateHoliday => "INSTANTIATE_HOLIDAY",
            ActionType::AssignCoverage => "ASSIGN_COVERAGE",
            ActionType::UpdateCoverage => "UPDATE_COVERAGE",
            ActionType::GenerateSchedule => "GENERATE_SCHEDULE",
            ActionType::ActivateSchedule => "ACTIVATE_SCHEDULE",
        }
    }

    /// 从存储字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE_ACADEMIC_YEAR" => Some(ActionType::CreateAcademicYear),
            "ADVANCE_WORKFLOW" => Some(ActionType::AdvanceWorkflow),
            "REGISTER_RESIDENT" => Some(ActionType::RegisterResident),
            "UPDATE_RESIDENT" => Some(ActionType::UpdateResident),
            "DEACTIVATE_RESIDENT" => Some(ActionType::DeactivateResident),
            "SUBMIT_PREFERENCES" => Some(ActionType::SubmitPreferences),
            "REQUEST_TIME_OFF" => Some(ActionType::RequestTimeOff),
            "REVIEW_TIME_OFF" => Some(ActionType::ReviewTimeOff),
            "DEFINE_HOLIDAY" => Some(ActionType::DefineHoliday),
            "INSTANTIATE_HOLIDAY" => Some(ActionType::InstantiateHoliday),
            "ASSIGN_COVERAGE" => Some(ActionType::AssignCoverage),
            "UPDATE_COVERAGE" => Some(ActionType::UpdateCoverage),
            "GENERATE_SCHEDULE" => Some(ActionType::GenerateSchedule),
            "ACTIVATE_SCHEDULE" => Some(ActionType::ActivateSchedule),
            _ => None,
        }
    }
}
