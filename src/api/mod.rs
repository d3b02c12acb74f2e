// ==========================================
// 住院医师排班系统 - API 层
// ==========================================
// 职责: 提供业务操作面, 供上层 HTTP/CLI 适配器调用
// 约束: 输入验证在此层完成; 领域/引擎错误在此层转译
// ==========================================

pub mod error;
pub mod holiday_api;
pub mod resident_api;
pub mod schedule_api;
pub mod workflow_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use holiday_api::HolidayApi;
pub use resident_api::ResidentApi;
pub use schedule_api::ScheduleApi;
pub use workflow_api::WorkflowApi;

use chrono::{NaiveDateTime, Timelike};

/// 当前本地时间, 截断到秒
///
/// 时间戳列以 "%Y-%m-%d %H:%M:%S" 存储; 截断保证
/// 内存中的实体与落库读回的实体逐字段一致 (幂等比较依赖这一点)
pub(crate) fn now_ts() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
