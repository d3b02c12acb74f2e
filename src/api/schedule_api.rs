// ==========================================
// 住院医师排班系统 - 排班表API
// ==========================================
// 职责: 排班生成入口、指派/违规查询
// 红线: 生成永远返回结构化结果 (含违规清单与统计),
//       不向调用方抛不透明错误
// ==========================================

use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::SchedulingConfigReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::schedule::{Assignment, Schedule};
use crate::domain::violation::AcgmeViolation;
use crate::engine::orchestrator::{
    GenerateScheduleParams, GenerateScheduleResult, WorkflowOrchestrator,
};
use crate::repository::{ActionLogRepository, ScheduleRepository};

// ==========================================
// ScheduleApi - 排班表API
// ==========================================
pub struct ScheduleApi<C>
where
    C: SchedulingConfigReader,
{
    orchestrator: Arc<WorkflowOrchestrator<C>>,
    schedule_repo: Arc<ScheduleRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl<C> ScheduleApi<C>
where
    C: SchedulingConfigReader,
{
    /// 创建新的排班表API实例
    pub fn new(
        orchestrator: Arc<WorkflowOrchestrator<C>>,
        schedule_repo: Arc<ScheduleRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            orchestrator,
            schedule_repo,
            action_log_repo,
        }
    }

    /// 生成排班
    ///
    /// # 参数
    /// - academic_year: 学年ID
    /// - start_date/end_date: 排班区间
    /// - include_holidays: 是否把节假日覆盖需求编译进约束
    /// - optimize_preferences: 是否启用偏好匹配软规则
    /// - time_limit_ms: 时间预算覆写 (None 用配置默认)
    ///
    /// # 返回
    /// 结构化生成结果; 约束错误/超时体现在结果字段而非 Err
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_schedule(
        &self,
        academic_year: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        include_holidays: bool,
        optimize_preferences: bool,
        time_limit_ms: Option<u64>,
        actor: &str,
    ) -> ApiResult<GenerateScheduleResult> {
        if academic_year.trim().is_empty() {
            return Err(ApiError::InvalidInput("学年ID不能为空".to_string()));
        }

        let now = crate::api::now_ts();
        let result = self
            .orchestrator
            .generate_schedule(
                GenerateScheduleParams {
                    academic_year: academic_year.to_string(),
                    start_date,
                    end_date,
                    include_holidays,
                    optimize_preferences,
                    time_limit_ms,
                    actor: actor.to_string(),
                },
                now,
            )
            .await?;

        self.log_action(
            academic_year,
            ActionType::GenerateSchedule,
            actor,
            serde_json::json!({
                "schedule_id": result.schedule_id,
                "status": result.status.to_string(),
                "assignment_count": result.assignment_count,
                "hard_rule_violations": result.hard_rule_violations,
            }),
            format!(
                "生成排班: {} ({} ~ {}), 指派 {} 条",
                academic_year, start_date, end_date, result.assignment_count
            ),
        )?;
        Ok(result)
    }

    /// 查询排班表
    pub fn get_schedule(&self, schedule_id: &str) -> ApiResult<Option<Schedule>> {
        if schedule_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("排班表ID不能为空".to_string()));
        }
        Ok(self.schedule_repo.find_by_id(schedule_id)?)
    }

    /// 查询学年排班表列表 (新→旧)
    pub fn list_schedules(&self, academic_year: &str) -> ApiResult<Vec<Schedule>> {
        Ok(self.schedule_repo.list_by_year(academic_year)?)
    }

    /// 查询排班表的全部指派
    pub fn list_assignments(&self, schedule_id: &str) -> ApiResult<Vec<Assignment>> {
        Ok(self.schedule_repo.list_assignments(schedule_id)?)
    }

    /// 查询排班表的 ACGME 违规 (严重度倒序)
    pub fn list_violations(&self, schedule_id: &str) -> ApiResult<Vec<AcgmeViolation>> {
        Ok(self.schedule_repo.list_violations(schedule_id)?)
    }

    fn log_action(
        &self,
        year_id: &str,
        action_type: ActionType,
        actor: &str,
        payload: serde_json::Value,
        detail: String,
    ) -> ApiResult<()> {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            academic_year: Some(year_id.to_string()),
            action_type,
            action_ts: crate::api::now_ts(),
            actor: actor.to_string(),
            payload_json: Some(payload),
            detail: Some(detail),
        };
        self.action_log_repo.insert(&log)?;
        Ok(())
    }
}
