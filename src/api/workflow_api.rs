// ==========================================
// 住院医师排班系统 - 学年工作流API
// ==========================================
// 职责: 学年创建、状态推进、状态报告
// 红线: 状态转换只经由编排器的转换表, API 不自行改状态
// ==========================================

use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::SchedulingConfigReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::PgyLevel;
use crate::domain::workflow::{AcademicYearWorkflow, WorkflowStatusReport};
use crate::engine::orchestrator::WorkflowOrchestrator;
use crate::repository::ActionLogRepository;

// ==========================================
// WorkflowApi - 学年工作流API
// ==========================================
pub struct WorkflowApi<C>
where
    C: SchedulingConfigReader,
{
    orchestrator: Arc<WorkflowOrchestrator<C>>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl<C> WorkflowApi<C>
where
    C: SchedulingConfigReader,
{
    /// 创建新的工作流API实例
    pub fn new(
        orchestrator: Arc<WorkflowOrchestrator<C>>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            orchestrator,
            action_log_repo,
        }
    }

    /// 创建学年
    ///
    /// # 参数
    /// - year_id: "YYYY-YYYY"
    /// - required_resident_count: 要求住院医师人数
    /// - required_pgy_ordinals: 要求覆盖的 PGY 级别序数
    ///
    /// # 返回
    /// - Ok((workflow, next_step)): 工作流记录与下一步
    pub fn create_academic_year(
        &self,
        year_id: &str,
        required_resident_count: i32,
        required_pgy_ordinals: Vec<u8>,
        actor: &str,
    ) -> ApiResult<WorkflowStatusReport> {
        let levels: Vec<PgyLevel> = required_pgy_ordinals
            .into_iter()
            .map(|ordinal| {
                PgyLevel::from_ordinal(ordinal)
                    .ok_or_else(|| ApiError::InvalidInput(format!("未知 PGY 级别: {}", ordinal)))
            })
            .collect::<ApiResult<Vec<_>>>()?;

        let now = crate::api::now_ts();
        let workflow =
            self.orchestrator
                .create_academic_year(year_id, required_resident_count, levels, now)?;

        self.log_action(
            year_id,
            ActionType::CreateAcademicYear,
            actor,
            serde_json::json!({
                "year_id": year_id,
                "required_resident_count": required_resident_count,
            }),
            format!("创建学年: {}", year_id),
        )?;

        Ok(self.orchestrator.validate(&workflow.year_id)?)
    }

    /// 查询工作流状态 (完成度、下一步、就绪标志、阻碍原因)
    ///
    /// 纯重算, 可随时调用
    pub fn get_workflow_status(&self, year_id: &str) -> ApiResult<WorkflowStatusReport> {
        if year_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("学年ID不能为空".to_string()));
        }
        Ok(self.orchestrator.validate(year_id)?)
    }

    /// 推进工作流到下一状态
    pub fn advance_workflow(&self, year_id: &str, actor: &str) -> ApiResult<AcademicYearWorkflow> {
        let now = crate::api::now_ts();
        let workflow = self.orchestrator.advance(year_id, now)?;

        self.log_action(
            year_id,
            ActionType::AdvanceWorkflow,
            actor,
            serde_json::json!({
                "year_id": year_id,
                "state": workflow.state.to_string(),
            }),
            format!("工作流推进: {} → {}", year_id, workflow.state),
        )?;
        Ok(workflow)
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
