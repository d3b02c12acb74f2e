// ==========================================
// 住院医师排班系统 - 学年工作流编排器
// ==========================================
// 职责:
// 1. 学年生命周期状态机 (转换表 + 守卫函数, 每步可独立测试)
// 2. 排班生成主流程: 约束编译 → CSP 求解 → 合规评估 → 整批落库
// 红线:
// - 发布永不绕过合规链路: hard_rule_violations == 0 才可发布
// - 同一学年的生成请求串行化 (逐学年逻辑锁)
// - 一次求解的产物单事务落库, 失败整体回滚
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::SchedulingConfigReader;
use crate::domain::holiday::HolidayCoverageInstance;
use crate::domain::quota::QuotaTarget;
use crate::domain::schedule::{Assignment, Schedule};
use crate::domain::types::{
    AssignmentMethod, PgyLevel, ScheduleStatus, ShiftCategory, SolveStatus, WorkflowState,
};
use crate::domain::violation::AcgmeViolation;
use crate::domain::workflow::{AcademicYearWorkflow, WorkflowStatusReport};
use crate::engine::compliance::{ComplianceEngine, DutyHourPolicy};
use crate::engine::constraint_compiler::{
    CompileInput, ConstraintCompiler, ConstraintError, ConstraintSet,
};
use crate::engine::csp_solver::{
    CspSolver, ObjectiveWeights, SolveStats, SolvedPlacement, UnfillableSlot,
};
use crate::engine::holiday_coverage::HolidayCoverageManager;
use crate::engine::rule_catalog::{RuleCatalog, RuleContext};
use crate::repository::error::RepositoryError;
use crate::repository::{
    HolidayRepository, QuotaRepository, ResidentRepository, ScheduleRepository, TimeOffRepository,
    WorkflowRepository,
};

// ==========================================
// OrchestratorError - 编排器错误
// ==========================================
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("无效的状态转换: from={from} to={to}: {reasons:?}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
        reasons: Vec<String>,
    },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

// ==========================================
// GenerateScheduleParams / GenerateScheduleResult
// ==========================================

/// 排班生成参数
#[derive(Debug, Clone)]
pub struct GenerateScheduleParams {
    pub academic_year: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub include_holidays: bool,
    pub optimize_preferences: bool,
    pub time_limit_ms: Option<u64>, // None = 用配置默认
    pub actor: String,
}

/// 排班生成结果 (结构化返回, 不抛不透明错误)
#[derive(Debug, Serialize)]
pub struct GenerateScheduleResult {
    pub schedule_id: String,
    pub success: bool,
    pub status: SolveStatus,
    pub assignment_count: usize,
    pub holiday_requirements_processed: usize,
    pub constraint_errors: Vec<ConstraintError>,
    pub unfillable_slots: Vec<UnfillableSlot>,
    pub hard_rule_violations: i32,
    pub soft_rule_cost: i64,
    pub acgme_violation_count: usize,
    pub stats: SolveStats,
}

// ==========================================
// WorkflowOrchestrator - 学年工作流编排器
// ==========================================
pub struct WorkflowOrchestrator<C>
where
    C: SchedulingConfigReader,
{
    config: Arc<C>,
    workflow_repo: Arc<WorkflowRepository>,
    resident_repo: Arc<ResidentRepository>,
    timeoff_repo: Arc<TimeOffRepository>,
    holiday_repo: Arc<HolidayRepository>,
    schedule_repo: Arc<ScheduleRepository>,
    quota_repo: Arc<QuotaRepository>,
    holiday_manager: HolidayCoverageManager,
    compiler: ConstraintCompiler,
    solver: CspSolver,
    compliance: ComplianceEngine,
    // 逐学年逻辑锁: 串行化同学年的生成请求
    year_locks: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<C> WorkflowOrchestrator<C>
where
    C: SchedulingConfigReader,
{
    /// 创建新的编排器实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<C>,
        workflow_repo: Arc<WorkflowRepository>,
        resident_repo: Arc<ResidentRepository>,
        timeoff_repo: Arc<TimeOffRepository>,
        holiday_repo: Arc<HolidayRepository>,
        schedule_repo: Arc<ScheduleRepository>,
        quota_repo: Arc<QuotaRepository>,
    ) -> Self {
        Self {
            config,
            workflow_repo,
            resident_repo,
            timeoff_repo,
            holiday_repo,
            schedule_repo,
            quota_repo,
            holiday_manager: HolidayCoverageManager::new(),
            compiler: ConstraintCompiler::new(),
            solver: CspSolver::new(),
            compliance: ComplianceEngine::new(),
            year_locks: AsyncMutex::new(HashMap::new()),
        }
    }

    // ==========================================
    // 学年创建
    // ==========================================

    /// 创建学年工作流记录
    pub fn create_academic_year(
        &self,
        year_id: &str,
        required_resident_count: i32,
        required_pgy_levels: Vec<PgyLevel>,
        now: NaiveDateTime,
    ) -> OrchestratorResult<AcademicYearWorkflow> {
        let (year_start, year_end) = AcademicYearWorkflow::year_bounds(year_id).ok_or_else(|| {
            OrchestratorError::Validation(format!("学年ID格式非法 (应为 YYYY-YYYY): {}", year_id))
        })?;
        if required_resident_count <= 0 {
            return Err(OrchestratorError::Validation(
                "要求住院医师人数必须为正".to_string(),
            ));
        }

        let workflow = AcademicYearWorkflow {
            year_id: year_id.to_string(),
            state: WorkflowState::Created,
            year_start,
            year_end,
            required_resident_count,
            required_pgy_levels,
            completion_pct: 0.0,
            created_at: now,
            updated_at: now,
        };
        self.workflow_repo.insert(&workflow)?;
        info!(year_id, "学年工作流已创建");
        Ok(workflow)
    }

    // ==========================================
    // 状态机: 守卫 + 转换
    // ==========================================

    /// 计算进入 target 状态的守卫失败原因 (空 = 可进入)
    ///
    /// 纯重算, 不改任何状态, 可随时调用
    pub fn guard_errors(
        &self,
        workflow: &AcademicYearWorkflow,
        target: WorkflowState,
    ) -> OrchestratorResult<Vec<String>> {
        let mut errors = Vec::new();
        match target {
            WorkflowState::Created => {}
            WorkflowState::ResidentsRegistered | WorkflowState::ReadyForSchedule => {
                // 人数与级别分布要求
                let active = self.resident_repo.list_active()?;
                if (active.len() as i32) < workflow.required_resident_count {
                    errors.push(format!(
                        "在岗住院医师 {} 人, 少于要求的 {} 人",
                        active.len(),
                        workflow.required_resident_count
                    ));
                }
                for level in &workflow.required_pgy_levels {
                    if !active.iter().any(|r| r.pgy_level == *level) {
                        errors.push(format!("缺少 {} 级别的在岗住院医师", level));
                    }
                }
            }
            WorkflowState::HolidaysConfigured => {
                // 无节假日实例是合法的 (排班区间可以不含节假日);
                // 只要求已实例化的覆盖需求在当前花名册下可满足
                let instances = self.holiday_repo.list_instances_by_year(&workflow.year_id)?;
                let active = self.resident_repo.list_active()?;
                let max_level = active.iter().map(|r| r.pgy_level).max();
                for instance in instances.iter().filter(|i| i.coverage_required) {
                    let satisfiable = max_level.map(|l| l >= instance.min_pgy_level).unwrap_or(false);
                    if !satisfiable {
                        errors.push(format!(
                            "节假日 {} ({}) 要求 {} 及以上, 当前花名册无人满足",
                            instance.name, instance.holiday_date, instance.min_pgy_level
                        ));
                    }
                }
            }
            WorkflowState::PreferencesCollected => {
                let active = self.resident_repo.list_active()?;
                let missing: Vec<&str> = active
                    .iter()
                    .filter(|r| !r.preferences.submitted)
                    .map(|r| r.resident_id.as_str())
                    .collect();
                if !missing.is_empty() {
                    errors.push(format!("{} 名住院医师未提交排班偏好", missing.len()));
                }
            }
            WorkflowState::ScheduleGenerated => {
                let has_assignments = self
                    .schedule_repo
                    .list_by_year(&workflow.year_id)?
                    .iter()
                    .any(|s| s.total_assignments > 0);
                if !has_assignments {
                    errors.push("尚未生成任何带指派的排班表".to_string());
                }
            }
            WorkflowState::Published => {
                match self.latest_schedule(&workflow.year_id)? {
                    None => errors.push("尚无可发布的排班表".to_string()),
                    Some(schedule) => {
                        if schedule.hard_rule_violations > 0 {
                            errors.push(format!(
                                "排班表存在 {} 条硬规则违规, 不可发布",
                                schedule.hard_rule_violations
                            ));
                        }
                        // coverage_required 实例必须全部完成合格指派
                        let instances = self
                            .holiday_repo
                            .list_instances_in_range(schedule.start_date, schedule.end_date)?;
                        for instance in instances.iter().filter(|i| i.coverage_required) {
                            match self.primary_is_eligible(instance)? {
                                true => {}
                                false => errors.push(format!(
                                    "节假日 {} ({}) 未完成合格的主值班指派",
                                    instance.name, instance.holiday_date
                                )),
                            }
                        }
                    }
                }
            }
        }
        Ok(errors)
    }

    fn primary_is_eligible(
        &self,
        instance: &HolidayCoverageInstance,
    ) -> OrchestratorResult<bool> {
        let Some(primary_id) = &instance.primary_resident_id else {
            return Ok(false);
        };
        let Some(primary) = self.resident_repo.find_by_id(primary_id)? else {
            return Ok(false);
        };
        Ok(primary.active && primary.pgy_level >= instance.min_pgy_level)
    }

    /// 工作流状态报告 (完成度 + 下一步 + 阻碍原因)
    pub fn validate(&self, year_id: &str) -> OrchestratorResult<WorkflowStatusReport> {
        let workflow = self.load_workflow(year_id)?;
        let next_step = workflow.state.next();
        let validation_errors = match next_step {
            Some(target) => self.guard_errors(&workflow, target)?,
            None => Vec::new(),
        };
        Ok(WorkflowStatusReport {
            year_id: workflow.year_id.clone(),
            state: workflow.state,
            completion_pct: completion_pct(workflow.state),
            next_step,
            ready_for_next: next_step.is_some() && validation_errors.is_empty(),
            validation_errors,
        })
    }

    /// 推进到下一状态 (守卫不满足即拒绝)
    #[instrument(skip(self, now))]
    pub fn advance(&self, year_id: &str, now: NaiveDateTime) -> OrchestratorResult<AcademicYearWorkflow> {
        let mut workflow = self.load_workflow(year_id)?;
        let target = workflow.state.next().ok_or_else(|| {
            OrchestratorError::Validation(format!("学年 {} 已处于终态 PUBLISHED", year_id))
        })?;

        let reasons = self.guard_errors(&workflow, target)?;
        if !reasons.is_empty() {
            return Err(OrchestratorError::InvalidTransition {
                from: workflow.state,
                to: target,
                reasons,
            });
        }

        // 发布转换附带排班表激活 (先归档旧表)
        if target == WorkflowState::Published {
            if let Some(schedule) = self.latest_schedule(year_id)? {
                self.schedule_repo.archive_active_by_year(year_id, now)?;
                self.schedule_repo
                    .update_status(&schedule.schedule_id, ScheduleStatus::Active, now)?;
                info!(year_id, schedule_id = %schedule.schedule_id, "排班表已激活");
            }
        }

        workflow.state = target;
        workflow.completion_pct = completion_pct(target);
        workflow.updated_at = now;
        self.workflow_repo.update(&workflow)?;
        info!(year_id, state = %workflow.state, "工作流已推进");
        Ok(workflow)
    }

    // ==========================================
    // 排班生成主流程
    // ==========================================

    /// 生成排班 (同学年请求串行化)
    ///
    /// 流程: 加载 → 编译 → 求解 → 合规 → 单事务落库 → 配额重算
    ///
    /// 约束编译错误与求解超时都不抛错, 而是作为结构化结果返回;
    /// 排班表以草稿留存, 硬规则违规数决定后续能否发布
    #[instrument(skip(self, params), fields(
        academic_year = %params.academic_year,
        start_date = %params.start_date,
        end_date = %params.end_date
    ))]
    pub async fn generate_schedule(
        &self,
        params: GenerateScheduleParams,
        now: NaiveDateTime,
    ) -> OrchestratorResult<GenerateScheduleResult> {
        let lock = self.year_lock(&params.academic_year).await;
        let _guard = lock.lock().await;

        let workflow = self.load_workflow(&params.academic_year)?;
        if workflow.state < WorkflowState::ReadyForSchedule {
            return Err(OrchestratorError::Validation(format!(
                "工作流状态 {} 不允许生成排班 (需先到达 READY_FOR_SCHEDULE)",
                workflow.state
            )));
        }
        if params.start_date > params.end_date {
            return Err(OrchestratorError::Validation(
                "起始日期不得晚于结束日期".to_string(),
            ));
        }

        // ===== 1. 加载输入 =====
        let residents = self.resident_repo.list_active()?;
        let time_off = self
            .timeoff_repo
            .list_approved_overlapping(params.start_date, params.end_date)?;
        let instances = if params.include_holidays {
            self.holiday_repo
                .list_instances_by_year(&params.academic_year)?
                .into_iter()
                .filter(|i| i.holiday_date >= params.start_date && i.holiday_date <= params.end_date)
                .collect()
        } else {
            Vec::new()
        };
        let holiday_requirements = self.holiday_manager.requirements_map(&instances);

        // ===== 2. 配置读取 =====
        let orientation_window_days = self.cfg(self.config.get_orientation_window_days().await)?;
        let pgy2_moonlight_cutoff =
            self.cfg(self.config.get_pgy2_moonlight_cutoff(workflow.year_start).await)?;
        let balance_weight = self.cfg(self.config.get_workload_balance_weight().await)?;
        let preference_weight = if params.optimize_preferences {
            self.cfg(self.config.get_preference_weight().await)?
        } else {
            0
        };
        let time_limit_ms = match params.time_limit_ms {
            Some(ms) => ms,
            None => self.cfg(self.config.get_solver_time_limit_ms().await)?,
        };
        let policy = DutyHourPolicy {
            weekly_hour_cap: self.cfg(self.config.get_weekly_hour_cap().await)?,
            consecutive_hour_cap: self.cfg(self.config.get_consecutive_hour_cap().await)?,
            wind_down_hours: self.cfg(self.config.get_wind_down_hours().await)?,
            min_rest_hours: self.cfg(self.config.get_min_rest_hours().await)?,
            days_off_window: self.cfg(self.config.get_days_off_window().await)?,
        };

        // ===== 3. 约束编译 =====
        let compile_outcome = self.compiler.compile(&CompileInput {
            residents: &residents,
            range: (params.start_date, params.end_date),
            time_off: &time_off,
            holiday_requirements: &holiday_requirements,
            year_start: workflow.year_start,
            orientation_window_days,
            pgy2_moonlight_cutoff,
            include_moonlight: true,
        });
        if !compile_outcome.errors.is_empty() {
            warn!(
                errors = compile_outcome.errors.len(),
                "约束编译发现不可覆盖槽位"
            );
        }

        // ===== 4. CSP 求解 =====
        let catalog = RuleCatalog::standard(balance_weight, preference_weight);
        let weights = ObjectiveWeights {
            workload_balance: balance_weight,
            preference: preference_weight,
        };
        let solve_outcome = self.solver.solve(
            &compile_outcome.set,
            &catalog,
            &weights,
            StdDuration::from_millis(time_limit_ms),
        );

        // ===== 5. 硬规则计数 + 软成本 + 合规评估 =====
        let schedule_id = Uuid::new_v4().to_string();
        let mut schedule = Schedule {
            schedule_id: schedule_id.clone(),
            academic_year: params.academic_year.clone(),
            start_date: params.start_date,
            end_date: params.end_date,
            algorithm: "CSP_BACKTRACKING_V1".to_string(),
            status: ScheduleStatus::Draft,
            hard_rule_violations: 0,
            soft_rule_cost: 0,
            total_assignments: solve_outcome.placements.len() as i32,
            config_snapshot_json: Some(
                serde_json::json!({
                    "orientation_window_days": orientation_window_days,
                    "pgy2_moonlight_cutoff": pgy2_moonlight_cutoff.to_string(),
                    "workload_balance_weight": balance_weight,
                    "preference_weight": preference_weight,
                    "time_limit_ms": time_limit_ms,
                    "weekly_hour_cap": policy.weekly_hour_cap,
                    "consecutive_hour_cap": policy.consecutive_hour_cap,
                    "wind_down_hours": policy.wind_down_hours,
                    "min_rest_hours": policy.min_rest_hours,
                    "days_off_window": policy.days_off_window,
                })
                .to_string(),
            ),
            created_at: now,
            updated_at: now,
        };

        let hard_violations = self.count_hard_violations(
            &compile_outcome.set,
            &solve_outcome.placements,
            &catalog,
            (params.start_date, params.end_date),
        );
        schedule.hard_rule_violations = hard_violations as i32;
        schedule.soft_rule_cost = self.compute_soft_cost(
            &compile_outcome.set,
            &solve_outcome.placements,
            &catalog,
            (params.start_date, params.end_date),
        );

        let assignments: Vec<Assignment> = solve_outcome
            .placements
            .iter()
            .map(|p| {
                Assignment::new(
                    Uuid::new_v4().to_string(),
                    schedule_id.clone(),
                    p.resident_id.clone(),
                    p.date,
                    p.category,
                    now,
                )
            })
            .collect();
        let acgme_violations: Vec<AcgmeViolation> =
            self.compliance.evaluate(&schedule, &assignments, &policy);

        // ===== 6. 单事务落库 + 配额重算 =====
        self.schedule_repo.insert(&schedule)?;
        self.schedule_repo
            .commit_solve_batch(&schedule, &assignments, &acgme_violations)?;
        self.ensure_quota_targets(&residents)?;
        self.quota_repo.refresh_completed_from_schedule(&schedule_id)?;

        // ===== 7. 节假日实例回写 (求解器落位 → 实例指派) =====
        let processed = self.writeback_holiday_assignments(
            &instances,
            &solve_outcome.placements,
            now,
        )?;

        // ===== 8. 工作流推进 =====
        if workflow.state == WorkflowState::ReadyForSchedule
            && !solve_outcome.placements.is_empty()
        {
            let mut updated = workflow.clone();
            updated.state = WorkflowState::ScheduleGenerated;
            updated.completion_pct = completion_pct(updated.state);
            updated.updated_at = now;
            self.workflow_repo.update(&updated)?;
        }

        let success = compile_outcome.errors.is_empty()
            && solve_outcome.status == SolveStatus::Complete
            && schedule.hard_rule_violations == 0;

        info!(
            schedule_id = %schedule_id,
            status = %solve_outcome.status,
            assignments = assignments.len(),
            hard_violations = schedule.hard_rule_violations,
            acgme_violations = acgme_violations.len(),
            "排班生成完成"
        );

        Ok(GenerateScheduleResult {
            schedule_id,
            success,
            status: solve_outcome.status,
            assignment_count: assignments.len(),
            holiday_requirements_processed: processed,
            constraint_errors: compile_outcome.errors,
            unfillable_slots: solve_outcome.unfillable,
            hard_rule_violations: schedule.hard_rule_violations,
            soft_rule_cost: schedule.soft_rule_cost,
            acgme_violation_count: acgme_violations.len(),
            stats: solve_outcome.stats,
        })
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn cfg<T>(&self, result: Result<T, Box<dyn std::error::Error>>) -> OrchestratorResult<T> {
        result.map_err(|e| OrchestratorError::Config(e.to_string()))
    }

    fn load_workflow(&self, year_id: &str) -> OrchestratorResult<AcademicYearWorkflow> {
        self.workflow_repo
            .find_by_id(year_id)?
            .ok_or_else(|| OrchestratorError::Validation(format!("学年 {} 不存在", year_id)))
    }

    fn latest_schedule(&self, year_id: &str) -> OrchestratorResult<Option<Schedule>> {
        Ok(self.schedule_repo.list_by_year(year_id)?.into_iter().next())
    }

    async fn year_lock(&self, year_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.year_locks.lock().await;
        locks
            .entry(year_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn count_hard_violations(
        &self,
        set: &ConstraintSet,
        placements: &[SolvedPlacement],
        catalog: &RuleCatalog,
        range: (NaiveDate, NaiveDate),
    ) -> usize {
        let mut ctx = RuleContext::new(
            &set.residents,
            set.year_start,
            set.orientation_window_days,
            set.pgy2_moonlight_cutoff,
        );
        for p in placements {
            ctx.place(&p.resident_id, p.date, p.category);
        }
        catalog.hard_violations(&ctx, range).len()
    }

    fn compute_soft_cost(
        &self,
        set: &ConstraintSet,
        placements: &[SolvedPlacement],
        catalog: &RuleCatalog,
        range: (NaiveDate, NaiveDate),
    ) -> i64 {
        let mut ctx = RuleContext::new(
            &set.residents,
            set.year_start,
            set.orientation_window_days,
            set.pgy2_moonlight_cutoff,
        );
        for p in placements {
            ctx.place(&p.resident_id, p.date, p.category);
        }
        catalog.soft_cost(&ctx, range)
    }

    /// 注册缺失的配额目标行 (按 PGY 默认表派生)
    fn ensure_quota_targets(&self, residents: &[crate::domain::resident::Resident]) -> OrchestratorResult<()> {
        for resident in residents {
            let quota = RuleCatalog::quotas_for(resident.pgy_level);
            let targets: Vec<QuotaTarget> = ShiftCategory::ALL
                .iter()
                .map(|category| QuotaTarget {
                    resident_id: resident.resident_id.clone(),
                    category: *category,
                    target_count: quota.target_for(*category),
                    completed_count: 0,
                })
                .collect();
            self.quota_repo.insert_targets(&targets)?;
        }
        Ok(())
    }

    /// 把求解器的节假日落位回写到未指派的实例上
    fn writeback_holiday_assignments(
        &self,
        instances: &[HolidayCoverageInstance],
        placements: &[SolvedPlacement],
        now: NaiveDateTime,
    ) -> OrchestratorResult<usize> {
        let mut processed = 0usize;
        for instance in instances.iter().filter(|i| i.coverage_required) {
            processed += 1;
            if instance.is_assigned() {
                continue;
            }
            let placed = placements.iter().find(|p| {
                p.category == ShiftCategory::HolidayCall && p.date == instance.holiday_date
            });
            if let Some(placement) = placed {
                if let Some(updated) = self.holiday_manager.apply_assignment(
                    instance,
                    &placement.resident_id,
                    None,
                    AssignmentMethod::Auto,
                    now,
                ) {
                    self.holiday_repo.update_instance(&updated)?;
                }
            }
        }
        Ok(processed)
    }
}

/// 完成度: 已通过的转换数 / 总转换数 (6)
fn completion_pct(state: WorkflowState) -> f64 {
    (state.step_index() as f64 / 6.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_pct_ladder() {
        assert_eq!(completion_pct(WorkflowState::Created), 0.0);
        assert!((completion_pct(WorkflowState::ReadyForSchedule) - 66.666).abs() < 0.1);
        assert_eq!(completion_pct(WorkflowState::Published), 100.0);
    }
}
