// ==========================================
// 住院医师排班系统 - 住院医师API
// ==========================================
// 职责: 注册/更新/停用、排班偏好、休假申请、配额进度
// 红线: 住院医师只停用不删除; 所有写入留痕 action_log
// ==========================================

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::quota::QuotaTarget;
use crate::domain::resident::{Resident, ResidentPreferences};
use crate::domain::timeoff::TimeOffRequest;
use crate::domain::types::{PgyLevel, ShiftCategory, TimeOffStatus};
use crate::engine::rule_catalog::RuleCatalog;
use crate::repository::{
    ActionLogRepository, QuotaRepository, ResidentRepository, TimeOffRepository,
};

// ==========================================
// ResidentApi - 住院医师API
// ==========================================
pub struct ResidentApi {
    resident_repo: Arc<ResidentRepository>,
    quota_repo: Arc<QuotaRepository>,
    timeoff_repo: Arc<TimeOffRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ResidentApi {
    /// 创建新的住院医师API实例
    pub fn new(
        resident_repo: Arc<ResidentRepository>,
        quota_repo: Arc<QuotaRepository>,
        timeoff_repo: Arc<TimeOffRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            resident_repo,
            quota_repo,
            timeoff_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 注册与维护
    // ==========================================

    /// 注册住院医师
    ///
    /// # 参数
    /// - name/email: 身份信息 (email 全局唯一)
    /// - pgy_ordinal: PGY 级别序数 (1..=5, 5 含以上)
    /// - start_date: 入项日期
    /// - specializations: 专科方向标签
    ///
    /// # 返回
    /// - Ok(String): 住院医师ID
    pub fn register_resident(
        &self,
        name: &str,
        email: &str,
        pgy_ordinal: u8,
        start_date: NaiveDate,
        specializations: Vec<String>,
        actor: &str,
    ) -> ApiResult<String> {
        // 参数验证
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("姓名不能为空".to_string()));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ApiError::InvalidInput(format!("邮箱格式非法: {}", email)));
        }
        let pgy_level = PgyLevel::from_ordinal(pgy_ordinal)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知 PGY 级别: {}", pgy_ordinal)))?;
        if self.resident_repo.find_by_email(email)?.is_some() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "邮箱已被注册: {}",
                email
            )));
        }

        let now = crate::api::now_ts();
        let resident = Resident {
            resident_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            pgy_level,
            start_date,
            active: true,
            specializations,
            preferences: ResidentPreferences::default(),
            created_at: now,
            updated_at: now,
        };
        self.resident_repo.insert(&resident)?;

        // 按 PGY 默认表派生配额目标
        let quota = RuleCatalog::quotas_for(pgy_level);
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

        self.log_action(
            ActionType::RegisterResident,
            actor,
            serde_json::json!({
                "resident_id": resident.resident_id,
                "pgy_level": pgy_level.to_string(),
            }),
            format!("注册住院医师: {}", resident.name),
        )?;

        info!(resident_id = %resident.resident_id, %pgy_level, "住院医师已注册");
        Ok(resident.resident_id)
    }

    /// 更新住院医师基本信息
    pub fn update_resident(
        &self,
        resident_id: &str,
        name: Option<&str>,
        pgy_ordinal: Option<u8>,
        specializations: Option<Vec<String>>,
        actor: &str,
    ) -> ApiResult<Resident> {
        let mut resident = self.require_resident(resident_id)?;

        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(ApiError::InvalidInput("姓名不能为空".to_string()));
            }
            resident.name = name.trim().to_string();
        }
        if let Some(ordinal) = pgy_ordinal {
            resident.pgy_level = PgyLevel::from_ordinal(ordinal)
                .ok_or_else(|| ApiError::InvalidInput(format!("未知 PGY 级别: {}", ordinal)))?;
        }
        if let Some(specializations) = specializations {
            resident.specializations = specializations;
        }
        resident.updated_at = crate::api::now_ts();
        self.resident_repo.update(&resident)?;

        self.log_action(
            ActionType::UpdateResident,
            actor,
            serde_json::json!({ "resident_id": resident_id }),
            format!("更新住院医师: {}", resident.name),
        )?;
        Ok(resident)
    }

    /// 停用住院医师 (不物理删除)
    pub fn deactivate_resident(&self, resident_id: &str, actor: &str) -> ApiResult<()> {
        let resident = self.require_resident(resident_id)?;
        let now = crate::api::now_ts();
        self.resident_repo.deactivate(resident_id, now)?;

        self.log_action(
            ActionType::DeactivateResident,
            actor,
            serde_json::json!({ "resident_id": resident_id }),
            format!("停用住院医师: {}", resident.name),
        )?;
        Ok(())
    }

    /// 查询住院医师
    pub fn get_resident(&self, resident_id: &str) -> ApiResult<Option<Resident>> {
        if resident_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("住院医师ID不能为空".to_string()));
        }
        Ok(self.resident_repo.find_by_id(resident_id)?)
    }

    /// 查询在岗花名册
    pub fn list_active_residents(&self) -> ApiResult<Vec<Resident>> {
        Ok(self.resident_repo.list_active()?)
    }

    // ==========================================
    // 排班偏好
    // ==========================================

    /// 提交排班偏好 (整体覆盖)
    pub fn submit_preferences(
        &self,
        resident_id: &str,
        preferred_dates: Vec<NaiveDate>,
        avoided_dates: Vec<NaiveDate>,
        notes: Option<String>,
        actor: &str,
    ) -> ApiResult<Resident> {
        let mut resident = self.require_resident(resident_id)?;

        // 同一日期不可同时期望又避开
        if let Some(conflict) = preferred_dates.iter().find(|d| avoided_dates.contains(d)) {
            return Err(ApiError::InvalidInput(format!(
                "日期 {} 同时出现在期望与避开列表",
                conflict
            )));
        }

        resident.preferences = ResidentPreferences {
            preferred_dates,
            avoided_dates,
            notes,
            submitted: true,
        };
        resident.updated_at = crate::api::now_ts();
        self.resident_repo.update(&resident)?;

        self.log_action(
            ActionType::SubmitPreferences,
            actor,
            serde_json::json!({ "resident_id": resident_id }),
            format!("提交排班偏好: {}", resident.name),
        )?;
        Ok(resident)
    }

    // ==========================================
    // 休假申请
    // ==========================================

    /// 提交休假申请
    ///
    /// # 约束
    /// - start <= end
    /// - start 不早于今日
    pub fn request_time_off(
        &self,
        resident_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
        today: NaiveDate,
    ) -> ApiResult<String> {
        let resident = self.require_resident(resident_id)?;
        if !resident.active {
            return Err(ApiError::BusinessRuleViolation(format!(
                "住院医师 {} 已停用, 不可提交休假申请",
                resident_id
            )));
        }
        if start_date > end_date {
            return Err(ApiError::InvalidInput(format!(
                "休假起止日期颠倒: {} > {}",
                start_date, end_date
            )));
        }
        if start_date < today {
            return Err(ApiError::InvalidInput(format!(
                "休假开始日期 {} 早于今日 {}",
                start_date, today
            )));
        }

        let now = crate::api::now_ts();
        let request = TimeOffRequest {
            request_id: Uuid::new_v4().to_string(),
            resident_id: resident_id.to_string(),
            start_date,
            end_date,
            reason,
            status: TimeOffStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        };
        self.timeoff_repo.insert(&request)?;

        self.log_action(
            ActionType::RequestTimeOff,
            &resident.resident_id,
            serde_json::json!({
                "request_id": request.request_id,
                "start_date": start_date.to_string(),
                "end_date": end_date.to_string(),
            }),
            format!("休假申请: {} ~ {}", start_date, end_date),
        )?;
        Ok(request.request_id)
    }

    /// 审批休假申请
    ///
    /// # 参数
    /// - approve: true=批准, false=驳回
    /// - allow_override: 已有终态结论时是否允许覆写 (总值班显式 override)
    pub fn review_time_off(
        &self,
        request_id: &str,
        approve: bool,
        reviewer: &str,
        allow_override: bool,
    ) -> ApiResult<TimeOffRequest> {
        let request = self
            .timeoff_repo
            .find_by_id(request_id)?
            .ok_or_else(|| ApiError::NotFound(format!("休假申请(id={})不存在", request_id)))?;

        if request.status != TimeOffStatus::Pending && !allow_override {
            return Err(ApiError::BusinessRuleViolation(format!(
                "休假申请已有结论 ({}), 覆写需显式 override",
                request.status
            )));
        }

        let status = if approve {
            TimeOffStatus::Approved
        } else {
            TimeOffStatus::Denied
        };
        let now = crate::api::now_ts();
        self.timeoff_repo
            .update_status(request_id, status, reviewer, now)?;

        self.log_action(
            ActionType::ReviewTimeOff,
            reviewer,
            serde_json::json!({
                "request_id": request_id,
                "status": status.to_string(),
                "override": allow_override,
            }),
            format!("休假审批: {} → {}", request_id, status),
        )?;

        self.timeoff_repo
            .find_by_id(request_id)?
            .ok_or_else(|| ApiError::InternalError("审批后读取休假申请失败".to_string()))
    }

    // ==========================================
    // 配额进度
    // ==========================================

    /// 查询配额进度 (读取侧幂等重算后的存量)
    pub fn quota_progress(&self, resident_id: &str) -> ApiResult<Vec<QuotaTarget>> {
        self.require_resident(resident_id)?;
        Ok(self.quota_repo.find_by_resident(resident_id)?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn require_resident(&self, resident_id: &str) -> ApiResult<Resident> {
        if resident_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("住院医师ID不能为空".to_string()));
        }
        self.resident_repo
            .find_by_id(resident_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Resident(id={})不存在", resident_id)))
    }

    fn log_action(
        &self,
        action_type: ActionType,
        actor: &str,
        payload: serde_json::Value,
        detail: String,
    ) -> ApiResult<()> {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            academic_year: None,
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
