// ==========================================
// 住院医师排班系统 - 节假日API
// ==========================================
// 职责: 模板定义、学年实例化、主/备指派、总值班覆写、
//       向求解链路输出覆盖需求
// 红线: 指派与覆写全部幂等; 所有写入留痕 action_log
// ==========================================

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::holiday::{
    CoverageRequirement, CoverageUpdate, HolidayCoverageInstance, HolidayDefinition,
};
use crate::domain::types::{AssignmentMethod, CoverageTier, HolidayType, PgyLevel};
use crate::domain::workflow::AcademicYearWorkflow;
use crate::engine::holiday_coverage::HolidayCoverageManager;
use crate::repository::{ActionLogRepository, HolidayRepository, ResidentRepository};

// ==========================================
// HolidayApi - 节假日API
// ==========================================
pub struct HolidayApi {
    holiday_repo: Arc<HolidayRepository>,
    resident_repo: Arc<ResidentRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    manager: HolidayCoverageManager,
}

impl HolidayApi {
    /// 创建新的节假日API实例
    pub fn new(
        holiday_repo: Arc<HolidayRepository>,
        resident_repo: Arc<ResidentRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            holiday_repo,
            resident_repo,
            action_log_repo,
            manager: HolidayCoverageManager::new(),
        }
    }

    // ==========================================
    // 模板定义
    // ==========================================

    /// 定义节假日模板
    pub fn define_holiday(
        &self,
        name: &str,
        holiday_type: HolidayType,
        coverage_required: bool,
        min_pgy_ordinal: u8,
        coverage_tier: CoverageTier,
        actor: &str,
    ) -> ApiResult<String> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("节假日名称不能为空".to_string()));
        }
        let min_pgy_level = PgyLevel::from_ordinal(min_pgy_ordinal)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知 PGY 级别: {}", min_pgy_ordinal)))?;

        let definition = HolidayDefinition {
            definition_id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            holiday_type,
            coverage_required,
            min_pgy_level,
            coverage_tier,
            created_at: crate::api::now_ts(),
        };
        self.holiday_repo.insert_definition(&definition)?;

        self.log_action(
            None,
            ActionType::DefineHoliday,
            actor,
            serde_json::json!({
                "definition_id": definition.definition_id,
                "name": definition.name,
            }),
            format!("定义节假日模板: {}", definition.name),
        )?;
        Ok(definition.definition_id)
    }

    // ==========================================
    // 学年实例化
    // ==========================================

    /// 把模板实例化到学年内的具体日期
    pub fn instantiate_holiday(
        &self,
        definition_id: &str,
        date: NaiveDate,
        academic_year: &str,
        coverage_required: Option<bool>,
        actor: &str,
    ) -> ApiResult<String> {
        let definition = self
            .holiday_repo
            .find_definition(definition_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("HolidayDefinition(id={})不存在", definition_id))
            })?;

        // 日期必须落在学年边界内
        let (year_start, year_end) =
            AcademicYearWorkflow::year_bounds(academic_year).ok_or_else(|| {
                ApiError::InvalidInput(format!("学年ID格式非法: {}", academic_year))
            })?;
        if date < year_start || date > year_end {
            return Err(ApiError::InvalidInput(format!(
                "日期 {} 不在学年 {} 范围内",
                date, academic_year
            )));
        }

        let now = crate::api::now_ts();
        let instance =
            self.manager
                .instantiate(&definition, date, academic_year, coverage_required, now);
        self.holiday_repo.insert_instance(&instance)?;

        self.log_action(
            Some(academic_year),
            ActionType::InstantiateHoliday,
            actor,
            serde_json::json!({
                "instance_id": instance.instance_id,
                "definition_id": definition_id,
                "date": date.to_string(),
            }),
            format!("实例化节假日: {} @ {}", instance.name, date),
        )?;

        info!(instance_id = %instance.instance_id, name = %instance.name, %date, "节假日已实例化");
        Ok(instance.instance_id)
    }

    // ==========================================
    // 指派
    // ==========================================

    /// 人工指派主/备值班 (幂等)
    pub fn assign_coverage(
        &self,
        instance_id: &str,
        primary_id: &str,
        backup_id: Option<&str>,
        method: AssignmentMethod,
        actor: &str,
    ) -> ApiResult<HolidayCoverageInstance> {
        let instance = self.require_instance(instance_id)?;

        let primary = self
            .resident_repo
            .find_by_id(primary_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Resident(id={})不存在", primary_id)))?;
        let backup = backup_id
            .map(|id| {
                self.resident_repo
                    .find_by_id(id)?
                    .ok_or_else(|| ApiError::NotFound(format!("Resident(id={})不存在", id)))
            })
            .transpose()?;

        self.manager
            .validate_assignment(&instance, &primary, backup.as_ref())?;

        let now = crate::api::now_ts();
        match self
            .manager
            .apply_assignment(&instance, primary_id, backup_id, method, now)
        {
            Some(updated) => {
                self.holiday_repo.update_instance(&updated)?;
                self.log_action(
                    Some(&updated.academic_year),
                    ActionType::AssignCoverage,
                    actor,
                    serde_json::json!({
                        "instance_id": instance_id,
                        "primary": primary_id,
                        "backup": backup_id,
                        "method": method.to_string(),
                    }),
                    format!("节假日指派: {} 主值班 {}", updated.name, primary_id),
                )?;
                Ok(updated)
            }
            // 与现存状态一致 → 幂等返回, 不产生新写入
            None => Ok(instance),
        }
    }

    /// 自动指派主/备值班 (最久未承担者优先)
    pub fn auto_assign_coverage(
        &self,
        instance_id: &str,
        actor: &str,
    ) -> ApiResult<HolidayCoverageInstance> {
        let instance = self.require_instance(instance_id)?;
        let residents = self.resident_repo.list_active()?;
        let history = self.holiday_duty_history(&instance)?;

        let (primary_id, backup_id) = self
            .manager
            .auto_select(&instance, &residents, &history)?;

        self.assign_coverage(
            instance_id,
            &primary_id,
            backup_id.as_deref(),
            AssignmentMethod::Auto,
            actor,
        )
    }

    /// 总值班覆写 (命名操作, 幂等)
    pub fn update_instance(
        &self,
        instance_id: &str,
        update: CoverageUpdate,
        actor: &str,
    ) -> ApiResult<HolidayCoverageInstance> {
        let instance = self.require_instance(instance_id)?;

        // 覆写指派时同样要过资格校验
        if let CoverageUpdate::SetCoverageOverride {
            primary_resident_id,
            backup_resident_id,
            ..
        } = &update
        {
            let primary = self
                .resident_repo
                .find_by_id(primary_resident_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Resident(id={})不存在", primary_resident_id))
                })?;
            let backup = backup_resident_id
                .as_deref()
                .map(|id| {
                    self.resident_repo
                        .find_by_id(id)?
                        .ok_or_else(|| ApiError::NotFound(format!("Resident(id={})不存在", id)))
                })
                .transpose()?;
            self.manager
                .validate_assignment(&instance, &primary, backup.as_ref())?;
        }

        let now = crate::api::now_ts();
        match self.manager.apply_update(&instance, &update, now) {
            Some(updated) => {
                self.holiday_repo.update_instance(&updated)?;
                self.log_action(
                    Some(&updated.academic_year),
                    ActionType::UpdateCoverage,
                    actor,
                    serde_json::to_value(&update)
                        .map_err(|e| ApiError::InternalError(e.to_string()))?,
                    format!("节假日覆写: {}", updated.name),
                )?;
                Ok(updated)
            }
            None => Ok(instance),
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询实例
    pub fn get_instance(&self, instance_id: &str) -> ApiResult<Option<HolidayCoverageInstance>> {
        Ok(self.holiday_repo.find_instance(instance_id)?)
    }

    /// 查询学年全部实例
    pub fn list_instances(&self, academic_year: &str) -> ApiResult<Vec<HolidayCoverageInstance>> {
        Ok(self.holiday_repo.list_instances_by_year(academic_year)?)
    }

    /// 向求解链路输出学年覆盖需求 (按日期)
    pub fn csp_requirements(
        &self,
        academic_year: &str,
    ) -> ApiResult<BTreeMap<NaiveDate, CoverageRequirement>> {
        let instances = self.holiday_repo.list_instances_by_year(academic_year)?;
        Ok(self.manager.requirements_map(&instances))
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn require_instance(&self, instance_id: &str) -> ApiResult<HolidayCoverageInstance> {
        if instance_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("实例ID不能为空".to_string()));
        }
        self.holiday_repo.find_instance(instance_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("HolidayCoverageInstance(id={})不存在", instance_id))
        })
    }

    /// 各住院医师最近一次节假日值班日期 (用于最久未承担排序)
    fn holiday_duty_history(
        &self,
        instance: &HolidayCoverageInstance,
    ) -> ApiResult<HashMap<String, NaiveDate>> {
        let mut history: HashMap<String, NaiveDate> = HashMap::new();
        let instances = self
            .holiday_repo
            .list_instances_by_year(&instance.academic_year)?;
        for other in instances {
            if other.instance_id == instance.instance_id {
                continue;
            }
            for resident_id in other
                .primary_resident_id
                .iter()
                .chain(other.backup_resident_id.iter())
            {
                history
                    .entry(resident_id.clone())
                    .and_modify(|latest| *latest = (*latest).max(other.holiday_date))
                    .or_insert(other.holiday_date);
            }
        }
        Ok(history)
    }

    fn log_action(
        &self,
        academic_year: Option<&str>,
        action_type: ActionType,
        actor: &str,
        payload: serde_json::Value,
        detail: String,
    ) -> ApiResult<()> {
        let log = ActionLog {
            action_id: Uuid::new_v4().to_string(),
            academic_year: academic_year.map(String::from),
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
