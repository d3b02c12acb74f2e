// ==========================================
// 住院医师排班系统 - 节假日覆盖管理引擎
// ==========================================
// 职责: 实例化学年节假日、输出覆盖需求、主/备指派策略、
//       总值班命名覆写操作
// 红线: 所有更新操作幂等 —— 重复施加同一更新,存储状态不变
// 指派策略: 主值班从 PGY ≥ 最低级别的池中选取,
//           备班从其余在岗池 (任意级别) 选取且不等于主值班,
//           平票按"最久未承担节假日值班"优先,再按ID字典序
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::holiday::{
    CoverageRequirement, CoverageUpdate, HolidayCoverageInstance, HolidayDefinition,
};
use crate::domain::resident::Resident;
use crate::domain::types::AssignmentMethod;

// ==========================================
// CoverageError - 覆盖指派错误
// ==========================================
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("主值班 {resident_id} 级别 {actual} 低于要求 {required}")]
    IneligiblePrimary {
        resident_id: String,
        actual: String,
        required: String,
    },

    #[error("主值班 {0} 未在岗")]
    InactivePrimary(String),

    #[error("备班 {0} 未在岗")]
    InactiveBackup(String),

    #[error("备班不可与主值班相同: {0}")]
    BackupEqualsPrimary(String),

    #[error("无满足级别要求的可用住院医师: 需要 {required} 及以上")]
    NoEligiblePrimary { required: String },
}

// ==========================================
// HolidayCoverageManager - 节假日覆盖管理引擎
// ==========================================
pub struct HolidayCoverageManager {
    // 无状态引擎,持久化由 API 层负责
}

impl HolidayCoverageManager {
    /// 创建新的节假日覆盖管理引擎
    pub fn new() -> Self {
        Self {}
    }

    // ==========================================
    // 实例化
    // ==========================================

    /// 把模板绑定到学年内的具体日期
    ///
    /// # 参数
    /// - definition: 节假日模板
    /// - date: 当年实际日期
    /// - academic_year: 学年ID
    /// - coverage_required: 覆盖标志 (None 时沿用模板默认)
    pub fn instantiate(
        &self,
        definition: &HolidayDefinition,
        date: NaiveDate,
        academic_year: &str,
        coverage_required: Option<bool>,
        now: NaiveDateTime,
    ) -> HolidayCoverageInstance {
        HolidayCoverageInstance {
            instance_id: Uuid::new_v4().to_string(),
            definition_id: definition.definition_id.clone(),
            academic_year: academic_year.to_string(),
            holiday_date: date,
            name: definition.name.clone(),
            holiday_type: definition.holiday_type,
            coverage_required: coverage_required.unwrap_or(definition.coverage_required),
            min_pgy_level: definition.min_pgy_level,
            coverage_tier: definition.coverage_tier,
            primary_resident_id: None,
            backup_resident_id: None,
            assignment_method: None,
            chief_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ==========================================
    // 覆盖需求输出 (给约束编译器的桥)
    // ==========================================

    /// 按日期输出学年的覆盖需求
    ///
    /// 同日多个实例时,取需求更严者 (要求覆盖优先,级别取高)
    pub fn requirements_map(
        &self,
        instances: &[HolidayCoverageInstance],
    ) -> BTreeMap<NaiveDate, CoverageRequirement> {
        let mut map: BTreeMap<NaiveDate, CoverageRequirement> = BTreeMap::new();
        for instance in instances {
            let requirement = CoverageRequirement {
                instance_id: instance.instance_id.clone(),
                name: instance.name.clone(),
                holiday_type: instance.holiday_type,
                requires_coverage: instance.coverage_required,
                min_pgy_level: instance.min_pgy_level,
                coverage_tier: instance.coverage_tier,
            };
            match map.get_mut(&instance.holiday_date) {
                None => {
                    map.insert(instance.holiday_date, requirement);
                }
                Some(existing) => {
                    let stricter = (requirement.requires_coverage, requirement.min_pgy_level)
                        > (existing.requires_coverage, existing.min_pgy_level);
                    if stricter {
                        *existing = requirement;
                    }
                }
            }
        }
        map
    }

    // ==========================================
    // 指派
    // ==========================================

    /// 校验主/备指派是否满足策略
    pub fn validate_assignment(
        &self,
        instance: &HolidayCoverageInstance,
        primary: &Resident,
        backup: Option<&Resident>,
    ) -> Result<(), CoverageError> {
        if !primary.active {
            return Err(CoverageError::InactivePrimary(primary.resident_id.clone()));
        }
        if primary.pgy_level < instance.min_pgy_level {
            return Err(CoverageError::IneligiblePrimary {
                resident_id: primary.resident_id.clone(),
                actual: primary.pgy_level.to_string(),
                required: instance.min_pgy_level.to_string(),
            });
        }
        if let Some(backup) = backup {
            if !backup.active {
                return Err(CoverageError::InactiveBackup(backup.resident_id.clone()));
            }
            if backup.resident_id == primary.resident_id {
                return Err(CoverageError::BackupEqualsPrimary(backup.resident_id.clone()));
            }
        }
        Ok(())
    }

    /// 施加主/备指派 (幂等)
    ///
    /// # 返回
    /// - Some(updated): 状态有变化,需落库
    /// - None: 与现存状态一致,无需写入
    pub fn apply_assignment(
        &self,
        instance: &HolidayCoverageInstance,
        primary_id: &str,
        backup_id: Option<&str>,
        method: AssignmentMethod,
        now: NaiveDateTime,
    ) -> Option<HolidayCoverageInstance> {
        let unchanged = instance.primary_resident_id.as_deref() == Some(primary_id)
            && instance.backup_resident_id.as_deref() == backup_id
            && instance.assignment_method == Some(method);
        if unchanged {
            debug!(instance_id = %instance.instance_id, "指派与现存状态一致,跳过写入");
            return None;
        }

        let mut updated = instance.clone();
        updated.primary_resident_id = Some(primary_id.to_string());
        updated.backup_resident_id = backup_id.map(String::from);
        updated.assignment_method = Some(method);
        updated.updated_at = now;
        Some(updated)
    }

    /// 自动选择主/备人选
    ///
    /// # 参数
    /// - residents: 候选住院医师 (在岗)
    /// - last_holiday_duty: 各人最近一次节假日值班日期 (无记录 = 从未)
    ///
    /// # 策略
    /// - 主值班: PGY ≥ min_pgy_level 池内, 最久未承担者优先
    /// - 备班: 其余池 (任意级别, 不含主值班), 同序
    pub fn auto_select(
        &self,
        instance: &HolidayCoverageInstance,
        residents: &[Resident],
        last_holiday_duty: &HashMap<String, NaiveDate>,
    ) -> Result<(String, Option<String>), CoverageError> {
        let rank = |resident: &Resident| {
            // None (从未值过) 排最前; 其次最早日期; 平票按ID字典序
            (
                last_holiday_duty.get(&resident.resident_id).copied(),
                resident.resident_id.clone(),
            )
        };

        let mut primary_pool: Vec<&Resident> = residents
            .iter()
            .filter(|r| r.active && r.pgy_level >= instance.min_pgy_level)
            .collect();
        primary_pool.sort_by_key(|r| rank(r));

        let primary = primary_pool
            .first()
            .ok_or_else(|| CoverageError::NoEligiblePrimary {
                required: instance.min_pgy_level.to_string(),
            })?;

        let mut backup_pool: Vec<&Resident> = residents
            .iter()
            .filter(|r| r.active && r.resident_id != primary.resident_id)
            .collect();
        backup_pool.sort_by_key(|r| rank(r));

        Ok((
            primary.resident_id.clone(),
            backup_pool.first().map(|r| r.resident_id.clone()),
        ))
    }

    // ==========================================
    // 总值班命名覆写操作
    // ==========================================

    /// 施加一个命名更新操作 (幂等)
    ///
    /// # 返回
    /// - Some(updated): 状态有变化,需落库
    /// - None: 与现存状态一致
    pub fn apply_update(
        &self,
        instance: &HolidayCoverageInstance,
        update: &CoverageUpdate,
        now: NaiveDateTime,
    ) -> Option<HolidayCoverageInstance> {
        match update {
            CoverageUpdate::SetCoverageRequired { required } => {
                if instance.coverage_required == *required {
                    return None;
                }
                let mut updated = instance.clone();
                updated.coverage_required = *required;
                updated.updated_at = now;
                Some(updated)
            }
            CoverageUpdate::SetNotes { notes } => {
                if instance.chief_notes == *notes {
                    return None;
                }
                let mut updated = instance.clone();
                updated.chief_notes = notes.clone();
                updated.updated_at = now;
                Some(updated)
            }
            CoverageUpdate::SetCoverageOverride {
                primary_resident_id,
                backup_resident_id,
                method,
            } => self.apply_assignment(
                instance,
                primary_resident_id,
                backup_resident_id.as_deref(),
                *method,
                now,
            ),
        }
    }
}

impl Default for HolidayCoverageManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resident::ResidentPreferences;
    use crate::domain::types::{CoverageTier, HolidayType, PgyLevel};

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn make_definition(min_level: PgyLevel) -> HolidayDefinition {
        HolidayDefinition {
            definition_id: "D001".to_string(),
            name: "Thanksgiving".to_string(),
            holiday_type: HolidayType::Federal,
            coverage_required: true,
            min_pgy_level: min_level,
            coverage_tier: CoverageTier::Reduced,
            created_at: ts(),
        }
    }

    fn make_resident(id: &str, level: PgyLevel) -> Resident {
        Resident {
            resident_id: id.to_string(),
            name: format!("Resident {}", id),
            email: format!("{}@hospital.test", id),
            pgy_level: level,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            active: true,
            specializations: vec![],
            preferences: ResidentPreferences::default(),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    #[test]
    fn test_apply_assignment_is_idempotent() {
        let manager = HolidayCoverageManager::new();
        let definition = make_definition(PgyLevel::Pgy3);
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let instance = manager.instantiate(&definition, date, "2025-2026", None, ts());

        let first = manager
            .apply_assignment(&instance, "R001", Some("R002"), AssignmentMethod::Manual, ts())
            .expect("首次指派应产生变更");

        // 同参数重复施加 → 无变更
        let second =
            manager.apply_assignment(&first, "R001", Some("R002"), AssignmentMethod::Manual, ts());
        assert!(second.is_none());
    }

    #[test]
    fn test_auto_select_prefers_least_recently_assigned() {
        let manager = HolidayCoverageManager::new();
        let definition = make_definition(PgyLevel::Pgy3);
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let instance = manager.instantiate(&definition, date, "2025-2026", None, ts());

        let residents = vec![
            make_resident("R001", PgyLevel::Pgy3),
            make_resident("R002", PgyLevel::Pgy4),
            make_resident("R003", PgyLevel::Pgy2),
        ];
        // R001 刚值过节假日, R002 从未
        let mut history = HashMap::new();
        history.insert("R001".to_string(), NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());

        let (primary, backup) = manager
            .auto_select(&instance, &residents, &history)
            .unwrap();
        assert_eq!(primary, "R002");
        // 备班池不含主值班, R003 (从未) 优先于 R001 (值过)
        assert_eq!(backup, Some("R003".to_string()));
    }

    #[test]
    fn test_auto_select_fails_when_no_level_qualifies() {
        let manager = HolidayCoverageManager::new();
        let definition = make_definition(PgyLevel::Pgy3);
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let instance = manager.instantiate(&definition, date, "2025-2026", None, ts());

        // 全员 PGY-2, 无人满足 PGY-3+
        let residents = vec![
            make_resident("R001", PgyLevel::Pgy2),
            make_resident("R002", PgyLevel::Pgy2),
        ];
        let result = manager.auto_select(&instance, &residents, &HashMap::new());
        assert!(matches!(result, Err(CoverageError::NoEligiblePrimary { .. })));
    }

    #[test]
    fn test_validate_assignment_rejects_underlevel_primary() {
        let manager = HolidayCoverageManager::new();
        let definition = make_definition(PgyLevel::Pgy3);
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let instance = manager.instantiate(&definition, date, "2025-2026", None, ts());

        let primary = make_resident("R001", PgyLevel::Pgy2);
        let result = manager.validate_assignment(&instance, &primary, None);
        assert!(matches!(result, Err(CoverageError::IneligiblePrimary { .. })));
    }

    #[test]
    fn test_named_updates_are_idempotent() {
        let manager = HolidayCoverageManager::new();
        let definition = make_definition(PgyLevel::Pgy3);
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let instance = manager.instantiate(&definition, date, "2025-2026", None, ts());

        let update = CoverageUpdate::SetNotes {
            notes: Some("优先安排外科组".to_string()),
        };
        let first = manager.apply_update(&instance, &update, ts()).unwrap();
        assert!(manager.apply_update(&first, &update, ts()).is_none());

        // coverage_required 覆写同理
        let toggle = CoverageUpdate::SetCoverageRequired { required: true };
        assert!(manager.apply_update(&first, &toggle, ts()).is_none());
    }
}
