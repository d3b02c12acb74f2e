// ==========================================
// 节假日 API 集成测试
// ==========================================
// 测试目标: 模板/实例/指派/覆写的操作契约
// 覆盖范围: 指派幂等、自动指派轮转、级别门槛、命名覆写、覆盖需求输出
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use residency_roster::api::ApiError;
use residency_roster::domain::holiday::CoverageUpdate;
use residency_roster::domain::types::{
    AssignmentMethod, CoverageTier, HolidayType, PgyLevel,
};
use test_helpers::{create_test_app, register_roster, year_start, TEST_YEAR};

fn define_and_instantiate(
    app: &residency_roster::app::AppState,
    min_pgy: u8,
    date: NaiveDate,
) -> (String, String) {
    let definition_id = app
        .holiday_api
        .define_holiday(
            "Thanksgiving",
            HolidayType::Federal,
            true,
            min_pgy,
            CoverageTier::Reduced,
            "chief",
        )
        .unwrap();
    let instance_id = app
        .holiday_api
        .instantiate_holiday(&definition_id, date, TEST_YEAR, None, "chief")
        .unwrap();
    (definition_id, instance_id)
}

#[test]
fn test_instantiate_rejects_date_outside_academic_year() {
    let (_tmp, app) = create_test_app().unwrap();
    let definition_id = app
        .holiday_api
        .define_holiday("Christmas", HolidayType::Federal, true, 2, CoverageTier::Full, "chief")
        .unwrap();

    let result = app.holiday_api.instantiate_holiday(
        &definition_id,
        NaiveDate::from_ymd_opt(2027, 12, 25).unwrap(),
        TEST_YEAR,
        None,
        "chief",
    );
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

/// 幂等性: 同参数重复指派, 存储状态完全一致 (含 updated_at)
#[test]
fn test_assign_coverage_is_idempotent() {
    let (_tmp, app) = create_test_app().unwrap();
    let ids = register_roster(&app, &[(2, 3)], year_start()).unwrap();
    let (_, instance_id) =
        define_and_instantiate(&app, 3, NaiveDate::from_ymd_opt(2025, 11, 27).unwrap());

    let first = app
        .holiday_api
        .assign_coverage(&instance_id, &ids[0], Some(&ids[1]), AssignmentMethod::Manual, "chief")
        .unwrap();
    let second = app
        .holiday_api
        .assign_coverage(&instance_id, &ids[0], Some(&ids[1]), AssignmentMethod::Manual, "chief")
        .unwrap();

    assert_eq!(first.primary_resident_id, second.primary_resident_id);
    assert_eq!(first.backup_resident_id, second.backup_resident_id);
    assert_eq!(first.updated_at, second.updated_at);

    // 落库状态与返回一致
    let stored = app.holiday_api.get_instance(&instance_id).unwrap().unwrap();
    assert_eq!(stored.updated_at, first.updated_at);
    assert_eq!(stored.primary_resident_id.as_deref(), Some(ids[0].as_str()));
}

/// 级别门槛: 主值班低于 min_pgy_level 被拒, 不会指派不合格人选
#[test]
fn test_assign_rejects_underlevel_primary() {
    let (_tmp, app) = create_test_app().unwrap();
    let ids = register_roster(&app, &[(2, 2)], year_start()).unwrap();
    let (_, instance_id) =
        define_and_instantiate(&app, 3, NaiveDate::from_ymd_opt(2025, 11, 27).unwrap());

    let result = app.holiday_api.assign_coverage(
        &instance_id,
        &ids[0],
        Some(&ids[1]),
        AssignmentMethod::Manual,
        "chief",
    );
    assert!(matches!(result, Err(ApiError::ValidationError(_))));

    // 自动指派同样上报不可满足
    let result = app.holiday_api.auto_assign_coverage(&instance_id, "chief");
    assert!(matches!(result, Err(ApiError::ValidationError(_))));

    let stored = app.holiday_api.get_instance(&instance_id).unwrap().unwrap();
    assert!(stored.primary_resident_id.is_none());
}

/// 自动指派: 最久未承担节假日值班者优先
#[test]
fn test_auto_assign_rotates_by_holiday_history() {
    let (_tmp, app) = create_test_app().unwrap();
    let ids = register_roster(&app, &[(3, 3)], year_start()).unwrap();

    let (definition_id, thanksgiving_id) =
        define_and_instantiate(&app, 3, NaiveDate::from_ymd_opt(2025, 11, 27).unwrap());
    let christmas_id = app
        .holiday_api
        .instantiate_holiday(
            &definition_id,
            NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
            TEST_YEAR,
            None,
            "chief",
        )
        .unwrap();

    // 感恩节先人工指派给 ids[0]/ids[1]
    app.holiday_api
        .assign_coverage(
            &thanksgiving_id,
            &ids[0],
            Some(&ids[1]),
            AssignmentMethod::Manual,
            "chief",
        )
        .unwrap();

    // 圣诞自动指派 → 主值班必须是从未承担过的 ids[2]
    let christmas = app
        .holiday_api
        .auto_assign_coverage(&christmas_id, "chief")
        .unwrap();
    assert_eq!(christmas.primary_resident_id.as_deref(), Some(ids[2].as_str()));
    assert_eq!(christmas.assignment_method, Some(AssignmentMethod::Auto));
    assert_ne!(christmas.backup_resident_id, christmas.primary_resident_id);
}

/// 命名覆写操作: 各自幂等, 覆写指派仍过资格校验
#[test]
fn test_named_update_operations() {
    let (_tmp, app) = create_test_app().unwrap();
    let ids = register_roster(&app, &[(2, 3)], year_start()).unwrap();
    let (_, instance_id) =
        define_and_instantiate(&app, 3, NaiveDate::from_ymd_opt(2025, 11, 27).unwrap());

    // SetNotes 幂等
    let update = CoverageUpdate::SetNotes {
        notes: Some("优先安排外科组".to_string()),
    };
    let first = app
        .holiday_api
        .update_instance(&instance_id, update.clone(), "chief")
        .unwrap();
    let second = app
        .holiday_api
        .update_instance(&instance_id, update, "chief")
        .unwrap();
    assert_eq!(first.updated_at, second.updated_at);
    assert_eq!(second.chief_notes.as_deref(), Some("优先安排外科组"));

    // SetCoverageRequired 覆写
    let toggled = app
        .holiday_api
        .update_instance(
            &instance_id,
            CoverageUpdate::SetCoverageRequired { required: false },
            "chief",
        )
        .unwrap();
    assert!(!toggled.coverage_required);

    // SetCoverageOverride 覆写指派
    let overridden = app
        .holiday_api
        .update_instance(
            &instance_id,
            CoverageUpdate::SetCoverageOverride {
                primary_resident_id: ids[0].clone(),
                backup_resident_id: Some(ids[1].clone()),
                method: AssignmentMethod::Manual,
            },
            "chief",
        )
        .unwrap();
    assert_eq!(overridden.primary_resident_id.as_deref(), Some(ids[0].as_str()));
}

/// 覆盖需求输出: 按日期给出 {名称, 类型, 是否覆盖, 最低级别}
#[test]
fn test_csp_requirements_bridge() {
    let (_tmp, app) = create_test_app().unwrap();
    register_roster(&app, &[(1, 4)], year_start()).unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
    define_and_instantiate(&app, 3, date);

    let requirements = app.holiday_api.csp_requirements(TEST_YEAR).unwrap();
    assert_eq!(requirements.len(), 1);
    let requirement = requirements.get(&date).unwrap();
    assert_eq!(requirement.name, "Thanksgiving");
    assert!(requirement.requires_coverage);
    assert_eq!(requirement.min_pgy_level, PgyLevel::Pgy3);
}
