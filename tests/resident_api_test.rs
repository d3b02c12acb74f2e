// ==========================================
// 住院医师 API 集成测试
// ==========================================
// 测试目标: 注册/偏好/休假/配额的输入校验与存储契约
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use residency_roster::api::ApiError;
use residency_roster::domain::types::{PgyLevel, ShiftCategory, TimeOffStatus};
use test_helpers::{create_test_app, year_start};

#[test]
fn test_register_validates_inputs() {
    let (_tmp, app) = create_test_app().unwrap();

    // 空姓名
    let result =
        app.resident_api
            .register_resident("", "a@hospital.test", 3, year_start(), vec![], "chief");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    // 非法邮箱
    let result =
        app.resident_api
            .register_resident("Alice", "not-an-email", 3, year_start(), vec![], "chief");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    // 未知 PGY 级别
    let result = app.resident_api.register_resident(
        "Alice",
        "alice@hospital.test",
        0,
        year_start(),
        vec![],
        "chief",
    );
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[test]
fn test_register_rejects_duplicate_email() {
    let (_tmp, app) = create_test_app().unwrap();
    app.resident_api
        .register_resident("Alice", "alice@hospital.test", 3, year_start(), vec![], "chief")
        .unwrap();

    let result = app.resident_api.register_resident(
        "Alice Again",
        "alice@hospital.test",
        4,
        year_start(),
        vec![],
        "chief",
    );
    assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));
}

/// 注册时按 PGY 默认表派生配额目标
#[test]
fn test_register_derives_quota_targets() {
    let (_tmp, app) = create_test_app().unwrap();
    let resident_id = app
        .resident_api
        .register_resident("Bob", "bob@hospital.test", 2, year_start(), vec![], "chief")
        .unwrap();

    let targets = app.resident_api.quota_progress(&resident_id).unwrap();
    assert_eq!(targets.len(), ShiftCategory::ALL.len());

    let weekday = targets
        .iter()
        .find(|t| t.category == ShiftCategory::WeekdayCall)
        .unwrap();
    // PGY-2 默认工作日值班目标
    assert_eq!(weekday.target_count, 8);
    assert_eq!(weekday.completed_count, 0);
}

#[test]
fn test_pgy_level_above_five_collapses() {
    let (_tmp, app) = create_test_app().unwrap();
    let resident_id = app
        .resident_api
        .register_resident("Carol", "carol@hospital.test", 7, year_start(), vec![], "chief")
        .unwrap();
    let resident = app.resident_api.get_resident(&resident_id).unwrap().unwrap();
    assert_eq!(resident.pgy_level, PgyLevel::Pgy5);
}

#[test]
fn test_deactivate_removes_from_active_roster() {
    let (_tmp, app) = create_test_app().unwrap();
    let resident_id = app
        .resident_api
        .register_resident("Dave", "dave@hospital.test", 3, year_start(), vec![], "chief")
        .unwrap();
    assert_eq!(app.resident_api.list_active_residents().unwrap().len(), 1);

    app.resident_api
        .deactivate_resident(&resident_id, "chief")
        .unwrap();
    assert!(app.resident_api.list_active_residents().unwrap().is_empty());

    // 只停用, 不删除
    let stored = app.resident_api.get_resident(&resident_id).unwrap().unwrap();
    assert!(!stored.active);
}

#[test]
fn test_time_off_validates_date_order_and_horizon() {
    let (_tmp, app) = create_test_app().unwrap();
    let resident_id = app
        .resident_api
        .register_resident("Eve", "eve@hospital.test", 3, year_start(), vec![], "chief")
        .unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();

    // 起止颠倒
    let result = app.resident_api.request_time_off(
        &resident_id,
        NaiveDate::from_ymd_opt(2025, 9, 10).unwrap(),
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        None,
        today,
    );
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    // 开始日期早于今日
    let result = app.resident_api.request_time_off(
        &resident_id,
        NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 7, 5).unwrap(),
        None,
        today,
    );
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

/// 已批准申请不可变更, 除非显式 override
#[test]
fn test_time_off_review_is_final_without_override() {
    let (_tmp, app) = create_test_app().unwrap();
    let resident_id = app
        .resident_api
        .register_resident("Frank", "frank@hospital.test", 3, year_start(), vec![], "chief")
        .unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
    let request_id = app
        .resident_api
        .request_time_off(
            &resident_id,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 3).unwrap(),
            None,
            today,
        )
        .unwrap();

    let approved = app
        .resident_api
        .review_time_off(&request_id, true, "chief", false)
        .unwrap();
    assert_eq!(approved.status, TimeOffStatus::Approved);

    // 已有终态结论 → 再审被拒
    let result = app.resident_api.review_time_off(&request_id, false, "chief", false);
    assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));

    // 显式 override → 放行
    let denied = app
        .resident_api
        .review_time_off(&request_id, false, "chief", true)
        .unwrap();
    assert_eq!(denied.status, TimeOffStatus::Denied);
}

#[test]
fn test_preferences_reject_conflicting_dates() {
    let (_tmp, app) = create_test_app().unwrap();
    let resident_id = app
        .resident_api
        .register_resident("Grace", "grace@hospital.test", 3, year_start(), vec![], "chief")
        .unwrap();

    let day = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
    let result = app.resident_api.submit_preferences(
        &resident_id,
        vec![day],
        vec![day],
        None,
        "grace",
    );
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    // 合法提交 → submitted 置位
    let resident = app
        .resident_api
        .submit_preferences(&resident_id, vec![day], vec![], None, "grace")
        .unwrap();
    assert!(resident.preferences.submitted);
    assert_eq!(resident.preferences.preferred_dates, vec![day]);
}
