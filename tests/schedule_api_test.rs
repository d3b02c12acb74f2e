// ==========================================
// 排班表 API 集成测试
// ==========================================
// 测试目标: 生成入口的结构化结果契约
// 覆盖范围: 约束错误上报、超时状态、违规查询、前置校验
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use residency_roster::api::ApiError;
use residency_roster::domain::types::{ScheduleStatus, ShiftCategory, SolveStatus};
use test_helpers::{
    advance_to_ready, create_test_app, register_roster, submit_empty_preferences, year_start,
    TEST_YEAR,
};

/// 唯一住院医师在区间内唯一一天休假 → ConstraintError 显式上报, 非静默空缺
#[tokio::test]
async fn test_total_leave_day_reports_constraint_error() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();
    let ids = register_roster(&app, &[(1, 3)], year_start()).unwrap();
    submit_empty_preferences(&app).unwrap();
    advance_to_ready(&app, TEST_YEAR).unwrap();

    // 批准覆盖 2025-09-01 (周一) 的休假
    let day = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
    let request_id = app
        .resident_api
        .request_time_off(&ids[0], day, day, Some("conference".to_string()), day)
        .unwrap();
    app.resident_api
        .review_time_off(&request_id, true, "chief", false)
        .unwrap();

    let result = app
        .schedule_api
        .generate_schedule(TEST_YEAR, day, day, true, true, None, "chief")
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.assignment_count, 0);
    assert_eq!(result.constraint_errors.len(), 1);
    assert_eq!(result.constraint_errors[0].date, day);
    assert_eq!(result.constraint_errors[0].category, ShiftCategory::WeekdayCall);

    // 排班表留在草稿态
    let schedule = app
        .schedule_api
        .get_schedule(&result.schedule_id)
        .unwrap()
        .unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Draft);
}

/// 零时间预算 → TIMED_OUT 终止状态 (可重试, 非错误)
#[tokio::test]
async fn test_zero_budget_returns_timed_out_status() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();
    register_roster(&app, &[(1, 3)], year_start()).unwrap();
    submit_empty_preferences(&app).unwrap();
    advance_to_ready(&app, TEST_YEAR).unwrap();

    let result = app
        .schedule_api
        .generate_schedule(
            TEST_YEAR,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
            true,
            true,
            Some(0),
            "chief",
        )
        .await
        .unwrap();

    assert_eq!(result.status, SolveStatus::TimedOut);
    assert!(!result.success);
    assert!(!result.unfillable_slots.is_empty());
}

/// 工作流未到 READY_FOR_SCHEDULE → 生成被拒
#[tokio::test]
async fn test_generation_requires_ready_state() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();
    register_roster(&app, &[(1, 3)], year_start()).unwrap();

    let result = app
        .schedule_api
        .generate_schedule(
            TEST_YEAR,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
            true,
            true,
            None,
            "chief",
        )
        .await;

    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

/// 日期颠倒 → 立即校验失败
#[tokio::test]
async fn test_generation_rejects_reversed_range() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();
    register_roster(&app, &[(1, 3)], year_start()).unwrap();
    submit_empty_preferences(&app).unwrap();
    advance_to_ready(&app, TEST_YEAR).unwrap();

    let result = app
        .schedule_api
        .generate_schedule(
            TEST_YEAR,
            NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            true,
            true,
            None,
            "chief",
        )
        .await;

    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

/// 工时合规违规作为告知性结论入库, 可经 API 查询, 不阻断生成
#[tokio::test]
async fn test_acgme_violations_are_reported_not_blocking() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();
    register_roster(&app, &[(1, 3)], year_start()).unwrap();
    submit_empty_preferences(&app).unwrap();
    advance_to_ready(&app, TEST_YEAR).unwrap();

    // 单人背满 14 天 → 必然触发休息日/工时类违规
    let result = app
        .schedule_api
        .generate_schedule(
            TEST_YEAR,
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
            true,
            true,
            None,
            "chief",
        )
        .await
        .unwrap();

    assert!(result.acgme_violation_count > 0);
    // 生成本身未被违规阻断
    assert!(result.assignment_count > 0);

    let violations = app
        .schedule_api
        .list_violations(&result.schedule_id)
        .unwrap();
    assert_eq!(violations.len(), result.acgme_violation_count);
    assert!(violations
        .iter()
        .all(|v| v.schedule_id == result.schedule_id));
}
