// ==========================================
// 学年工作流状态机集成测试
// ==========================================
// 测试目标: 转换表与守卫函数
// 覆盖范围: 创建校验、守卫拒绝、完整推进链、发布门槛
// ==========================================

mod test_helpers;

use residency_roster::api::ApiError;
use residency_roster::domain::types::{ScheduleStatus, WorkflowState};
use test_helpers::{
    advance_to_ready, create_test_app, register_roster, submit_empty_preferences, year_start,
    TEST_YEAR,
};

#[test]
fn test_create_academic_year_rejects_bad_year_id() {
    let (_tmp, app) = create_test_app().unwrap();

    let result = app
        .workflow_api
        .create_academic_year("2025-2027", 5, vec![2, 3], "chief");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    let result = app
        .workflow_api
        .create_academic_year("garbage", 5, vec![2], "chief");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[test]
fn test_advance_blocked_until_roster_guard_satisfied() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 2, vec![3], "chief")
        .unwrap();

    // 无人注册 → 守卫拒绝并给出原因
    let result = app.workflow_api.advance_workflow(TEST_YEAR, "chief");
    match result {
        Err(ApiError::InvalidStateTransition { reasons, .. }) => {
            assert!(!reasons.is_empty());
        }
        other => panic!("期望 InvalidStateTransition, 实际 {:?}", other.map(|w| w.state)),
    }

    // 只注册 1 人 (要求 2) → 仍拒绝
    register_roster(&app, &[(1, 3)], year_start()).unwrap();
    assert!(app.workflow_api.advance_workflow(TEST_YEAR, "chief").is_err());

    // 满足人数与级别 → 放行
    register_roster_extra(&app);
    let workflow = app.workflow_api.advance_workflow(TEST_YEAR, "chief").unwrap();
    assert_eq!(workflow.state, WorkflowState::ResidentsRegistered);
}

fn register_roster_extra(app: &residency_roster::app::AppState) {
    app.resident_api
        .register_resident(
            "Extra PGY3",
            "extra.pgy3@hospital.test",
            3,
            year_start(),
            vec![],
            "chief",
        )
        .unwrap();
}

#[test]
fn test_validate_is_pure_and_reports_next_step() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();

    let before = app.workflow_api.get_workflow_status(TEST_YEAR).unwrap();
    assert_eq!(before.state, WorkflowState::Created);
    assert_eq!(before.next_step, Some(WorkflowState::ResidentsRegistered));
    assert!(!before.ready_for_next);
    assert_eq!(before.completion_pct, 0.0);

    // validate 不改状态
    let after = app.workflow_api.get_workflow_status(TEST_YEAR).unwrap();
    assert_eq!(after.state, WorkflowState::Created);

    register_roster(&app, &[(1, 3)], year_start()).unwrap();
    let ready = app.workflow_api.get_workflow_status(TEST_YEAR).unwrap();
    assert!(ready.ready_for_next);
    assert!(ready.validation_errors.is_empty());
}

#[tokio::test]
async fn test_publish_gate_requires_assigned_holiday_coverage() {
    let (_tmp, app) = create_test_app().unwrap();
    app.workflow_api
        .create_academic_year(TEST_YEAR, 1, vec![3], "chief")
        .unwrap();
    register_roster(&app, &[(1, 3)], year_start()).unwrap();
    submit_empty_preferences(&app).unwrap();
    advance_to_ready(&app, TEST_YEAR).unwrap();

    // 生成一个干净的两日排班 (周一/周二)
    let result = app
        .schedule_api
        .generate_schedule(
            TEST_YEAR,
            chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 9, 2).unwrap(),
            true,
            true,
            None,
            "chief",
        )
        .await
        .unwrap();
    assert_eq!(result.hard_rule_violations, 0);

    // 生成后再实例化一个落在排班区间内、要求覆盖且未指派的节假日
    let definition_id = app
        .holiday_api
        .define_holiday(
            "Labor Day",
            residency_roster::domain::types::HolidayType::Federal,
            true,
            3,
            residency_roster::domain::types::CoverageTier::Reduced,
            "chief",
        )
        .unwrap();
    let instance_id = app
        .holiday_api
        .instantiate_holiday(
            &definition_id,
            chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            TEST_YEAR,
            Some(true),
            "chief",
        )
        .unwrap();

    // 未指派 → 发布被拒
    let blocked = app.workflow_api.advance_workflow(TEST_YEAR, "chief");
    assert!(matches!(
        blocked,
        Err(ApiError::InvalidStateTransition { .. })
    ));

    // 指派合格主值班后 → 发布放行, 排班表激活
    let resident = &app.resident_api.list_active_residents().unwrap()[0];
    app.holiday_api
        .assign_coverage(
            &instance_id,
            &resident.resident_id,
            None,
            residency_roster::domain::types::AssignmentMethod::Manual,
            "chief",
        )
        .unwrap();

    let published = app.workflow_api.advance_workflow(TEST_YEAR, "chief").unwrap();
    assert_eq!(published.state, WorkflowState::Published);
    assert_eq!(published.completion_pct, 100.0);

    let schedule = app
        .schedule_api
        .get_schedule(&result.schedule_id)
        .unwrap()
        .unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Active);
}

#[test]
fn test_published_is_terminal() {
    assert_eq!(WorkflowState::Published.next(), None);
    assert_eq!(WorkflowState::Published.step_index(), 6);
}
