// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、AppState 装配、
//       花名册/工作流快速搭建
// ==========================================

use chrono::NaiveDate;
use rusqlite::Connection;
use std::error::Error;
use tempfile::NamedTempFile;

use residency_roster::app::AppState;
use residency_roster::db;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件 (需要保持存活)
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = Connection::open(&db_path)?;
    db::configure_sqlite_connection(&conn)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建测试 AppState (临时库)
pub fn create_test_app() -> Result<(NamedTempFile, AppState), Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let app = AppState::new(db_path)?;
    Ok((temp_file, app))
}

/// 注册一批住院医师
///
/// # 参数
/// - roster: (人数, PGY 序数) 列表
///
/// # 返回
/// 注册得到的住院医师ID (注册顺序)
pub fn register_roster(
    app: &AppState,
    roster: &[(usize, u8)],
    start_date: NaiveDate,
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut ids = Vec::new();
    for (count, pgy) in roster {
        for i in 0..*count {
            let id = app.resident_api.register_resident(
                &format!("Resident PGY{} #{}", pgy, i),
                &format!("pgy{}.{}@hospital.test", pgy, i),
                *pgy,
                start_date,
                vec![],
                "chief",
            )?;
            ids.push(id);
        }
    }
    Ok(ids)
}

/// 全员提交空偏好 (满足偏好收集守卫)
pub fn submit_empty_preferences(app: &AppState) -> Result<(), Box<dyn Error>> {
    for resident in app.resident_api.list_active_residents()? {
        app.resident_api.submit_preferences(
            &resident.resident_id,
            vec![],
            vec![],
            None,
            "chief",
        )?;
    }
    Ok(())
}

/// 把学年推进到 READY_FOR_SCHEDULE
///
/// 前置: 花名册满足人数/级别要求, 节假日已按需实例化
pub fn advance_to_ready(app: &AppState, year_id: &str) -> Result<(), Box<dyn Error>> {
    // created → residents_registered → holidays_configured
    //         → preferences_collected → ready_for_schedule
    for _ in 0..4 {
        app.workflow_api.advance_workflow(year_id, "chief")?;
    }
    Ok(())
}

/// 测试常用学年与窗口
pub const TEST_YEAR: &str = "2025-2026";

pub fn year_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
}

pub fn sept_window() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
    )
}
