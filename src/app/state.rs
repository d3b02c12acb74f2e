// ==========================================
// 住院医师排班系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 全部仓储共享同一个 SQLite 连接 (Arc<Mutex>),
//       串行化写入并保证批量事务可见性
// ==========================================

use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};

use crate::api::{HolidayApi, ResidentApi, ScheduleApi, WorkflowApi};
use crate::config::ConfigManager;
use crate::db;
use crate::engine::orchestrator::WorkflowOrchestrator;
use crate::repository::{
    ActionLogRepository, HolidayRepository, QuotaRepository, ResidentRepository,
    ScheduleRepository, TimeOffRepository, WorkflowRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 学年工作流API
    pub workflow_api: Arc<WorkflowApi<ConfigManager>>,

    /// 住院医师API
    pub resident_api: Arc<ResidentApi>,

    /// 节假日API
    pub holiday_api: Arc<HolidayApi>,

    /// 排班表API
    pub schedule_api: Arc<ScheduleApi<ConfigManager>>,

    /// 编排器 (工作流 + 排班生成)
    pub orchestrator: Arc<WorkflowOrchestrator<ConfigManager>>,

    /// 操作日志仓储 (用于审计追踪查询)
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 初始化应用状态
    ///
    /// # 参数
    /// - db_path: 数据库文件路径 (不存在时自动建库建表)
    pub fn new(db_path: String) -> Result<Self, Box<dyn Error>> {
        let conn = db::open_and_init(&db_path)?;
        let conn = Arc::new(Mutex::new(conn));
        Self::from_connection(db_path, conn)
    }

    /// 从已有连接初始化 (测试用)
    pub fn from_connection(
        db_path: String,
        conn: Arc<Mutex<Connection>>,
    ) -> Result<Self, Box<dyn Error>> {
        let config = Arc::new(ConfigManager::from_connection(conn.clone())?);

        let resident_repo = Arc::new(ResidentRepository::new(conn.clone()));
        let quota_repo = Arc::new(QuotaRepository::new(conn.clone()));
        let timeoff_repo = Arc::new(TimeOffRepository::new(conn.clone()));
        let holiday_repo = Arc::new(HolidayRepository::new(conn.clone()));
        let schedule_repo = Arc::new(ScheduleRepository::new(conn.clone()));
        let workflow_repo = Arc::new(WorkflowRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn));

        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            config,
            workflow_repo,
            resident_repo.clone(),
            timeoff_repo.clone(),
            holiday_repo.clone(),
            schedule_repo.clone(),
            quota_repo.clone(),
        ));

        let workflow_api = Arc::new(WorkflowApi::new(
            orchestrator.clone(),
            action_log_repo.clone(),
        ));
        let resident_api = Arc::new(ResidentApi::new(
            resident_repo.clone(),
            quota_repo,
            timeoff_repo,
            action_log_repo.clone(),
        ));
        let holiday_api = Arc::new(HolidayApi::new(
            holiday_repo,
            resident_repo,
            action_log_repo.clone(),
        ));
        let schedule_api = Arc::new(ScheduleApi::new(
            orchestrator.clone(),
            schedule_repo,
            action_log_repo.clone(),
        ));

        Ok(Self {
            db_path,
            workflow_api,
            resident_api,
            holiday_api,
            schedule_api,
            orchestrator,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 RESIDENCY_ROSTER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("RESIDENCY_ROSTER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./residency_roster.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("residency-roster-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("residency-roster");
        }

        if std::fs::create_dir_all(&path).is_ok() {
            path = path.join("residency_roster.db");
        } else {
            path = PathBuf::from("./residency_roster.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
