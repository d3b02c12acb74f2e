// ==========================================
// 住院医师排班系统 - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{datetime_from_text, datetime_to_text};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入操作日志
    ///
    /// # 返回
    /// - Ok(action_id): 成功插入
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, academic_year, action_type, action_ts, actor,
                payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                log.action_id,
                log.academic_year,
                log.action_type.as_str(),
                datetime_to_text(log.action_ts),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;
        Ok(log.action_id.clone())
    }

    /// 查询某学年的操作日志 (新→旧)
    pub fn list_by_year(&self, academic_year: &str, limit: u32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, academic_year, action_type, action_ts, actor,
                   payload_json, detail
            FROM action_log
            WHERE academic_year = ?1
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![academic_year, limit], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawActionLogRow::into_domain).collect()
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawActionLogRow> {
        Ok(RawActionLogRow {
            action_id: row.get(0)?,
            academic_year: row.get(1)?,
            action_type: row.get(2)?,
            action_ts: row.get(3)?,
            actor: row.get(4)?,
            payload_json: row.get(5)?,
            detail: row.get(6)?,
        })
    }
}

// ==========================================
// RawActionLogRow - 行中间结构
// ==========================================
struct RawActionLogRow {
    action_id: String,
    academic_year: Option<String>,
    action_type: String,
    action_ts: String,
    actor: String,
    payload_json: Option<String>,
    detail: Option<String>,
}

impl RawActionLogRow {
    fn into_domain(self) -> RepositoryResult<ActionLog> {
        let action_type = ActionType::parse(&self.action_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "action_type".to_string(),
                message: format!("未知操作类型: {}", self.action_type),
            }
        })?;
        let payload_json = self
            .payload_json
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|e| RepositoryError::FieldValueError {
                    field: "payload_json".to_string(),
                    message: format!("无法解析 JSON: {}", e),
                })
            })
            .transpose()?;

        Ok(ActionLog {
            action_id: self.action_id,
            academic_year: self.academic_year,
            action_type,
            action_ts: datetime_from_text("action_ts", &self.action_ts)?,
            actor: self.actor,
            payload_json,
            detail: self.detail,
        })
    }
}
