// ==========================================
// 住院医师排班系统 - 学年工作流仓储
// ==========================================
// 红线: Repository 不含业务逻辑
//       状态转换合法性由 WorkflowOrchestrator 把关
// ==========================================

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use crate::domain::types::{PgyLevel, WorkflowState};
use crate::domain::workflow::AcademicYearWorkflow;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{
    date_from_text, date_to_text, datetime_from_text, datetime_to_text, enum_from_text,
    json_from_text,
};

// ==========================================
// WorkflowRepository - 学年工作流仓储
// ==========================================
pub struct WorkflowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkflowRepository {
    /// 创建新的工作流仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    const SELECT_COLS: &'static str = r#"
        year_id, state, year_start, year_end, required_resident_count,
        required_pgy_levels_json, completion_pct, created_at, updated_at
    "#;

    /// 插入学年工作流记录
    pub fn insert(&self, workflow: &AcademicYearWorkflow) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO academic_year_workflow (
                year_id, state, year_start, year_end, required_resident_count,
                required_pgy_levels_json, completion_pct, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                workflow.year_id,
                workflow.state.to_string(),
                date_to_text(workflow.year_start),
                date_to_text(workflow.year_end),
                workflow.required_resident_count,
                serde_json::to_string(&workflow.required_pgy_levels)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
                workflow.completion_pct,
                datetime_to_text(workflow.created_at),
                datetime_to_text(workflow.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 更新状态与完成度
    pub fn update(&self, workflow: &AcademicYearWorkflow) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE academic_year_workflow SET
                state = ?2, completion_pct = ?3, updated_at = ?4
            WHERE year_id = ?1
            "#,
            params![
                workflow.year_id,
                workflow.state.to_string(),
                workflow.completion_pct,
                datetime_to_text(workflow.updated_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "AcademicYearWorkflow".to_string(),
                id: workflow.year_id.clone(),
            });
        }
        Ok(())
    }

    /// 按学年ID查询
    pub fn find_by_id(&self, year_id: &str) -> RepositoryResult<Option<AcademicYearWorkflow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM academic_year_workflow WHERE year_id = ?1",
            Self::SELECT_COLS
        );
        let raw = conn
            .prepare(&sql)?
            .query_row(params![year_id], Self::map_row)
            .optional()?;
        raw.map(RawWorkflowRow::into_domain).transpose()
    }

    /// 查询全部学年 (新→旧)
    pub fn list_all(&self) -> RepositoryResult<Vec<AcademicYearWorkflow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM academic_year_workflow ORDER BY year_id DESC",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawWorkflowRow::into_domain).collect()
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawWorkflowRow> {
        Ok(RawWorkflowRow {
            year_id: row.get(0)?,
            state: row.get(1)?,
            year_start: row.get(2)?,
            year_end: row.get(3)?,
            required_resident_count: row.get(4)?,
            required_pgy_levels_json: row.get(5)?,
            completion_pct: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

// ==========================================
// RawWorkflowRow - 行中间结构
// ==========================================
struct RawWorkflowRow {
    year_id: String,
    state: String,
    year_start: String,
    year_end: String,
    required_resident_count: i32,
    required_pgy_levels_json: String,
    completion_pct: f64,
    created_at: String,
    updated_at: String,
}

impl RawWorkflowRow {
    fn into_domain(self) -> RepositoryResult<AcademicYearWorkflow> {
        Ok(AcademicYearWorkflow {
            year_id: self.year_id,
            state: enum_from_text::<WorkflowState>("state", &self.state)?,
            year_start: date_from_text("year_start", &self.year_start)?,
            year_end: date_from_text("year_end", &self.year_end)?,
            required_resident_count: self.required_resident_count,
            required_pgy_levels: json_from_text::<Vec<PgyLevel>>(
                "required_pgy_levels_json",
                &self.required_pgy_levels_json,
            )?,
            completion_pct: self.completion_pct,
            created_at: datetime_from_text("created_at", &self.created_at)?,
            updated_at: datetime_from_text("updated_at", &self.updated_at)?,
        })
    }
}
