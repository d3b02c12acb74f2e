// ==========================================
// 住院医师排班系统 - 休假申请仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use crate::domain::timeoff::TimeOffRequest;
use crate::domain::types::TimeOffStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{
    date_from_text, date_to_text, datetime_from_text, datetime_to_text, enum_from_text,
};

// ==========================================
// TimeOffRepository - 休假申请仓储
// ==========================================
pub struct TimeOffRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TimeOffRepository {
    /// 创建新的休假申请仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawTimeOffRow> {
        Ok(RawTimeOffRow {
            request_id: row.get(0)?,
            resident_id: row.get(1)?,
            start_date: row.get(2)?,
            end_date: row.get(3)?,
            reason: row.get(4)?,
            status: row.get(5)?,
            reviewed_by: row.get(6)?,
            reviewed_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        request_id, resident_id, start_date, end_date, reason,
        status, reviewed_by, reviewed_at, created_at
    "#;

    /// 插入休假申请
    pub fn insert(&self, request: &TimeOffRequest) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO time_off_request (
                request_id, resident_id, start_date, end_date, reason,
                status, reviewed_by, reviewed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                request.request_id,
                request.resident_id,
                date_to_text(request.start_date),
                date_to_text(request.end_date),
                request.reason,
                request.status.to_string(),
                request.reviewed_by,
                request.reviewed_at.map(datetime_to_text),
                datetime_to_text(request.created_at),
            ],
        )?;
        Ok(())
    }

    /// 审批结论落库
    pub fn update_status(
        &self,
        request_id: &str,
        status: TimeOffStatus,
        reviewed_by: &str,
        reviewed_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE time_off_request
            SET status = ?2, reviewed_by = ?3, reviewed_at = ?4
            WHERE request_id = ?1
            "#,
            params![
                request_id,
                status.to_string(),
                reviewed_by,
                datetime_to_text(reviewed_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "TimeOffRequest".to_string(),
                id: request_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<TimeOffRequest>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM time_off_request WHERE request_id = ?1",
            Self::SELECT_COLS
        );
        let raw = conn
            .prepare(&sql)?
            .query_row(params![request_id], Self::map_row)
            .optional()?;
        raw.map(RawTimeOffRow::into_domain).transpose()
    }

    /// 按住院医师查询
    pub fn find_by_resident(&self, resident_id: &str) -> RepositoryResult<Vec<TimeOffRequest>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM time_off_request WHERE resident_id = ?1 ORDER BY start_date",
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![resident_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawTimeOffRow::into_domain).collect()
    }

    /// 查询与日期区间相交的已批准休假
    ///
    /// 约束编译器用它排除不可排班日
    pub fn list_approved_overlapping(
        &self,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> RepositoryResult<Vec<TimeOffRequest>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM time_off_request
            WHERE status = 'APPROVED'
              AND start_date <= ?2
              AND end_date >= ?1
            ORDER BY resident_id, start_date
            "#,
            Self::SELECT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![date_to_text(range_start), date_to_text(range_end)],
                Self::map_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawTimeOffRow::into_domain).collect()
    }
}

// ==========================================
// RawTimeOffRow - 行中间结构
// ==========================================
struct RawTimeOffRow {
    request_id: String,
    resident_id: String,
    start_date: String,
    end_date: String,
    reason: Option<String>,
    status: String,
    reviewed_by: Option<String>,
    reviewed_at: Option<String>,
    created_at: String,
}

impl RawTimeOffRow {
    fn into_domain(self) -> RepositoryResult<TimeOffRequest> {
        Ok(TimeOffRequest {
            request_id: self.request_id,
            resident_id: self.resident_id,
            start_date: date_from_text("start_date", &self.start_date)?,
            end_date: date_from_text("end_date", &self.end_date)?,
            reason: self.reason,
            status: enum_from_text::<TimeOffStatus>("status", &self.status)?,
            reviewed_by: self.reviewed_by,
            reviewed_at: self
                .reviewed_at
                .map(|raw| datetime_from_text("reviewed_at", &raw))
                .transpose()?,
            created_at: datetime_from_text("created_at", &self.created_at)?,
        })
    }
}
