// ==========================================
// 住院医师排班系统 - 排班表仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 一次求解产生的全部指派与违规单事务落库,
//       失败整体回滚,不可见部分写入
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use crate::domain::schedule::{Assignment, Schedule};
use crate::domain::types::{ScheduleStatus, Severity, ShiftCategory, ViolationKind};
use crate::domain::violation::AcgmeViolation;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{
    date_from_text, date_to_text, datetime_from_text, datetime_to_text, enum_from_text,
};

// ==========================================
// ScheduleRepository - 排班表仓储
// ==========================================
pub struct ScheduleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleRepository {
    /// 创建新的排班表仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    const SCHEDULE_COLS: &'static str = r#"
        schedule_id, academic_year, start_date, end_date, algorithm, status,
        hard_rule_violations, soft_rule_cost, total_assignments,
        config_snapshot_json, created_at, updated_at
    "#;

    // ==========================================
    // 排班表 (schedule)
    // ==========================================

    /// 插入排班表
    pub fn insert(&self, schedule: &Schedule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO schedule (
                schedule_id, academic_year, start_date, end_date, algorithm, status,
                hard_rule_violations, soft_rule_cost, total_assignments,
                config_snapshot_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                schedule.schedule_id,
                schedule.academic_year,
                date_to_text(schedule.start_date),
                date_to_text(schedule.end_date),
                schedule.algorithm,
                schedule.status.to_string(),
                schedule.hard_rule_violations,
                schedule.soft_rule_cost,
                schedule.total_assignments,
                schedule.config_snapshot_json,
                datetime_to_text(schedule.created_at),
                datetime_to_text(schedule.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 更新状态
    pub fn update_status(
        &self,
        schedule_id: &str,
        status: ScheduleStatus,
        updated_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE schedule SET status = ?2, updated_at = ?3 WHERE schedule_id = ?1",
            params![schedule_id, status.to_string(), datetime_to_text(updated_at)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Schedule".to_string(),
                id: schedule_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, schedule_id: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM schedule WHERE schedule_id = ?1", Self::SCHEDULE_COLS);
        let raw = conn
            .prepare(&sql)?
            .query_row(params![schedule_id], Self::map_schedule_row)
            .optional()?;
        raw.map(RawScheduleRow::into_domain).transpose()
    }

    /// 按学年查询 (新→旧)
    pub fn list_by_year(&self, academic_year: &str) -> RepositoryResult<Vec<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM schedule
            WHERE academic_year = ?1
            ORDER BY created_at DESC, schedule_id DESC
            "#,
            Self::SCHEDULE_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![academic_year], Self::map_schedule_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawScheduleRow::into_domain).collect()
    }

    /// 查询某学年当前生效的排班表
    pub fn find_active_by_year(&self, academic_year: &str) -> RepositoryResult<Option<Schedule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM schedule WHERE academic_year = ?1 AND status = 'ACTIVE' LIMIT 1",
            Self::SCHEDULE_COLS
        );
        let raw = conn
            .prepare(&sql)?
            .query_row(params![academic_year], Self::map_schedule_row)
            .optional()?;
        raw.map(RawScheduleRow::into_domain).transpose()
    }

    /// 归档某学年的全部生效排班表 (激活新表前调用)
    pub fn archive_active_by_year(
        &self,
        academic_year: &str,
        updated_at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE schedule SET status = 'ARCHIVED', updated_at = ?2
            WHERE academic_year = ?1 AND status = 'ACTIVE'
            "#,
            params![academic_year, datetime_to_text(updated_at)],
        )?;
        Ok(rows)
    }

    fn map_schedule_row(row: &Row<'_>) -> rusqlite::Result<RawScheduleRow> {
        Ok(RawScheduleRow {
            schedule_id: row.get(0)?,
            academic_year: row.get(1)?,
            start_date: row.get(2)?,
            end_date: row.get(3)?,
            algorithm: row.get(4)?,
            status: row.get(5)?,
            hard_rule_violations: row.get(6)?,
            soft_rule_cost: row.get(7)?,
            total_assignments: row.get(8)?,
            config_snapshot_json: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    // ==========================================
    // 批量落库 (assignment + acgme_violation + 聚合计数)
    // ==========================================

    /// 以单事务写入一次求解的全部产物
    ///
    /// 步骤:
    /// 1. 清空该排班表既有指派与违规 (重新生成场景)
    /// 2. 写入全部指派
    /// 3. 写入全部 ACGME 违规
    /// 4. 更新排班表聚合计数
    ///
    /// 任一步失败整体回滚
    pub fn commit_solve_batch(
        &self,
        schedule: &Schedule,
        assignments: &[Assignment],
        violations: &[AcgmeViolation],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute(
            "DELETE FROM acgme_violation WHERE schedule_id = ?1",
            params![schedule.schedule_id],
        )?;
        tx.execute(
            "DELETE FROM assignment WHERE schedule_id = ?1",
            params![schedule.schedule_id],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO assignment (
                    assignment_id, schedule_id, resident_id, duty_date,
                    category, start_at, end_at, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for assignment in assignments {
                stmt.execute(params![
                    assignment.assignment_id,
                    assignment.schedule_id,
                    assignment.resident_id,
                    date_to_text(assignment.duty_date),
                    assignment.category.to_string(),
                    datetime_to_text(assignment.start_at),
                    datetime_to_text(assignment.end_at),
                    datetime_to_text(assignment.created_at),
                ])?;
            }

            let mut stmt = tx.prepare(
                r#"
                INSERT INTO acgme_violation (
                    violation_id, schedule_id, resident_id, kind, severity,
                    measured_value, limit_value, window_start, window_end, detail
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for violation in violations {
                stmt.execute(params![
                    violation.violation_id,
                    violation.schedule_id,
                    violation.resident_id,
                    violation.kind.to_string(),
                    violation.severity.to_string(),
                    violation.measured_value,
                    violation.limit_value,
                    date_to_text(violation.window_start),
                    date_to_text(violation.window_end),
                    violation.detail,
                ])?;
            }
        }

        tx.execute(
            r#"
            UPDATE schedule SET
                hard_rule_violations = ?2, soft_rule_cost = ?3,
                total_assignments = ?4, config_snapshot_json = ?5, updated_at = ?6
            WHERE schedule_id = ?1
            "#,
            params![
                schedule.schedule_id,
                schedule.hard_rule_violations,
                schedule.soft_rule_cost,
                schedule.total_assignments,
                schedule.config_snapshot_json,
                datetime_to_text(schedule.updated_at),
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    // ==========================================
    // 指派与违规查询
    // ==========================================

    /// 查询某排班表的全部指派 (按日期、类别、住院医师ID)
    pub fn list_assignments(&self, schedule_id: &str) -> RepositoryResult<Vec<Assignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT assignment_id, schedule_id, resident_id, duty_date,
                   category, start_at, end_at, created_at
            FROM assignment
            WHERE schedule_id = ?1
            ORDER BY duty_date, category, resident_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![schedule_id], |row| {
                Ok(RawAssignmentRow {
                    assignment_id: row.get(0)?,
                    schedule_id: row.get(1)?,
                    resident_id: row.get(2)?,
                    duty_date: row.get(3)?,
                    category: row.get(4)?,
                    start_at: row.get(5)?,
                    end_at: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawAssignmentRow::into_domain).collect()
    }

    /// 查询某排班表的全部 ACGME 违规 (严重度倒序)
    pub fn list_violations(&self, schedule_id: &str) -> RepositoryResult<Vec<AcgmeViolation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT violation_id, schedule_id, resident_id, kind, severity,
                   measured_value, limit_value, window_start, window_end, detail
            FROM acgme_violation
            WHERE schedule_id = ?1
            ORDER BY CASE severity
                WHEN 'CRITICAL' THEN 0
                WHEN 'HIGH' THEN 1
                WHEN 'MEDIUM' THEN 2
                ELSE 3
            END, resident_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![schedule_id], |row| {
                Ok(RawViolationRow {
                    violation_id: row.get(0)?,
                    schedule_id: row.get(1)?,
                    resident_id: row.get(2)?,
                    kind: row.get(3)?,
                    severity: row.get(4)?,
                    measured_value: row.get(5)?,
                    limit_value: row.get(6)?,
                    window_start: row.get(7)?,
                    window_end: row.get(8)?,
                    detail: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawViolationRow::into_domain).collect()
    }
}

// ==========================================
// 行中间结构
// ==========================================

struct RawScheduleRow {
    schedule_id: String,
    academic_year: String,
    start_date: String,
    end_date: String,
    algorithm: String,
    status: String,
    hard_rule_violations: i32,
    soft_rule_cost: i64,
    total_assignments: i32,
    config_snapshot_json: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawScheduleRow {
    fn into_domain(self) -> RepositoryResult<Schedule> {
        Ok(Schedule {
            schedule_id: self.schedule_id,
            academic_year: self.academic_year,
            start_date: date_from_text("start_date", &self.start_date)?,
            end_date: date_from_text("end_date", &self.end_date)?,
            algorithm: self.algorithm,
            status: enum_from_text::<ScheduleStatus>("status", &self.status)?,
            hard_rule_violations: self.hard_rule_violations,
            soft_rule_cost: self.soft_rule_cost,
            total_assignments: self.total_assignments,
            config_snapshot_json: self.config_snapshot_json,
            created_at: datetime_from_text("created_at", &self.created_at)?,
            updated_at: datetime_from_text("updated_at", &self.updated_at)?,
        })
    }
}

struct RawAssignmentRow {
    assignment_id: String,
    schedule_id: String,
    resident_id: String,
    duty_date: String,
    category: String,
    start_at: String,
    end_at: String,
    created_at: String,
}

impl RawAssignmentRow {
    fn into_domain(self) -> RepositoryResult<Assignment> {
        Ok(Assignment {
            assignment_id: self.assignment_id,
            schedule_id: self.schedule_id,
            resident_id: self.resident_id,
            duty_date: date_from_text("duty_date", &self.duty_date)?,
            category: enum_from_text::<ShiftCategory>("category", &self.category)?,
            start_at: datetime_from_text("start_at", &self.start_at)?,
            end_at: datetime_from_text("end_at", &self.end_at)?,
            created_at: datetime_from_text("created_at", &self.created_at)?,
        })
    }
}

struct RawViolationRow {
    violation_id: String,
    schedule_id: String,
    resident_id: String,
    kind: String,
    severity: String,
    measured_value: f64,
    limit_value: f64,
    window_start: String,
    window_end: String,
    detail: Option<String>,
}

impl RawViolationRow {
    fn into_domain(self) -> RepositoryResult<AcgmeViolation> {
        Ok(AcgmeViolation {
            violation_id: self.violation_id,
            schedule_id: self.schedule_id,
            resident_id: self.resident_id,
            kind: enum_from_text::<ViolationKind>("kind", &self.kind)?,
            severity: enum_from_text::<Severity>("severity", &self.severity)?,
            measured_value: self.measured_value,
            limit_value: self.limit_value,
            window_start: date_from_text("window_start", &self.window_start)?,
            window_end: date_from_text("window_end", &self.window_end)?,
            detail: self.detail,
        })
    }
}
