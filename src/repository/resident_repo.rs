// ==========================================
// 住院医师排班系统 - 住院医师仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use crate::domain::resident::{Resident, ResidentPreferences};
use crate::domain::types::PgyLevel;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{date_from_text, date_to_text, datetime_from_text, datetime_to_text, json_from_text};

// ==========================================
// ResidentRepository - 住院医师仓储
// ==========================================
pub struct ResidentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ResidentRepository {
    /// 创建新的住院医师仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 行映射
    fn map_row(row: &Row<'_>) -> rusqlite::Result<RawResidentRow> {
        Ok(RawResidentRow {
            resident_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            pgy_level: row.get(3)?,
            start_date: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
            specializations_json: row.get(6)?,
            preferences_json: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    const SELECT_COLS: &'static str = r#"
        resident_id, name, email, pgy_level, start_date, active,
        specializations_json, preferences_json, created_at, updated_at
    "#;

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入住院医师
    pub fn insert(&self, resident: &Resident) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO resident (
                resident_id, name, email, pgy_level, start_date, active,
                specializations_json, preferences_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                resident.resident_id,
                resident.name,
                resident.email,
                resident.pgy_level.as_ordinal(),
                date_to_text(resident.start_date),
                resident.active as i64,
                serde_json::to_string(&resident.specializations)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
                serde_json::to_string(&resident.preferences)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
                datetime_to_text(resident.created_at),
                datetime_to_text(resident.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 更新住院医师 (全量覆盖可变字段)
    pub fn update(&self, resident: &Resident) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE resident SET
                name = ?2, email = ?3, pgy_level = ?4, start_date = ?5,
                active = ?6, specializations_json = ?7, preferences_json = ?8,
                updated_at = ?9
            WHERE resident_id = ?1
            "#,
            params![
                resident.resident_id,
                resident.name,
                resident.email,
                resident.pgy_level.as_ordinal(),
                date_to_text(resident.start_date),
                resident.active as i64,
                serde_json::to_string(&resident.specializations)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
                serde_json::to_string(&resident.preferences)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
                datetime_to_text(resident.updated_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Resident".to_string(),
                id: resident.resident_id.clone(),
            });
        }
        Ok(())
    }

    /// 停用住院医师 (不物理删除)
    pub fn deactivate(&self, resident_id: &str, updated_at: chrono::NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE resident SET active = 0, updated_at = ?2 WHERE resident_id = ?1",
            params![resident_id, datetime_to_text(updated_at)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Resident".to_string(),
                id: resident_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询
    pub fn find_by_id(&self, resident_id: &str) -> RepositoryResult<Option<Resident>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM resident WHERE resident_id = ?1", Self::SELECT_COLS);
        let raw = conn
            .prepare(&sql)?
            .query_row(params![resident_id], Self::map_row)
            .optional()?;
        raw.map(RawResidentRow::into_domain).transpose()
    }

    /// 按邮箱查询 (注册去重)
    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<Resident>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM resident WHERE email = ?1", Self::SELECT_COLS);
        let raw = conn
            .prepare(&sql)?
            .query_row(params![email], Self::map_row)
            .optional()?;
        raw.map(RawResidentRow::into_domain).transpose()
    }

    /// 查询全部住院医师 (按ID字典序,保证确定性)
    pub fn list_all(&self) -> RepositoryResult<Vec<Resident>> {
        self.list_where("1=1")
    }

    /// 查询在岗住院医师 (按ID字典序)
    pub fn list_active(&self) -> RepositoryResult<Vec<Resident>> {
        self.list_where("active = 1")
    }

    fn list_where(&self, predicate: &str) -> RepositoryResult<Vec<Resident>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM resident WHERE {} ORDER BY resident_id",
            Self::SELECT_COLS,
            predicate
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<RawResidentRow>>>()?;
        rows.into_iter().map(RawResidentRow::into_domain).collect()
    }
}

// ==========================================
// RawResidentRow - 行中间结构
// ==========================================
// 说明: rusqlite 闭包内不便返回自定义错误,
//       先取原始文本,再在外层转换为领域类型
struct RawResidentRow {
    resident_id: String,
    name: String,
    email: String,
    pgy_level: u8,
    start_date: String,
    active: bool,
    specializations_json: String,
    preferences_json: String,
    created_at: String,
    updated_at: String,
}

impl RawResidentRow {
    fn into_domain(self) -> RepositoryResult<Resident> {
        let pgy_level =
            PgyLevel::from_ordinal(self.pgy_level).ok_or_else(|| RepositoryError::FieldValueError {
                field: "pgy_level".to_string(),
                message: format!("非法 PGY 序数: {}", self.pgy_level),
            })?;
        let preferences: ResidentPreferences =
            json_from_text("preferences_json", &self.preferences_json)?;
        let specializations: Vec<String> =
            json_from_text("specializations_json", &self.specializations_json)?;

        Ok(Resident {
            resident_id: self.resident_id,
            name: self.name,
            email: self.email,
            pgy_level,
            start_date: date_from_text("start_date", &self.start_date)?,
            active: self.active,
            specializations,
            preferences,
            created_at: datetime_from_text("created_at", &self.created_at)?,
            updated_at: datetime_from_text("updated_at", &self.updated_at)?,
        })
    }
}
