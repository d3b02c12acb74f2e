// ==========================================
// 住院医师排班系统 - 节假日仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 范围: holiday_definition (模板) + holiday_instance (学年实例)
// ==========================================

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

use crate::domain::holiday::{HolidayCoverageInstance, HolidayDefinition};
use crate::domain::types::{AssignmentMethod, CoverageTier, HolidayType, PgyLevel};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::mapping::{
    date_from_text, date_to_text, datetime_from_text, datetime_to_text, enum_from_text,
};

// ==========================================
// HolidayRepository - 节假日仓储
// ==========================================
pub struct HolidayRepository {
    conn: Arc<Mutex<Connection>>,
}

impl HolidayRepository {
    /// 创建新的节假日仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 模板 (holiday_definition)
    // ==========================================

    /// 插入节假日模板
    pub fn insert_definition(&self, definition: &HolidayDefinition) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO holiday_definition (
                definition_id, name, holiday_type, coverage_required,
                min_pgy_level, coverage_tier, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                definition.definition_id,
                definition.name,
                definition.holiday_type.to_string(),
                definition.coverage_required as i64,
                definition.min_pgy_level.as_ordinal(),
                definition.coverage_tier.to_string(),
                datetime_to_text(definition.created_at),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询模板
    pub fn find_definition(&self, definition_id: &str) -> RepositoryResult<Option<HolidayDefinition>> {
        let conn = self.get_conn()?;
        let raw = conn
            .prepare(
                r#"
                SELECT definition_id, name, holiday_type, coverage_required,
                       min_pgy_level, coverage_tier, created_at
                FROM holiday_definition
                WHERE definition_id = ?1
                "#,
            )?
            .query_row(params![definition_id], Self::map_definition_row)
            .optional()?;
        raw.map(RawDefinitionRow::into_domain).transpose()
    }

    /// 查询全部模板 (按名称)
    pub fn list_definitions(&self) -> RepositoryResult<Vec<HolidayDefinition>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT definition_id, name, holiday_type, coverage_required,
                   min_pgy_level, coverage_tier, created_at
            FROM holiday_definition
            ORDER BY name
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::map_definition_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawDefinitionRow::into_domain).collect()
    }

    fn map_definition_row(row: &Row<'_>) -> rusqlite::Result<RawDefinitionRow> {
        Ok(RawDefinitionRow {
            definition_id: row.get(0)?,
            name: row.get(1)?,
            holiday_type: row.get(2)?,
            coverage_required: row.get::<_, i64>(3)? != 0,
            min_pgy_level: row.get(4)?,
            coverage_tier: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // ==========================================
    // 实例 (holiday_instance)
    // ==========================================

    const INSTANCE_COLS: &'static str = r#"
        instance_id, definition_id, academic_year, holiday_date, name,
        holiday_type, coverage_required, min_pgy_level, coverage_tier,
        primary_resident_id, backup_resident_id, assignment_method,
        chief_notes, created_at, updated_at
    "#;

    /// 插入学年实例
    pub fn insert_instance(&self, instance: &HolidayCoverageInstance) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO holiday_instance (
                instance_id, definition_id, academic_year, holiday_date, name,
                holiday_type, coverage_required, min_pgy_level, coverage_tier,
                primary_resident_id, backup_resident_id, assignment_method,
                chief_notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                instance.instance_id,
                instance.definition_id,
                instance.academic_year,
                date_to_text(instance.holiday_date),
                instance.name,
                instance.holiday_type.to_string(),
                instance.coverage_required as i64,
                instance.min_pgy_level.as_ordinal(),
                instance.coverage_tier.to_string(),
                instance.primary_resident_id,
                instance.backup_resident_id,
                instance.assignment_method.map(|m| m.to_string()),
                instance.chief_notes,
                datetime_to_text(instance.created_at),
                datetime_to_text(instance.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 更新实例 (覆盖指派状态与快照可变部分)
    pub fn update_instance(&self, instance: &HolidayCoverageInstance) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE holiday_instance SET
                coverage_required = ?2, min_pgy_level = ?3, coverage_tier = ?4,
                primary_resident_id = ?5, backup_resident_id = ?6,
                assignment_method = ?7, chief_notes = ?8, updated_at = ?9
            WHERE instance_id = ?1
            "#,
            params![
                instance.instance_id,
                instance.coverage_required as i64,
                instance.min_pgy_level.as_ordinal(),
                instance.coverage_tier.to_string(),
                instance.primary_resident_id,
                instance.backup_resident_id,
                instance.assignment_method.map(|m| m.to_string()),
                instance.chief_notes,
                datetime_to_text(instance.updated_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "HolidayCoverageInstance".to_string(),
                id: instance.instance_id.clone(),
            });
        }
        Ok(())
    }

    /// 按ID查询实例
    pub fn find_instance(&self, instance_id: &str) -> RepositoryResult<Option<HolidayCoverageInstance>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM holiday_instance WHERE instance_id = ?1",
            Self::INSTANCE_COLS
        );
        let raw = conn
            .prepare(&sql)?
            .query_row(params![instance_id], Self::map_instance_row)
            .optional()?;
        raw.map(RawInstanceRow::into_domain).transpose()
    }

    /// 按学年查询实例 (按日期)
    pub fn list_instances_by_year(&self, academic_year: &str) -> RepositoryResult<Vec<HolidayCoverageInstance>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM holiday_instance WHERE academic_year = ?1 ORDER BY holiday_date",
            Self::INSTANCE_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![academic_year], Self::map_instance_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawInstanceRow::into_domain).collect()
    }

    /// 按日期区间查询实例 (排班表激活守卫使用)
    pub fn list_instances_in_range(
        &self,
        range_start: NaiveDate,
        range_end: NaiveDate,
    ) -> RepositoryResult<Vec<HolidayCoverageInstance>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM holiday_instance
            WHERE holiday_date BETWEEN ?1 AND ?2
            ORDER BY holiday_date
            "#,
            Self::INSTANCE_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![date_to_text(range_start), date_to_text(range_end)],
                Self::map_instance_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawInstanceRow::into_domain).collect()
    }

    fn map_instance_row(row: &Row<'_>) -> rusqlite::Result<RawInstanceRow> {
        Ok(RawInstanceRow {
            instance_id: row.get(0)?,
            definition_id: row.get(1)?,
            academic_year: row.get(2)?,
            holiday_date: row.get(3)?,
            name: row.get(4)?,
            holiday_type: row.get(5)?,
            coverage_required: row.get::<_, i64>(6)? != 0,
            min_pgy_level: row.get(7)?,
            coverage_tier: row.get(8)?,
            primary_resident_id: row.get(9)?,
            backup_resident_id: row.get(10)?,
            assignment_method: row.get(11)?,
            chief_notes: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

// ==========================================
// 行中间结构
// ==========================================

struct RawDefinitionRow {
    definition_id: String,
    name: String,
    holiday_type: String,
    coverage_required: bool,
    min_pgy_level: u8,
    coverage_tier: String,
    created_at: String,
}

impl RawDefinitionRow {
    fn into_domain(self) -> RepositoryResult<HolidayDefinition> {
        Ok(HolidayDefinition {
            definition_id: self.definition_id,
            name: self.name,
            holiday_type: enum_from_text::<HolidayType>("holiday_type", &self.holiday_type)?,
            coverage_required: self.coverage_required,
            min_pgy_level: PgyLevel::from_ordinal(self.min_pgy_level).ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: "min_pgy_level".to_string(),
                    message: format!("非法 PGY 序数: {}", self.min_pgy_level),
                }
            })?,
            coverage_tier: enum_from_text::<CoverageTier>("coverage_tier", &self.coverage_tier)?,
            created_at: datetime_from_text("created_at", &self.created_at)?,
        })
    }
}

struct RawInstanceRow {
    instance_id: String,
    definition_id: String,
    academic_year: String,
    holiday_date: String,
    name: String,
    holiday_type: String,
    coverage_required: bool,
    min_pgy_level: u8,
    coverage_tier: String,
    primary_resident_id: Option<String>,
    backup_resident_id: Option<String>,
    assignment_method: Option<String>,
    chief_notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawInstanceRow {
    fn into_domain(self) -> RepositoryResult<HolidayCoverageInstance> {
        Ok(HolidayCoverageInstance {
            instance_id: self.instance_id,
            definition_id: self.definition_id,
            academic_year: self.academic_year,
            holiday_date: date_from_text("holiday_date", &self.holiday_date)?,
            name: self.name,
            holiday_type: enum_from_text::<HolidayType>("holiday_type", &self.holiday_type)?,
            coverage_required: self.coverage_required,
            min_pgy_level: PgyLevel::from_ordinal(self.min_pgy_level).ok_or_else(|| {
                RepositoryError::FieldValueError {
                    field: "min_pgy_level".to_string(),
                    message: format!("非法 PGY 序数: {}", self.min_pgy_level),
                }
            })?,
            coverage_tier: enum_from_text::<CoverageTier>("coverage_tier", &self.coverage_tier)?,
            primary_resident_id: self.primary_resident_id,
            backup_resident_id: self.backup_resident_id,
            assignment_method: self
                .assignment_method
                .map(|raw| enum_from_text::<AssignmentMethod>("assignment_method", &raw))
                .transpose()?,
            chief_notes: self.chief_notes,
            created_at: datetime_from_text("created_at", &self.created_at)?,
            updated_at: datetime_from_text("updated_at", &self.updated_at)?,
        })
    }
}
