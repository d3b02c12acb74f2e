// ==========================================
// 住院医师排班系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键必须逐连接开启)
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 内置 schema 初始化, 库文件不存在时直接建表
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version (若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema (幂等)
///
/// 说明:
/// - 日期列统一 TEXT "%Y-%m-%d", 时间戳列统一 TEXT "%Y-%m-%d %H:%M:%S"
/// - 枚举列统一 SCREAMING_SNAKE_CASE 文本, PGY 级别存序数
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS resident (
            resident_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            pgy_level INTEGER NOT NULL,
            start_date TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            specializations_json TEXT NOT NULL DEFAULT '[]',
            preferences_json TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quota_target (
            resident_id TEXT NOT NULL REFERENCES resident(resident_id),
            category TEXT NOT NULL,
            target_count INTEGER NOT NULL,
            completed_count INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (resident_id, category)
        );

        CREATE TABLE IF NOT EXISTS time_off_request (
            request_id TEXT PRIMARY KEY,
            resident_id TEXT NOT NULL REFERENCES resident(resident_id),
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            reason TEXT,
            status TEXT NOT NULL,
            reviewed_by TEXT,
            reviewed_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS holiday_definition (
            definition_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            holiday_type TEXT NOT NULL,
            coverage_required INTEGER NOT NULL,
            min_pgy_level INTEGER NOT NULL,
            coverage_tier TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS holiday_instance (
            instance_id TEXT PRIMARY KEY,
            definition_id TEXT NOT NULL REFERENCES holiday_definition(definition_id),
            academic_year TEXT NOT NULL,
            holiday_date TEXT NOT NULL,
            name TEXT NOT NULL,
            holiday_type TEXT NOT NULL,
            coverage_required INTEGER NOT NULL,
            min_pgy_level INTEGER NOT NULL,
            coverage_tier TEXT NOT NULL,
            primary_resident_id TEXT REFERENCES resident(resident_id),
            backup_resident_id TEXT REFERENCES resident(resident_id),
            assignment_method TEXT,
            chief_notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (academic_year, definition_id, holiday_date)
        );

        CREATE TABLE IF NOT EXISTS schedule (
            schedule_id TEXT PRIMARY KEY,
            academic_year TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            algorithm TEXT NOT NULL,
            status TEXT NOT NULL,
            hard_rule_violations INTEGER NOT NULL DEFAULT 0,
            soft_rule_cost INTEGER NOT NULL DEFAULT 0,
            total_assignments INTEGER NOT NULL DEFAULT 0,
            config_snapshot_json TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assignment (
            assignment_id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL REFERENCES schedule(schedule_id),
            resident_id TEXT NOT NULL REFERENCES resident(resident_id),
            duty_date TEXT NOT NULL,
            category TEXT NOT NULL,
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (schedule_id, resident_id, duty_date, category)
        );
        CREATE INDEX IF NOT EXISTS idx_assignment_schedule_date
            ON assignment(schedule_id, duty_date);
        CREATE INDEX IF NOT EXISTS idx_assignment_resident
            ON assignment(schedule_id, resident_id);

        CREATE TABLE IF NOT EXISTS acgme_violation (
            violation_id TEXT PRIMARY KEY,
            schedule_id TEXT NOT NULL REFERENCES schedule(schedule_id),
            resident_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            severity TEXT NOT NULL,
            measured_value REAL NOT NULL,
            limit_value REAL NOT NULL,
            window_start TEXT NOT NULL,
            window_end TEXT NOT NULL,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_violation_schedule
            ON acgme_violation(schedule_id);

        CREATE TABLE IF NOT EXISTS academic_year_workflow (
            year_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            year_start TEXT NOT NULL,
            year_end TEXT NOT NULL,
            required_resident_count INTEGER NOT NULL,
            required_pgy_levels_json TEXT NOT NULL DEFAULT '[]',
            completion_pct REAL NOT NULL DEFAULT 0.0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            academic_year TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );
        "#,
    )?;

    // 记录 schema 版本 (重复初始化不重复写)
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 打开连接并保证 schema 就绪 (应用入口使用)
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
