// ==========================================
// 住院医师排班系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection};
use serde_json::json;
use std::error::Error;
use std::sync::{Arc, Mutex};

use crate::config::scheduling_config_trait::{
    SchedulingConfigReader, DEFAULT_CONSECUTIVE_HOUR_CAP, DEFAULT_DAYS_OFF_WINDOW,
    DEFAULT_MIN_REST_HOURS, DEFAULT_ORIENTATION_WINDOW_DAYS, DEFAULT_PREFERENCE_WEIGHT,
    DEFAULT_SOLVER_TIME_LIMIT_MS, DEFAULT_WEEKLY_HOUR_CAP, DEFAULT_WIND_DOWN_HOURS,
    DEFAULT_WORKLOAD_BALANCE_WEIGHT,
};
use crate::db::open_sqlite_connection;

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const WEEKLY_HOUR_CAP: &str = "acgme/weekly_hour_cap";
    pub const CONSECUTIVE_HOUR_CAP: &str = "acgme/consecutive_hour_cap";
    pub const WIND_DOWN_HOURS: &str = "acgme/wind_down_hours";
    pub const MIN_REST_HOURS: &str = "acgme/min_rest_hours";
    pub const DAYS_OFF_WINDOW: &str = "acgme/days_off_window";
    pub const ORIENTATION_WINDOW_DAYS: &str = "eligibility/orientation_window_days";
    pub const PGY2_MOONLIGHT_CUTOFF: &str = "eligibility/pgy2_moonlight_cutoff";
    pub const SOLVER_TIME_LIMIT_MS: &str = "solver/time_limit_ms";
    pub const WORKLOAD_BALANCE_WEIGHT: &str = "solver/workload_balance_weight";
    pub const PREFERENCE_WEIGHT: &str = "solver/preference_weight";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明: 为保证连接行为一致,会对传入连接再次应用统一 PRAGMA (幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值 (scope_id='global')
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入配置值 (scope_id='global', upsert)
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT (scope_id, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取数值配置,解析失败或缺失时回落默认值
    fn get_f64_or(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default))
    }

    fn get_i64_or(&self, key: &str, default: i64) -> Result<i64, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(default))
    }

    fn get_u32_or(&self, key: &str, default: u32) -> Result<u32, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default))
    }

    /// 获取当前生效配置的快照 (JSON)
    ///
    /// # 用途
    /// - 生成排班时记录配置现场,保证结果可追溯
    pub async fn snapshot(&self, year_start: NaiveDate) -> Result<serde_json::Value, Box<dyn Error>> {
        Ok(json!({
            "weekly_hour_cap": self.get_weekly_hour_cap().await?,
            "consecutive_hour_cap": self.get_consecutive_hour_cap().await?,
            "wind_down_hours": self.get_wind_down_hours().await?,
            "min_rest_hours": self.get_min_rest_hours().await?,
            "days_off_window": self.get_days_off_window().await?,
            "orientation_window_days": self.get_orientation_window_days().await?,
            "pgy2_moonlight_cutoff": self.get_pgy2_moonlight_cutoff(year_start).await?.to_string(),
            "solver_time_limit_ms": self.get_solver_time_limit_ms().await?,
            "workload_balance_weight": self.get_workload_balance_weight().await?,
            "preference_weight": self.get_preference_weight().await?,
        }))
    }
}

// ==========================================
// SchedulingConfigReader 实现
// ==========================================
#[async_trait]
impl SchedulingConfigReader for ConfigManager {
    async fn get_weekly_hour_cap(&self) -> Result<f64, Box<dyn Error>> {
        self.get_f64_or(config_keys::WEEKLY_HOUR_CAP, DEFAULT_WEEKLY_HOUR_CAP)
    }

    async fn get_consecutive_hour_cap(&self) -> Result<f64, Box<dyn Error>> {
        self.get_f64_or(config_keys::CONSECUTIVE_HOUR_CAP, DEFAULT_CONSECUTIVE_HOUR_CAP)
    }

    async fn get_wind_down_hours(&self) -> Result<f64, Box<dyn Error>> {
        self.get_f64_or(config_keys::WIND_DOWN_HOURS, DEFAULT_WIND_DOWN_HOURS)
    }

    async fn get_min_rest_hours(&self) -> Result<f64, Box<dyn Error>> {
        self.get_f64_or(config_keys::MIN_REST_HOURS, DEFAULT_MIN_REST_HOURS)
    }

    async fn get_days_off_window(&self) -> Result<i64, Box<dyn Error>> {
        self.get_i64_or(config_keys::DAYS_OFF_WINDOW, DEFAULT_DAYS_OFF_WINDOW)
    }

    async fn get_orientation_window_days(&self) -> Result<i64, Box<dyn Error>> {
        self.get_i64_or(
            config_keys::ORIENTATION_WINDOW_DAYS,
            DEFAULT_ORIENTATION_WINDOW_DAYS,
        )
    }

    async fn get_pgy2_moonlight_cutoff(
        &self,
        year_start: NaiveDate,
    ) -> Result<NaiveDate, Box<dyn Error>> {
        if let Some(raw) = self.get_config_value(config_keys::PGY2_MOONLIGHT_CUTOFF)? {
            if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                return Ok(date);
            }
        }
        // 默认: 学年跨入的次年 1 月 1 日
        NaiveDate::from_ymd_opt(year_start.year() + 1, 1, 1)
            .ok_or_else(|| "无法计算默认夜间兼职解禁日期".into())
    }

    async fn get_solver_time_limit_ms(&self) -> Result<u64, Box<dyn Error>> {
        Ok(self
            .get_i64_or(config_keys::SOLVER_TIME_LIMIT_MS, DEFAULT_SOLVER_TIME_LIMIT_MS as i64)?
            .max(0) as u64)
    }

    async fn get_workload_balance_weight(&self) -> Result<u32, Box<dyn Error>> {
        self.get_u32_or(
            config_keys::WORKLOAD_BALANCE_WEIGHT,
            DEFAULT_WORKLOAD_BALANCE_WEIGHT,
        )
    }

    async fn get_preference_weight(&self) -> Result<u32, Box<dyn Error>> {
        self.get_u32_or(config_keys::PREFERENCE_WEIGHT, DEFAULT_PREFERENCE_WEIGHT)
    }
}
