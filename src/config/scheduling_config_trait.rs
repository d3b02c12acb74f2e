// ==========================================
// 住院医师排班系统 - 排班配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口 (不包含实现)
// 红线: 不包含配置写入、不包含业务逻辑
// 说明: ACGME 限值与豁免阈值是配置,不是硬编码常量
// ==========================================

use async_trait::async_trait;
use chrono::NaiveDate;
use std::error::Error;

// ==========================================
// 默认值 (标准 ACGME 常量)
// ==========================================

/// 滚动 7 日工时上限 (小时)
pub const DEFAULT_WEEKLY_HOUR_CAP: f64 = 80.0;
/// 连续值班时长上限 (小时, 不含交接缓冲)
pub const DEFAULT_CONSECUTIVE_HOUR_CAP: f64 = 24.0;
/// 连续值班后允许的交接缓冲 (小时)
pub const DEFAULT_WIND_DOWN_HOURS: f64 = 4.0;
/// 班间最短休息 (小时)
pub const DEFAULT_MIN_REST_HOURS: f64 = 14.0;
/// 休息日检查窗口 (天, 每窗口至少 1 个完整休息日)
pub const DEFAULT_DAYS_OFF_WINDOW: i64 = 7;
/// PGY-2 带教窗口 (学年前 N 天不参与值班)
pub const DEFAULT_ORIENTATION_WINDOW_DAYS: i64 = 30;
/// 求解器默认时间预算 (毫秒)
pub const DEFAULT_SOLVER_TIME_LIMIT_MS: u64 = 5_000;
/// 工作量均衡软规则默认权重
pub const DEFAULT_WORKLOAD_BALANCE_WEIGHT: u32 = 1;
/// 偏好匹配软规则默认权重
pub const DEFAULT_PREFERENCE_WEIGHT: u32 = 2;

// ==========================================
// SchedulingConfigReader Trait
// ==========================================
// 用途: 合规引擎与求解器所需的配置读取接口
// 实现者: ConfigManager (从 config_kv 表读取)
#[async_trait]
pub trait SchedulingConfigReader: Send + Sync {
    // ===== ACGME 工时限值 =====

    /// 获取滚动 7 日工时上限
    ///
    /// # 默认值
    /// - 80.0
    async fn get_weekly_hour_cap(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取连续值班时长上限 (不含交接缓冲)
    ///
    /// # 默认值
    /// - 24.0
    async fn get_consecutive_hour_cap(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取连续值班后允许的交接缓冲
    ///
    /// # 默认值
    /// - 4.0
    async fn get_wind_down_hours(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取班间最短休息时长
    ///
    /// # 默认值
    /// - 14.0
    async fn get_min_rest_hours(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取休息日检查窗口天数
    ///
    /// # 默认值
    /// - 7
    async fn get_days_off_window(&self) -> Result<i64, Box<dyn Error>>;

    // ===== 排班资格配置 =====

    /// 获取 PGY-2 带教窗口天数 (学年起始后 N 天内不参与值班)
    ///
    /// # 默认值
    /// - 30
    async fn get_orientation_window_days(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取 PGY-2 夜间兼职解禁日期
    ///
    /// # 参数
    /// - year_start: 学年开始日期 (7月1日)
    ///
    /// # 逻辑
    /// - 配置了绝对日期 (pgy2_moonlight_cutoff) 则使用配置值
    /// - 否则默认次年 1 月 1 日
    async fn get_pgy2_moonlight_cutoff(
        &self,
        year_start: NaiveDate,
    ) -> Result<NaiveDate, Box<dyn Error>>;

    // ===== 求解器配置 =====

    /// 获取求解器默认时间预算 (毫秒)
    ///
    /// # 默认值
    /// - 5000
    async fn get_solver_time_limit_ms(&self) -> Result<u64, Box<dyn Error>>;

    /// 获取工作量均衡软规则权重
    ///
    /// # 默认值
    /// - 1
    async fn get_workload_balance_weight(&self) -> Result<u32, Box<dyn Error>>;

    /// 获取偏好匹配软规则权重
    ///
    /// # 默认值
    /// - 2
    async fn get_preference_weight(&self) -> Result<u32, Box<dyn Error>>;
}
