// ==========================================
// 住院医师排班系统 - 领域类型定义
// ==========================================
// 红线: 等级与状态全部使用封闭枚举,不用字符串注册表
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// PGY 级别 (Post-Graduate Year)
// ==========================================
// 顺序: Pgy1 < Pgy2 < ... < Pgy5
// 说明: Pgy5 代表 "PGY-5 及以上"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PgyLevel {
    Pgy1,
    Pgy2,
    Pgy3,
    Pgy4,
    Pgy5, // 5 及以上
}

impl PgyLevel {
    /// 序数表示 (1..=5)
    pub fn as_ordinal(&self) -> u8 {
        match self {
            PgyLevel::Pgy1 => 1,
            PgyLevel::Pgy2 => 2,
            PgyLevel::Pgy3 => 3,
            PgyLevel::Pgy4 => 4,
            PgyLevel::Pgy5 => 5,
        }
    }

    /// 从序数构造
    ///
    /// # 返回
    /// - Some(PgyLevel): 1..=5 (5 以上归入 Pgy5)
    /// - None: 0 等非法输入
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            1 => Some(PgyLevel::Pgy1),
            2 => Some(PgyLevel::Pgy2),
            3 => Some(PgyLevel::Pgy3),
            4 => Some(PgyLevel::Pgy4),
            n if n >= 5 => Some(PgyLevel::Pgy5),
            _ => None,
        }
    }
}

impl fmt::Display for PgyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PGY_{}", self.as_ordinal())
    }
}

// ==========================================
// 班次类别 (Shift Category)
// ==========================================
// 红线: 同日互斥类别不可重复指派同一住院医师
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftCategory {
    WeekdayCall, // 工作日值班
    WeekendCall, // 周末值班
    HolidayCall, // 节假日值班
    Moonlight,   // 夜间兼职班
}

impl ShiftCategory {
    /// 全部类别 (固定遍历顺序)
    pub const ALL: [ShiftCategory; 4] = [
        ShiftCategory::WeekdayCall,
        ShiftCategory::WeekendCall,
        ShiftCategory::HolidayCall,
        ShiftCategory::Moonlight,
    ];

    /// 同日互斥判定
    ///
    /// 规则: 所有值班类别与夜间兼职两两互斥
    /// (一名住院医师一天只能承担一个值班/兼职单元)
    pub fn conflicts_with(&self, other: &ShiftCategory) -> bool {
        // 目前全部类别两两互斥; 保留接口以便未来引入非互斥类别(如门诊)
        let _ = other;
        true
    }

    /// 班次时长 (小时)
    pub fn duty_hours(&self) -> i64 {
        match self {
            ShiftCategory::WeekdayCall => 16,
            ShiftCategory::WeekendCall => 24,
            ShiftCategory::HolidayCall => 24,
            ShiftCategory::Moonlight => 12,
        }
    }

    /// 班次起始时刻
    pub fn start_time(&self) -> NaiveTime {
        match self {
            ShiftCategory::WeekdayCall => NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            ShiftCategory::WeekendCall => NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            ShiftCategory::HolidayCall => NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            ShiftCategory::Moonlight => NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        }
    }

    /// 推导班次的起止时间窗
    ///
    /// # 参数
    /// - date: 排班日期 (班次起始日)
    ///
    /// # 返回
    /// (开始时间, 结束时间) — 跨午夜班次的结束时间落在次日
    pub fn duty_window(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = date.and_time(self.start_time());
        let end = start + chrono::Duration::hours(self.duty_hours());
        (start, end)
    }

    /// 求解器填充优先级 (数值越小越先填)
    ///
    /// 顺序: 节假日值班 → 工作日值班 → 夜间兼职 → 周末值班
    pub fn fill_priority(&self) -> u8 {
        match self {
            ShiftCategory::HolidayCall => 0,
            ShiftCategory::WeekdayCall => 1,
            ShiftCategory::Moonlight => 2,
            ShiftCategory::WeekendCall => 3,
        }
    }
}

impl fmt::Display for ShiftCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShiftCategory::WeekdayCall => write!(f, "WEEKDAY_CALL"),
            ShiftCategory::WeekendCall => write!(f, "WEEKEND_CALL"),
            ShiftCategory::HolidayCall => write!(f, "HOLIDAY_CALL"),
            ShiftCategory::Moonlight => write!(f, "MOONLIGHT"),
        }
    }
}

// ==========================================
// 排班表状态 (Schedule Status)
// ==========================================
// 转换: Draft → Active → Archived
// 红线: hard_rule_violations > 0 的排班表不可激活
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Draft,    // 草稿
    Active,   // 生效
    Archived, // 归档
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Draft => write!(f, "DRAFT"),
            ScheduleStatus::Active => write!(f, "ACTIVE"),
            ScheduleStatus::Archived => write!(f, "ARCHIVED"),
        }
    }
}

// ==========================================
// 休假申请状态 (Time-Off Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeOffStatus {
    Pending,  // 待审批
    Approved, // 已批准
    Denied,   // 已驳回
}

impl fmt::Display for TimeOffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeOffStatus::Pending => write!(f, "PENDING"),
            TimeOffStatus::Approved => write!(f, "APPROVED"),
            TimeOffStatus::Denied => write!(f, "DENIED"),
        }
    }
}

// ==========================================
// 学年工作流状态 (Workflow State)
// ==========================================
// 顺序推进,每步由守卫函数把关
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Created,              // 已创建
    ResidentsRegistered,  // 住院医师注册完成
    HolidaysConfigured,   // 节假日配置完成
    PreferencesCollected, // 偏好收集完成
    ReadyForSchedule,     // 可生成排班
    ScheduleGenerated,    // 排班已生成
    Published,            // 已发布
}

impl WorkflowState {
    /// 状态序数 (0..=6), 用于完成度计算
    pub fn step_index(&self) -> u8 {
        match self {
            WorkflowState::Created => 0,
            WorkflowState::ResidentsRegistered => 1,
            WorkflowState::HolidaysConfigured => 2,
            WorkflowState::PreferencesCollected => 3,
            WorkflowState::ReadyForSchedule => 4,
            WorkflowState::ScheduleGenerated => 5,
            WorkflowState::Published => 6,
        }
    }

    /// 顺序上的下一个状态
    pub fn next(&self) -> Option<WorkflowState> {
        match self {
            WorkflowState::Created => Some(WorkflowState::ResidentsRegistered),
            WorkflowState::ResidentsRegistered => Some(WorkflowState::HolidaysConfigured),
            WorkflowState::HolidaysConfigured => Some(WorkflowState::PreferencesCollected),
            WorkflowState::PreferencesCollected => Some(WorkflowState::ReadyForSchedule),
            WorkflowState::ReadyForSchedule => Some(WorkflowState::ScheduleGenerated),
            WorkflowState::ScheduleGenerated => Some(WorkflowState::Published),
            WorkflowState::Published => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Created => write!(f, "CREATED"),
            WorkflowState::ResidentsRegistered => write!(f, "RESIDENTS_REGISTERED"),
            WorkflowState::HolidaysConfigured => write!(f, "HOLIDAYS_CONFIGURED"),
            WorkflowState::PreferencesCollected => write!(f, "PREFERENCES_COLLECTED"),
            WorkflowState::ReadyForSchedule => write!(f, "READY_FOR_SCHEDULE"),
            WorkflowState::ScheduleGenerated => write!(f, "SCHEDULE_GENERATED"),
            WorkflowState::Published => write!(f, "PUBLISHED"),
        }
    }
}

// ==========================================
// ACGME 违规类别 (Violation Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    WeeklyHours,      // 滚动 7 日工时超限
    ConsecutiveHours, // 连续值班时长超限
    RestPeriod,       // 班间休息不足
    DaysOff,          // 7 日内无完整休息日
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::WeeklyHours => write!(f, "WEEKLY_HOURS"),
            ViolationKind::ConsecutiveHours => write!(f, "CONSECUTIVE_HOURS"),
            ViolationKind::RestPeriod => write!(f, "REST_PERIOD"),
            ViolationKind::DaysOff => write!(f, "DAYS_OFF"),
        }
    }
}

// ==========================================
// 违规严重度 (Severity)
// ==========================================
// 顺序: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 依据相对超限幅度分级
    ///
    /// 规则: 超限 >10% → Critical, >5% → High, >2% → Medium, 其余 → Low
    pub fn from_excess_ratio(measured: f64, limit: f64) -> Self {
        if limit <= 0.0 {
            return Severity::Critical;
        }
        let excess = (measured - limit) / limit;
        if excess > 0.10 {
            Severity::Critical
        } else if excess > 0.05 {
            Severity::High
        } else if excess > 0.02 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// 依据相对缺口幅度分级 (用于"低于下限"类违规, 如班间休息不足)
    ///
    /// 规则: 缺口 >10% → Critical, >5% → High, >2% → Medium, 其余 → Low
    pub fn from_deficit_ratio(measured: f64, required: f64) -> Self {
        if required <= 0.0 {
            return Severity::Low;
        }
        let deficit = (required - measured) / required;
        if deficit > 0.10 {
            Severity::Critical
        } else if deficit > 0.05 {
            Severity::High
        } else if deficit > 0.02 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ==========================================
// 节假日覆盖层级 (Coverage Tier)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageTier {
    Full,          // 全员配置
    Reduced,       // 缩减配置
    EmergencyOnly, // 仅急诊
}

impl fmt::Display for CoverageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageTier::Full => write!(f, "FULL"),
            CoverageTier::Reduced => write!(f, "REDUCED"),
            CoverageTier::EmergencyOnly => write!(f, "EMERGENCY_ONLY"),
        }
    }
}

// ==========================================
// 节假日类型 (Holiday Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayType {
    Federal,   // 法定假日
    Hospital,  // 院内假日
    Religious, // 宗教节日
}

impl fmt::Display for HolidayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolidayType::Federal => write!(f, "FEDERAL"),
            HolidayType::Hospital => write!(f, "HOSPITAL"),
            HolidayType::Religious => write!(f, "RELIGIOUS"),
        }
    }
}

// ==========================================
// 指派方式 (Assignment Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentMethod {
    Auto,      // 轮转策略自动指派
    Manual,    // 总值班人工指派
    Volunteer, // 自愿报名
}

impl fmt::Display for AssignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentMethod::Auto => write!(f, "AUTO"),
            AssignmentMethod::Manual => write!(f, "MANUAL"),
            AssignmentMethod::Volunteer => write!(f, "VOLUNTEER"),
        }
    }
}

// ==========================================
// 求解终止状态 (Solve Status)
// ==========================================
// 说明: TimedOut 不是错误,是可重试的终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Complete, // 全部槽位填充完成
    Partial,  // 存在不可填充槽位
    TimedOut, // 超出时间预算,返回最优部分解
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Complete => write!(f, "COMPLETE"),
            SolveStatus::Partial => write!(f, "PARTIAL"),
            SolveStatus::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pgy_level_ordering() {
        assert!(PgyLevel::Pgy2 < PgyLevel::Pgy3);
        assert_eq!(PgyLevel::from_ordinal(7), Some(PgyLevel::Pgy5));
        assert_eq!(PgyLevel::from_ordinal(0), None);
    }

    #[test]
    fn test_duty_window_crosses_midnight() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let (start, end) = ShiftCategory::WeekdayCall.duty_window(date);
        assert_eq!(start.date(), date);
        assert_eq!(end.date(), date.succ_opt().unwrap());
        assert_eq!((end - start).num_hours(), 16);
    }

    #[test]
    fn test_severity_from_excess_ratio() {
        assert_eq!(Severity::from_excess_ratio(90.0, 80.0), Severity::Critical);
        assert_eq!(Severity::from_excess_ratio(85.0, 80.0), Severity::High);
        assert_eq!(Severity::from_excess_ratio(82.0, 80.0), Severity::Medium);
        assert_eq!(Severity::from_excess_ratio(80.5, 80.0), Severity::Low);
    }
}
