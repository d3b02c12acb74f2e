// ==========================================
// 住院医师排班系统 - 排班规则领域模型
// ==========================================
// 红线: 规则是封闭 tagged variant, 不是字符串ID注册表
//       硬规则 = 布尔谓词, 软规则 = 非负成本 × 固定权重
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// RuleScope - 规则作用域
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleScope {
    PerDate,     // 按日检查
    PerResident, // 按人检查
    PerWeek,     // 按周检查
}

// ==========================================
// HardRuleId - 硬规则全集
// ==========================================
// 违反任意一条即阻断发布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardRuleId {
    /// 同日互斥类别不可重复指派同一人
    SameDayExclusive,
    /// PGY-2 在学年前 N 天 (带教窗口) 不参与值班
    Pgy2OrientationCallBlackout,
    /// PGY-2 在配置日期前不可承担夜间兼职
    Pgy2MoonlightCutoff,
    /// 每个工作日恰好一个主值班指派
    WeekdayCallCoverage,
}

impl HardRuleId {
    /// 硬规则全集 (固定遍历顺序)
    pub const ALL: [HardRuleId; 4] = [
        HardRuleId::SameDayExclusive,
        HardRuleId::Pgy2OrientationCallBlackout,
        HardRuleId::Pgy2MoonlightCutoff,
        HardRuleId::WeekdayCallCoverage,
    ];
}

impl fmt::Display for HardRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardRuleId::SameDayExclusive => write!(f, "SAME_DAY_EXCLUSIVE"),
            HardRuleId::Pgy2OrientationCallBlackout => write!(f, "PGY2_ORIENTATION_CALL_BLACKOUT"),
            HardRuleId::Pgy2MoonlightCutoff => write!(f, "PGY2_MOONLIGHT_CUTOFF"),
            HardRuleId::WeekdayCallCoverage => write!(f, "WEEKDAY_CALL_COVERAGE"),
        }
    }
}

// ==========================================
// SoftRuleId - 软规则全集
// ==========================================
// 求解器最小化 Σ(成本 × 权重), 允许不完全满足
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoftRuleId {
    /// 同级别工作量均衡 (成本 = 指派数方差)
    WorkloadBalance,
    /// 偏好匹配 (成本 = 被违反的期望/避开日期数)
    PreferenceMatch,
}

impl SoftRuleId {
    /// 软规则全集 (固定遍历顺序)
    pub const ALL: [SoftRuleId; 2] = [SoftRuleId::WorkloadBalance, SoftRuleId::PreferenceMatch];
}

impl fmt::Display for SoftRuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftRuleId::WorkloadBalance => write!(f, "WORKLOAD_BALANCE"),
            SoftRuleId::PreferenceMatch => write!(f, "PREFERENCE_MATCH"),
        }
    }
}

// ==========================================
// HardRule / SoftRule / SchedulingRule
// ==========================================

/// 硬规则定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardRule {
    pub id: HardRuleId,
    pub scope: RuleScope,
}

/// 软规则定义 (带固定权重)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftRule {
    pub id: SoftRuleId,
    pub scope: RuleScope,
    pub weight: u32,
}

/// 排班规则 (封闭 tagged variant)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulingRule {
    Hard(HardRule),
    Soft(SoftRule),
}
