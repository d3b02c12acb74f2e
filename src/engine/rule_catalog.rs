// ==========================================
// 住院医师排班系统 - 排班规则目录
// ==========================================
// 红线: 规则全集是封闭枚举,穷尽 match 分发
//       硬规则违反 = 阻断发布; 软规则成本 = 求解优化目标
// ==========================================
// 输入: RuleContext (指派视图 + 资格参数)
// 输出: 逐指派校验结论 / 整表违规清单 / 软成本
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};

use crate::domain::quota::QuotaTable;
use crate::domain::resident::Resident;
use crate::domain::rule::{HardRule, HardRuleId, RuleScope, SchedulingRule, SoftRule, SoftRuleId};
use crate::domain::types::{PgyLevel, ShiftCategory};

// ==========================================
// RuleContext - 规则求值上下文
// ==========================================
// 承载当前 (部分) 排班的指派视图,支持求解器增量放置/回退
pub struct RuleContext<'a> {
    pub residents: &'a BTreeMap<String, Resident>,
    pub year_start: NaiveDate,
    pub orientation_window_days: i64,
    pub pgy2_moonlight_cutoff: NaiveDate,
    // ===== 指派视图 =====
    by_date: HashMap<NaiveDate, Vec<(String, ShiftCategory)>>,
    total_counts: HashMap<String, i32>,
    category_counts: HashMap<(String, ShiftCategory), i32>,
}

impl<'a> RuleContext<'a> {
    /// 构造空上下文
    pub fn new(
        residents: &'a BTreeMap<String, Resident>,
        year_start: NaiveDate,
        orientation_window_days: i64,
        pgy2_moonlight_cutoff: NaiveDate,
    ) -> Self {
        Self {
            residents,
            year_start,
            orientation_window_days,
            pgy2_moonlight_cutoff,
            by_date: HashMap::new(),
            total_counts: HashMap::new(),
            category_counts: HashMap::new(),
        }
    }

    /// 放置一条指派 (求解器前进)
    pub fn place(&mut self, resident_id: &str, date: NaiveDate, category: ShiftCategory) {
        self.by_date
            .entry(date)
            .or_default()
            .push((resident_id.to_string(), category));
        *self.total_counts.entry(resident_id.to_string()).or_insert(0) += 1;
        *self
            .category_counts
            .entry((resident_id.to_string(), category))
            .or_insert(0) += 1;
    }

    /// 回退一条指派 (求解器回溯的 undo 记录)
    pub fn unplace(&mut self, resident_id: &str, date: NaiveDate, category: ShiftCategory) {
        if let Some(entries) = self.by_date.get_mut(&date) {
            if let Some(pos) = entries
                .iter()
                .position(|(id, cat)| id == resident_id && *cat == category)
            {
                entries.swap_remove(pos);
            }
        }
        if let Some(count) = self.total_counts.get_mut(resident_id) {
            *count -= 1;
        }
        if let Some(count) = self
            .category_counts
            .get_mut(&(resident_id.to_string(), category))
        {
            *count -= 1;
        }
    }

    /// 某日的全部指派
    pub fn assignments_on(&self, date: NaiveDate) -> &[(String, ShiftCategory)] {
        self.by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 某人的指派总数
    pub fn total_count(&self, resident_id: &str) -> i32 {
        self.total_counts.get(resident_id).copied().unwrap_or(0)
    }

    /// 某人某类别的指派数
    pub fn category_count(&self, resident_id: &str, category: ShiftCategory) -> i32 {
        self.category_counts
            .get(&(resident_id.to_string(), category))
            .copied()
            .unwrap_or(0)
    }

    /// 某人在某日是否有指派
    pub fn has_duty_on(&self, resident_id: &str, date: NaiveDate) -> bool {
        self.assignments_on(date).iter().any(|(id, _)| id == resident_id)
    }
}

// ==========================================
// HardRuleViolation - 整表硬规则违规
// ==========================================
#[derive(Debug, Clone)]
pub struct HardRuleViolation {
    pub rule: HardRuleId,
    pub date: NaiveDate,
    pub detail: String,
}

// ==========================================
// RuleCatalog - 规则目录
// ==========================================
pub struct RuleCatalog {
    hard_rules: Vec<HardRule>,
    soft_rules: Vec<SoftRule>,
}

impl RuleCatalog {
    /// 标准规则目录
    ///
    /// # 参数
    /// - workload_balance_weight: 工作量均衡权重
    /// - preference_weight: 偏好匹配权重
    pub fn standard(workload_balance_weight: u32, preference_weight: u32) -> Self {
        Self {
            hard_rules: vec![
                HardRule {
                    id: HardRuleId::SameDayExclusive,
                    scope: RuleScope::PerResident,
                },
                HardRule {
                    id: HardRuleId::Pgy2OrientationCallBlackout,
                    scope: RuleScope::PerResident,
                },
                HardRule {
                    id: HardRuleId::Pgy2MoonlightCutoff,
                    scope: RuleScope::PerResident,
                },
                HardRule {
                    id: HardRuleId::WeekdayCallCoverage,
                    scope: RuleScope::PerDate,
                },
            ],
            soft_rules: vec![
                SoftRule {
                    id: SoftRuleId::WorkloadBalance,
                    scope: RuleScope::PerWeek,
                    weight: workload_balance_weight,
                },
                SoftRule {
                    id: SoftRuleId::PreferenceMatch,
                    scope: RuleScope::PerResident,
                    weight: preference_weight,
                },
            ],
        }
    }

    /// 硬规则全集
    pub fn hard_rules(&self) -> &[HardRule] {
        &self.hard_rules
    }

    /// 软规则全集
    pub fn soft_rules(&self) -> &[SoftRule] {
        &self.soft_rules
    }

    /// 规则全集 (tagged variant 视图, 便于统一枚举/序列化)
    pub fn rules(&self) -> Vec<SchedulingRule> {
        self.hard_rules
            .iter()
            .copied()
            .map(SchedulingRule::Hard)
            .chain(self.soft_rules.iter().copied().map(SchedulingRule::Soft))
            .collect()
    }

    /// 按 PGY 级别给出配额表 (项目配置常量,不计算)
    pub fn quotas_for(level: PgyLevel) -> QuotaTable {
        match level {
            PgyLevel::Pgy1 => QuotaTable {
                pgy_level: level,
                weekday_call_target: 6,
                weekend_call_target: 2,
                moonlight_target: 0,
                max_total_shifts: 10,
            },
            PgyLevel::Pgy2 => QuotaTable {
                pgy_level: level,
                weekday_call_target: 8,
                weekend_call_target: 3,
                moonlight_target: 2,
                max_total_shifts: 14,
            },
            PgyLevel::Pgy3 => QuotaTable {
                pgy_level: level,
                weekday_call_target: 6,
                weekend_call_target: 3,
                moonlight_target: 3,
                max_total_shifts: 13,
            },
            PgyLevel::Pgy4 => QuotaTable {
                pgy_level: level,
                weekday_call_target: 4,
                weekend_call_target: 2,
                moonlight_target: 3,
                max_total_shifts: 10,
            },
            PgyLevel::Pgy5 => QuotaTable {
                pgy_level: level,
                weekday_call_target: 2,
                weekend_call_target: 1,
                moonlight_target: 2,
                max_total_shifts: 6,
            },
        }
    }

    // ==========================================
    // 逐指派硬规则校验 (求解器增量使用)
    // ==========================================

    /// 校验"在 date 给 resident 放置 category"是否违反硬规则
    ///
    /// # 返回
    /// - Ok(()): 放置合法
    /// - Err(HardRuleId): 第一条被违反的硬规则
    pub fn check_placement(
        &self,
        ctx: &RuleContext<'_>,
        resident: &Resident,
        date: NaiveDate,
        category: ShiftCategory,
    ) -> Result<(), HardRuleId> {
        for rule in &self.hard_rules {
            let ok = match rule.id {
                HardRuleId::SameDayExclusive => !ctx
                    .assignments_on(date)
                    .iter()
                    .any(|(id, cat)| id == &resident.resident_id && cat.conflicts_with(&category)),
                HardRuleId::Pgy2OrientationCallBlackout => {
                    !(resident.pgy_level == PgyLevel::Pgy2
                        && is_call(category)
                        && date < ctx.year_start + Duration::days(ctx.orientation_window_days))
                }
                HardRuleId::Pgy2MoonlightCutoff => {
                    !(resident.pgy_level == PgyLevel::Pgy2
                        && category == ShiftCategory::Moonlight
                        && date < ctx.pgy2_moonlight_cutoff)
                }
                HardRuleId::WeekdayCallCoverage => {
                    // 放置视角: 工作日值班只允许落在工作日,且同日不得出现第二个
                    if category != ShiftCategory::WeekdayCall {
                        true
                    } else {
                        is_weekday(date)
                            && !ctx
                                .assignments_on(date)
                                .iter()
                                .any(|(_, cat)| *cat == ShiftCategory::WeekdayCall)
                    }
                }
            };
            if !ok {
                return Err(rule.id);
            }
        }
        Ok(())
    }

    // ==========================================
    // 整表硬规则校验 (发布门槛)
    // ==========================================

    /// 对完整 (或部分) 排班做逐日硬规则扫描
    ///
    /// # 参数
    /// - range: 排班区间 (闭区间)
    pub fn hard_violations(
        &self,
        ctx: &RuleContext<'_>,
        range: (NaiveDate, NaiveDate),
    ) -> Vec<HardRuleViolation> {
        let mut violations = Vec::new();
        let (start, end) = range;

        let mut date = start;
        while date <= end {
            for rule in &self.hard_rules {
                match rule.id {
                    HardRuleId::SameDayExclusive => {
                        // 同一人同日出现互斥类别组合
                        let mut seen: HashMap<&str, Vec<ShiftCategory>> = HashMap::new();
                        for (id, cat) in ctx.assignments_on(date) {
                            let prior = seen.entry(id.as_str()).or_default();
                            if prior.iter().any(|p| p.conflicts_with(cat)) {
                                violations.push(HardRuleViolation {
                                    rule: rule.id,
                                    date,
                                    detail: format!("住院医师 {} 同日互斥班次: {}", id, cat),
                                });
                            }
                            prior.push(*cat);
                        }
                    }
                    HardRuleId::Pgy2OrientationCallBlackout => {
                        let blackout_end =
                            ctx.year_start + Duration::days(ctx.orientation_window_days);
                        if date < blackout_end {
                            for (id, cat) in ctx.assignments_on(date) {
                                if is_call(*cat) && is_pgy2(ctx, id) {
                                    violations.push(HardRuleViolation {
                                        rule: rule.id,
                                        date,
                                        detail: format!("PGY-2 住院医师 {} 在带教窗口内值班", id),
                                    });
                                }
                            }
                        }
                    }
                    HardRuleId::Pgy2MoonlightCutoff => {
                        if date < ctx.pgy2_moonlight_cutoff {
                            for (id, cat) in ctx.assignments_on(date) {
                                if *cat == ShiftCategory::Moonlight && is_pgy2(ctx, id) {
                                    violations.push(HardRuleViolation {
                                        rule: rule.id,
                                        date,
                                        detail: format!("PGY-2 住院医师 {} 在解禁日期前夜间兼职", id),
                                    });
                                }
                            }
                        }
                    }
                    HardRuleId::WeekdayCallCoverage => {
                        if is_weekday(date) {
                            let count = ctx
                                .assignments_on(date)
                                .iter()
                                .filter(|(_, cat)| *cat == ShiftCategory::WeekdayCall)
                                .count();
                            if count != 1 {
                                violations.push(HardRuleViolation {
                                    rule: rule.id,
                                    date,
                                    detail: format!("工作日值班指派数为 {} (要求恰好 1)", count),
                                });
                            }
                        }
                    }
                }
            }
            date += Duration::days(1);
        }

        violations
    }

    // ==========================================
    // 软规则成本
    // ==========================================

    /// 整表软成本 = Σ(成本 × 权重)
    ///
    /// # 参数
    /// - range: 排班区间 (偏好匹配只统计区间内日期)
    pub fn soft_cost(&self, ctx: &RuleContext<'_>, range: (NaiveDate, NaiveDate)) -> i64 {
        self.soft_rules
            .iter()
            .map(|rule| {
                let cost = match rule.id {
                    SoftRuleId::WorkloadBalance => workload_balance_cost(ctx),
                    SoftRuleId::PreferenceMatch => preference_cost(ctx, range),
                };
                cost as i64 * rule.weight as i64
            })
            .sum()
    }
}

// ==========================================
// 软规则成本函数
// ==========================================

/// 工作量均衡成本: 各 PGY 级别内指派数方差之和 (取整)
fn workload_balance_cost(ctx: &RuleContext<'_>) -> u32 {
    let mut by_level: HashMap<PgyLevel, Vec<i32>> = HashMap::new();
    for resident in ctx.residents.values() {
        if resident.active {
            by_level
                .entry(resident.pgy_level)
                .or_default()
                .push(ctx.total_count(&resident.resident_id));
        }
    }

    let mut total = 0.0f64;
    for counts in by_level.values() {
        if counts.len() < 2 {
            continue;
        }
        let n = counts.len() as f64;
        let mean = counts.iter().sum::<i32>() as f64 / n;
        let variance = counts
            .iter()
            .map(|c| {
                let d = *c as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        total += variance;
    }
    total.round() as u32
}

/// 偏好匹配成本: 落在避开日的指派数 + 区间内未满足的期望日数
fn preference_cost(ctx: &RuleContext<'_>, range: (NaiveDate, NaiveDate)) -> u32 {
    let (start, end) = range;
    let mut cost = 0u32;

    for resident in ctx.residents.values() {
        if !resident.active {
            continue;
        }
        for avoided in &resident.preferences.avoided_dates {
            if *avoided >= start && *avoided <= end && ctx.has_duty_on(&resident.resident_id, *avoided)
            {
                cost += 1;
            }
        }
        for preferred in &resident.preferences.preferred_dates {
            if *preferred >= start
                && *preferred <= end
                && !ctx.has_duty_on(&resident.resident_id, *preferred)
            {
                cost += 1;
            }
        }
    }
    cost
}

// ==========================================
// 辅助判定
// ==========================================

/// 是否为值班类别 (带教窗口限制的对象)
pub(crate) fn is_call(category: ShiftCategory) -> bool {
    matches!(
        category,
        ShiftCategory::WeekdayCall | ShiftCategory::WeekendCall | ShiftCategory::HolidayCall
    )
}

/// 是否为工作日 (周一至周五)
pub(crate) fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_pgy2(ctx: &RuleContext<'_>, resident_id: &str) -> bool {
    ctx.residents
        .get(resident_id)
        .map(|r| r.pgy_level == PgyLevel::Pgy2)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resident::ResidentPreferences;
    use chrono::NaiveDateTime;

    fn make_resident(id: &str, level: PgyLevel) -> Resident {
        let ts = NaiveDateTime::parse_from_str("2025-06-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Resident {
            resident_id: id.to_string(),
            name: format!("Resident {}", id),
            email: format!("{}@hospital.test", id),
            pgy_level: level,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            active: true,
            specializations: vec![],
            preferences: ResidentPreferences::default(),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn residents_map(list: Vec<Resident>) -> BTreeMap<String, Resident> {
        list.into_iter().map(|r| (r.resident_id.clone(), r)).collect()
    }

    #[test]
    fn test_same_day_exclusive_blocks_second_placement() {
        let residents = residents_map(vec![make_resident("R001", PgyLevel::Pgy3)]);
        let year_start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut ctx = RuleContext::new(&residents, year_start, 30, cutoff);
        let catalog = RuleCatalog::standard(1, 2);

        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let resident = &residents["R001"];

        assert!(catalog
            .check_placement(&ctx, resident, date, ShiftCategory::WeekdayCall)
            .is_ok());
        ctx.place("R001", date, ShiftCategory::WeekdayCall);

        assert_eq!(
            catalog.check_placement(&ctx, resident, date, ShiftCategory::Moonlight),
            Err(HardRuleId::SameDayExclusive)
        );
    }

    #[test]
    fn test_pgy2_orientation_blackout() {
        let residents = residents_map(vec![make_resident("R002", PgyLevel::Pgy2)]);
        let year_start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let ctx = RuleContext::new(&residents, year_start, 30, cutoff);
        let catalog = RuleCatalog::standard(1, 2);
        let resident = &residents["R002"];

        // 带教窗口内 (7月15日) 值班被拒
        let inside = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        assert_eq!(
            catalog.check_placement(&ctx, resident, inside, ShiftCategory::WeekdayCall),
            Err(HardRuleId::Pgy2OrientationCallBlackout)
        );

        // 窗口之后 (8月15日) 放行
        let outside = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        assert!(catalog
            .check_placement(&ctx, resident, outside, ShiftCategory::WeekdayCall)
            .is_ok());
    }

    #[test]
    fn test_pgy2_moonlight_cutoff() {
        let residents = residents_map(vec![make_resident("R003", PgyLevel::Pgy2)]);
        let year_start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let ctx = RuleContext::new(&residents, year_start, 30, cutoff);
        let catalog = RuleCatalog::standard(1, 2);
        let resident = &residents["R003"];

        let before = NaiveDate::from_ymd_opt(2025, 12, 15).unwrap();
        assert_eq!(
            catalog.check_placement(&ctx, resident, before, ShiftCategory::Moonlight),
            Err(HardRuleId::Pgy2MoonlightCutoff)
        );

        let after = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert!(catalog
            .check_placement(&ctx, resident, after, ShiftCategory::Moonlight)
            .is_ok());
    }

    #[test]
    fn test_weekday_call_coverage_scan() {
        let residents = residents_map(vec![make_resident("R001", PgyLevel::Pgy3)]);
        let year_start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut ctx = RuleContext::new(&residents, year_start, 30, cutoff);
        let catalog = RuleCatalog::standard(1, 2);

        // 2025-09-01 (周一) 有值班, 09-02 (周二) 空缺
        let monday = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        ctx.place("R001", monday, ShiftCategory::WeekdayCall);

        let violations =
            catalog.hard_violations(&ctx, (monday, NaiveDate::from_ymd_opt(2025, 9, 2).unwrap()));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, HardRuleId::WeekdayCallCoverage);
        assert_eq!(violations[0].date, NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
    }

    #[test]
    fn test_workload_balance_cost_prefers_even_spread() {
        let residents = residents_map(vec![
            make_resident("R001", PgyLevel::Pgy3),
            make_resident("R002", PgyLevel::Pgy3),
        ]);
        let year_start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut ctx = RuleContext::new(&residents, year_start, 30, cutoff);

        // R001 背 4 个班, R002 为 0 → 方差 4
        for day in 1..=4 {
            ctx.place(
                "R001",
                NaiveDate::from_ymd_opt(2025, 9, day).unwrap(),
                ShiftCategory::WeekdayCall,
            );
        }
        assert_eq!(workload_balance_cost(&ctx), 4);
    }
}
