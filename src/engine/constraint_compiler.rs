// ==========================================
// 住院医师排班系统 - 约束编译器
// ==========================================
// 职责: 把规则目录硬规则、配额、休假申请、节假日覆盖需求
//       合并为求解器可消费的约束集
// 红线: 必填槽位零候选人必须显式上报 ConstraintError,
//       绝不静默丢弃
// ==========================================

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::holiday::CoverageRequirement;
use crate::domain::resident::Resident;
use crate::domain::timeoff::TimeOffRequest;
use crate::domain::types::{PgyLevel, ShiftCategory};
use crate::engine::rule_catalog::{is_call, is_weekday};

// ==========================================
// ConstraintError - 不可覆盖槽位
// ==========================================
#[derive(Error, Debug, Clone, Serialize)]
#[error("无可用住院医师: date={date}, category={category}: {detail}")]
pub struct ConstraintError {
    pub date: NaiveDate,
    pub category: ShiftCategory,
    pub detail: String,
}

// ==========================================
// SlotRequirement / DayConstraints / ConstraintSet
// ==========================================

/// 单个待填槽位
#[derive(Debug, Clone)]
pub struct SlotRequirement {
    pub date: NaiveDate,
    pub category: ShiftCategory,
    pub mandatory: bool,                  // 必填 (值班/节假日) 或可选 (夜间兼职)
    pub min_pgy_level: Option<PgyLevel>,  // 节假日槽位的级别下限
    pub holiday_name: Option<String>,     // 节假日名称 (可解释性)
    pub eligible: Vec<String>,            // 候选住院医师ID (字典序)
}

/// 单日槽位集 (按填充优先级排序)
#[derive(Debug, Clone)]
pub struct DayConstraints {
    pub date: NaiveDate,
    pub slots: Vec<SlotRequirement>,
}

/// 编译产物: 求解器的全部输入
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub range: (NaiveDate, NaiveDate),
    pub days: Vec<DayConstraints>,
    pub residents: BTreeMap<String, Resident>,
    // ===== 硬规则参数 (求解器构造 RuleContext 使用) =====
    pub year_start: NaiveDate,
    pub orientation_window_days: i64,
    pub pgy2_moonlight_cutoff: NaiveDate,
}

impl ConstraintSet {
    /// 必填槽位总数
    pub fn mandatory_slot_count(&self) -> usize {
        self.days
            .iter()
            .flat_map(|day| day.slots.iter())
            .filter(|slot| slot.mandatory)
            .count()
    }
}

/// 编译结果: 约束集 + 全部不可覆盖槽位
#[derive(Debug)]
pub struct CompileOutcome {
    pub set: ConstraintSet,
    pub errors: Vec<ConstraintError>,
}

// ==========================================
// CompileInput - 编译输入
// ==========================================
pub struct CompileInput<'a> {
    pub residents: &'a [Resident],
    pub range: (NaiveDate, NaiveDate),
    pub time_off: &'a [TimeOffRequest], // 与区间相交的已批准休假
    pub holiday_requirements: &'a BTreeMap<NaiveDate, CoverageRequirement>,
    pub year_start: NaiveDate,
    pub orientation_window_days: i64,
    pub pgy2_moonlight_cutoff: NaiveDate,
    pub include_moonlight: bool, // 是否生成可选夜间兼职槽位
}

// ==========================================
// ConstraintCompiler - 约束编译器
// ==========================================
pub struct ConstraintCompiler {
    // 无状态引擎
}

impl ConstraintCompiler {
    /// 创建新的约束编译器
    pub fn new() -> Self {
        Self {}
    }

    /// 编译约束集
    ///
    /// 逐日展开槽位:
    /// - 覆盖需求日: 节假日值班 (必填, 带级别下限)
    /// - 工作日: 工作日值班 (必填)
    /// - 周末: 周末值班 (必填)
    /// - 每日: 夜间兼职 (可选, include_moonlight 时)
    ///
    /// 必填槽位零候选人 → 记入 errors 并从约束集剔除
    /// 可选槽位零候选人 → 直接省略
    #[instrument(skip(self, input), fields(
        residents_count = input.residents.len(),
        range_start = %input.range.0,
        range_end = %input.range.1
    ))]
    pub fn compile(&self, input: &CompileInput<'_>) -> CompileOutcome {
        let (range_start, range_end) = input.range;
        let mut days = Vec::new();
        let mut errors = Vec::new();

        let mut date = range_start;
        while date <= range_end {
            let mut slots = Vec::new();

            // 1) 节假日覆盖槽位
            if let Some(requirement) = input.holiday_requirements.get(&date) {
                if requirement.requires_coverage {
                    slots.push(self.build_slot(
                        input,
                        date,
                        ShiftCategory::HolidayCall,
                        true,
                        Some(requirement.min_pgy_level),
                        Some(requirement.name.clone()),
                    ));
                }
            }

            // 2) 值班槽位 (工作日/周末)
            if is_weekday(date) {
                slots.push(self.build_slot(input, date, ShiftCategory::WeekdayCall, true, None, None));
            } else {
                slots.push(self.build_slot(input, date, ShiftCategory::WeekendCall, true, None, None));
            }

            // 3) 可选夜间兼职槽位
            if input.include_moonlight {
                slots.push(self.build_slot(input, date, ShiftCategory::Moonlight, false, None, None));
            }

            // 零候选人处理: 必填报错, 可选省略
            let mut kept = Vec::new();
            for slot in slots {
                if slot.eligible.is_empty() {
                    if slot.mandatory {
                        errors.push(ConstraintError {
                            date: slot.date,
                            category: slot.category,
                            detail: match &slot.holiday_name {
                                Some(name) => format!(
                                    "{} 要求 {} 及以上, 无满足条件的在岗住院医师",
                                    name,
                                    slot.min_pgy_level.map(|l| l.to_string()).unwrap_or_default()
                                ),
                                None => "全部住院医师均不可用 (休假/未入项/资格限制)".to_string(),
                            },
                        });
                    } else {
                        debug!(date = %slot.date, category = %slot.category, "可选槽位无候选人,省略");
                    }
                    continue;
                }
                kept.push(slot);
            }

            // 槽位按填充优先级排序: 节假日 → 工作日值班 → 夜间兼职 → 周末值班
            kept.sort_by_key(|slot| slot.category.fill_priority());
            if !kept.is_empty() {
                days.push(DayConstraints { date, slots: kept });
            }

            date += Duration::days(1);
        }

        CompileOutcome {
            set: ConstraintSet {
                range: input.range,
                days,
                residents: input
                    .residents
                    .iter()
                    .map(|r| (r.resident_id.clone(), r.clone()))
                    .collect(),
                year_start: input.year_start,
                orientation_window_days: input.orientation_window_days,
                pgy2_moonlight_cutoff: input.pgy2_moonlight_cutoff,
            },
            errors,
        }
    }

    /// 构造单个槽位并计算候选人集
    fn build_slot(
        &self,
        input: &CompileInput<'_>,
        date: NaiveDate,
        category: ShiftCategory,
        mandatory: bool,
        min_pgy_level: Option<PgyLevel>,
        holiday_name: Option<String>,
    ) -> SlotRequirement {
        let mut eligible: Vec<String> = input
            .residents
            .iter()
            .filter(|r| self.is_eligible(input, r, date, category, min_pgy_level))
            .map(|r| r.resident_id.clone())
            .collect();
        eligible.sort();

        SlotRequirement {
            date,
            category,
            mandatory,
            min_pgy_level,
            holiday_name,
            eligible,
        }
    }

    /// 单人单槽位资格判定
    fn is_eligible(
        &self,
        input: &CompileInput<'_>,
        resident: &Resident,
        date: NaiveDate,
        category: ShiftCategory,
        min_pgy_level: Option<PgyLevel>,
    ) -> bool {
        // 在岗且已入项
        if !resident.available_on(date) {
            return false;
        }

        // 已批准休假覆盖该日
        let on_leave = input.time_off.iter().any(|req| {
            req.resident_id == resident.resident_id && req.is_approved() && req.covers(date)
        });
        if on_leave {
            return false;
        }

        // 节假日级别下限
        if let Some(min_level) = min_pgy_level {
            if resident.pgy_level < min_level {
                return false;
            }
        }

        // PGY-2 带教窗口: 不参与值班
        if resident.pgy_level == PgyLevel::Pgy2
            && is_call(category)
            && date < input.year_start + Duration::days(input.orientation_window_days)
        {
            return false;
        }

        // PGY-2 夜间兼职解禁日期
        if resident.pgy_level == PgyLevel::Pgy2
            && category == ShiftCategory::Moonlight
            && date < input.pgy2_moonlight_cutoff
        {
            return false;
        }

        true
    }
}

impl Default for ConstraintCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resident::ResidentPreferences;
    use crate::domain::types::TimeOffStatus;
    use chrono::NaiveDateTime;

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn make_resident(id: &str, level: PgyLevel) -> Resident {
        Resident {
            resident_id: id.to_string(),
            name: format!("Resident {}", id),
            email: format!("{}@hospital.test", id),
            pgy_level: level,
            start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            active: true,
            specializations: vec![],
            preferences: ResidentPreferences::default(),
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn base_input<'a>(
        residents: &'a [Resident],
        time_off: &'a [TimeOffRequest],
        holidays: &'a BTreeMap<NaiveDate, CoverageRequirement>,
        range: (NaiveDate, NaiveDate),
    ) -> CompileInput<'a> {
        CompileInput {
            residents,
            range,
            time_off,
            holiday_requirements: holidays,
            year_start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            orientation_window_days: 30,
            pgy2_moonlight_cutoff: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            include_moonlight: true,
        }
    }

    #[test]
    fn test_weekday_and_weekend_slots_expand() {
        let residents = vec![make_resident("R001", PgyLevel::Pgy3)];
        let holidays = BTreeMap::new();
        // 2025-09-05 (周五) 到 09-06 (周六)
        let range = (
            NaiveDate::from_ymd_opt(2025, 9, 5).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 6).unwrap(),
        );
        let compiler = ConstraintCompiler::new();
        let outcome = compiler.compile(&base_input(&residents, &[], &holidays, range));

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.set.days.len(), 2);
        assert_eq!(outcome.set.days[0].slots[0].category, ShiftCategory::WeekdayCall);
        assert_eq!(outcome.set.days[1].slots[0].category, ShiftCategory::WeekendCall);
    }

    #[test]
    fn test_total_leave_day_surfaces_constraint_error() {
        let residents = vec![make_resident("R001", PgyLevel::Pgy3)];
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let time_off = vec![TimeOffRequest {
            request_id: "T001".to_string(),
            resident_id: "R001".to_string(),
            start_date: date,
            end_date: date,
            reason: None,
            status: TimeOffStatus::Approved,
            reviewed_by: Some("chief".to_string()),
            reviewed_at: Some(ts()),
            created_at: ts(),
        }];
        let holidays = BTreeMap::new();

        let compiler = ConstraintCompiler::new();
        let outcome = compiler.compile(&base_input(&residents, &time_off, &holidays, (date, date)));

        // 唯一住院医师休假 → 工作日值班槽位不可覆盖, 必须显式报错
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].date, date);
        assert_eq!(outcome.errors[0].category, ShiftCategory::WeekdayCall);
    }

    #[test]
    fn test_holiday_min_level_filters_eligibility() {
        let residents = vec![
            make_resident("R001", PgyLevel::Pgy2),
            make_resident("R002", PgyLevel::Pgy3),
        ];
        let date = NaiveDate::from_ymd_opt(2025, 11, 27).unwrap();
        let mut holidays = BTreeMap::new();
        holidays.insert(
            date,
            CoverageRequirement {
                instance_id: "I001".to_string(),
                name: "Thanksgiving".to_string(),
                holiday_type: crate::domain::types::HolidayType::Federal,
                requires_coverage: true,
                min_pgy_level: PgyLevel::Pgy3,
                coverage_tier: crate::domain::types::CoverageTier::Reduced,
            },
        );

        let compiler = ConstraintCompiler::new();
        let outcome = compiler.compile(&base_input(&residents, &[], &holidays, (date, date)));

        let holiday_slot = outcome.set.days[0]
            .slots
            .iter()
            .find(|s| s.category == ShiftCategory::HolidayCall)
            .expect("应生成节假日槽位");
        assert_eq!(holiday_slot.eligible, vec!["R002".to_string()]);
    }
}
