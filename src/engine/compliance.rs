// ==========================================
// 住院医师排班系统 - ACGME 工时合规引擎
// ==========================================
// 红线: 引擎对排班只读,只产出违规报告,不改指派
// 检查项:
// - 滚动 7 日工时 ≤ weekly_hour_cap
// - 连续值班 ≤ consecutive_hour_cap + wind_down_hours
// - 班间休息 ≥ min_rest_hours
// - 每 days_off_window 天窗口内至少 1 个完整休息日
// 限值来源: SchedulingConfigReader (不硬编码)
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;
use uuid::Uuid;

use crate::domain::schedule::{Assignment, Schedule};
use crate::domain::types::{Severity, ViolationKind};
use crate::domain::violation::AcgmeViolation;

// ==========================================
// DutyHourPolicy - 工时限值集
// ==========================================
// 由编排器从配置组装后传入
#[derive(Debug, Clone, Copy)]
pub struct DutyHourPolicy {
    pub weekly_hour_cap: f64,
    pub consecutive_hour_cap: f64,
    pub wind_down_hours: f64,
    pub min_rest_hours: f64,
    pub days_off_window: i64,
}

impl Default for DutyHourPolicy {
    fn default() -> Self {
        Self {
            weekly_hour_cap: crate::config::scheduling_config_trait::DEFAULT_WEEKLY_HOUR_CAP,
            consecutive_hour_cap:
                crate::config::scheduling_config_trait::DEFAULT_CONSECUTIVE_HOUR_CAP,
            wind_down_hours: crate::config::scheduling_config_trait::DEFAULT_WIND_DOWN_HOURS,
            min_rest_hours: crate::config::scheduling_config_trait::DEFAULT_MIN_REST_HOURS,
            days_off_window: crate::config::scheduling_config_trait::DEFAULT_DAYS_OFF_WINDOW,
        }
    }
}

// ==========================================
// ComplianceEngine - 合规引擎
// ==========================================
pub struct ComplianceEngine {
    // 无状态引擎,限值逐次传入
}

impl ComplianceEngine {
    /// 创建新的合规引擎
    pub fn new() -> Self {
        Self {}
    }

    /// 评估排班表的工时合规性
    ///
    /// # 参数
    /// - schedule: 排班表 (只读)
    /// - assignments: 该表全部指派 (只读)
    /// - policy: 工时限值集
    ///
    /// # 返回
    /// 违规清单 (连续违规窗口合并为一条,取峰值)
    #[instrument(skip(self, schedule, assignments), fields(
        schedule_id = %schedule.schedule_id,
        assignments_count = assignments.len()
    ))]
    pub fn evaluate(
        &self,
        schedule: &Schedule,
        assignments: &[Assignment],
        policy: &DutyHourPolicy,
    ) -> Vec<AcgmeViolation> {
        let mut violations = Vec::new();

        // 按住院医师分组并按开始时间排序
        let mut by_resident: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
        for assignment in assignments {
            by_resident
                .entry(assignment.resident_id.as_str())
                .or_default()
                .push(assignment);
        }
        for entries in by_resident.values_mut() {
            entries.sort_by_key(|a| a.start_at);
        }

        for (resident_id, entries) in &by_resident {
            self.check_weekly_hours(schedule, resident_id, entries, policy, &mut violations);
            let blocks = merge_duty_blocks(entries);
            self.check_consecutive_duty(schedule, resident_id, &blocks, policy, &mut violations);
            self.check_rest_periods(schedule, resident_id, &blocks, policy, &mut violations);
            self.check_days_off(schedule, resident_id, entries, policy, &mut violations);
        }

        violations
    }

    // ==========================================
    // 滚动 7 日工时
    // ==========================================
    fn check_weekly_hours(
        &self,
        schedule: &Schedule,
        resident_id: &str,
        entries: &[&Assignment],
        policy: &DutyHourPolicy,
        violations: &mut Vec<AcgmeViolation>,
    ) {
        let window_days = 7i64;
        if (schedule.end_date - schedule.start_date).num_days() + 1 < window_days {
            return;
        }

        // 窗口滚动: 起点从 start_date 到 end_date-6
        let mut run: Option<(NaiveDate, NaiveDate, f64)> = None; // (首个违规窗口起点, 末个违规窗口起点, 峰值)
        let mut window_start = schedule.start_date;
        let last_start = schedule.end_date - Duration::days(window_days - 1);

        while window_start <= last_start {
            let window_end = window_start + Duration::days(window_days - 1);
            let hours: f64 = entries
                .iter()
                .filter(|a| a.duty_date >= window_start && a.duty_date <= window_end)
                .map(|a| a.duty_hours() as f64)
                .sum();

            if hours > policy.weekly_hour_cap {
                run = Some(match run {
                    None => (window_start, window_start, hours),
                    Some((first, _, peak)) => (first, window_start, peak.max(hours)),
                });
            } else if let Some((first, last, peak)) = run.take() {
                violations.push(self.weekly_violation(schedule, resident_id, first, last, peak, policy));
            }
            window_start += Duration::days(1);
        }
        if let Some((first, last, peak)) = run {
            violations.push(self.weekly_violation(schedule, resident_id, first, last, peak, policy));
        }
    }

    fn weekly_violation(
        &self,
        schedule: &Schedule,
        resident_id: &str,
        first_window_start: NaiveDate,
        last_window_start: NaiveDate,
        peak_hours: f64,
        policy: &DutyHourPolicy,
    ) -> AcgmeViolation {
        AcgmeViolation {
            violation_id: Uuid::new_v4().to_string(),
            schedule_id: schedule.schedule_id.clone(),
            resident_id: resident_id.to_string(),
            kind: ViolationKind::WeeklyHours,
            severity: Severity::from_excess_ratio(peak_hours, policy.weekly_hour_cap),
            measured_value: peak_hours,
            limit_value: policy.weekly_hour_cap,
            window_start: first_window_start,
            window_end: last_window_start + Duration::days(6),
            detail: Some(format!(
                "滚动 7 日工时峰值 {:.1}h 超过上限 {:.0}h",
                peak_hours, policy.weekly_hour_cap
            )),
        }
    }

    // ==========================================
    // 连续值班时长
    // ==========================================
    fn check_consecutive_duty(
        &self,
        schedule: &Schedule,
        resident_id: &str,
        blocks: &[DutyBlock],
        policy: &DutyHourPolicy,
        violations: &mut Vec<AcgmeViolation>,
    ) {
        let limit = policy.consecutive_hour_cap + policy.wind_down_hours;
        for block in blocks {
            let hours = block.hours();
            if hours > limit {
                violations.push(AcgmeViolation {
                    violation_id: Uuid::new_v4().to_string(),
                    schedule_id: schedule.schedule_id.clone(),
                    resident_id: resident_id.to_string(),
                    kind: ViolationKind::ConsecutiveHours,
                    severity: Severity::from_excess_ratio(hours, limit),
                    measured_value: hours,
                    limit_value: limit,
                    window_start: block.start.date(),
                    window_end: block.end.date(),
                    detail: Some(format!(
                        "连续值班 {:.1}h 超过上限 {:.0}h (含 {:.0}h 交接缓冲)",
                        hours, limit, policy.wind_down_hours
                    )),
                });
            }
        }
    }

    // ==========================================
    // 班间休息
    // ==========================================
    fn check_rest_periods(
        &self,
        schedule: &Schedule,
        resident_id: &str,
        blocks: &[DutyBlock],
        policy: &DutyHourPolicy,
        violations: &mut Vec<AcgmeViolation>,
    ) {
        for pair in blocks.windows(2) {
            let gap_hours = (pair[1].start - pair[0].end).num_minutes() as f64 / 60.0;
            if gap_hours < policy.min_rest_hours {
                violations.push(AcgmeViolation {
                    violation_id: Uuid::new_v4().to_string(),
                    schedule_id: schedule.schedule_id.clone(),
                    resident_id: resident_id.to_string(),
                    kind: ViolationKind::RestPeriod,
                    severity: Severity::from_deficit_ratio(gap_hours, policy.min_rest_hours),
                    measured_value: gap_hours,
                    limit_value: policy.min_rest_hours,
                    window_start: pair[0].end.date(),
                    window_end: pair[1].start.date(),
                    detail: Some(format!(
                        "班间休息 {:.1}h 不足下限 {:.0}h",
                        gap_hours, policy.min_rest_hours
                    )),
                });
            }
        }
    }

    // ==========================================
    // 1-in-7 休息日
    // ==========================================
    fn check_days_off(
        &self,
        schedule: &Schedule,
        resident_id: &str,
        entries: &[&Assignment],
        policy: &DutyHourPolicy,
        violations: &mut Vec<AcgmeViolation>,
    ) {
        let window_days = policy.days_off_window;
        if (schedule.end_date - schedule.start_date).num_days() + 1 < window_days {
            return;
        }

        let duty_days: BTreeSet<NaiveDate> = entries.iter().map(|a| a.duty_date).collect();

        let mut run: Option<(NaiveDate, NaiveDate)> = None;
        let mut window_start = schedule.start_date;
        let last_start = schedule.end_date - Duration::days(window_days - 1);

        while window_start <= last_start {
            let all_duty = (0..window_days)
                .all(|offset| duty_days.contains(&(window_start + Duration::days(offset))));

            if all_duty {
                run = Some(match run {
                    None => (window_start, window_start),
                    Some((first, _)) => (first, window_start),
                });
            } else if let Some((first, last)) = run.take() {
                violations.push(self.days_off_violation(schedule, resident_id, first, last, policy));
            }
            window_start += Duration::days(1);
        }
        if let Some((first, last)) = run {
            violations.push(self.days_off_violation(schedule, resident_id, first, last, policy));
        }
    }

    fn days_off_violation(
        &self,
        schedule: &Schedule,
        resident_id: &str,
        first_window_start: NaiveDate,
        last_window_start: NaiveDate,
        policy: &DutyHourPolicy,
    ) -> AcgmeViolation {
        let window_end = last_window_start + Duration::days(policy.days_off_window - 1);
        let streak_days = (window_end - first_window_start).num_days() + 1;
        AcgmeViolation {
            violation_id: Uuid::new_v4().to_string(),
            schedule_id: schedule.schedule_id.clone(),
            resident_id: resident_id.to_string(),
            kind: ViolationKind::DaysOff,
            severity: Severity::from_excess_ratio(
                streak_days as f64,
                (policy.days_off_window - 1) as f64,
            ),
            measured_value: streak_days as f64,
            limit_value: (policy.days_off_window - 1) as f64,
            window_start: first_window_start,
            window_end,
            detail: Some(format!(
                "连续 {} 天值班无完整休息日 (每 {} 天窗口应有 1 天)",
                streak_days, policy.days_off_window
            )),
        }
    }
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// DutyBlock - 连续值班块
// ==========================================
#[derive(Debug, Clone, Copy)]
struct DutyBlock {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DutyBlock {
    fn hours(&self) -> f64 {
        (self.end - self.start).num_minutes() as f64 / 60.0
    }
}

/// 把按时间排序的指派合并为连续值班块 (相邻或重叠即合并)
fn merge_duty_blocks(entries: &[&Assignment]) -> Vec<DutyBlock> {
    let mut blocks: Vec<DutyBlock> = Vec::new();
    for assignment in entries {
        match blocks.last_mut() {
            Some(block) if assignment.start_at <= block.end => {
                block.end = block.end.max(assignment.end_at);
            }
            _ => blocks.push(DutyBlock {
                start: assignment.start_at,
                end: assignment.end_at,
            }),
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ScheduleStatus, ShiftCategory};

    fn make_schedule(start: NaiveDate, end: NaiveDate) -> Schedule {
        let ts = NaiveDateTime::parse_from_str("2025-06-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Schedule {
            schedule_id: "S001".to_string(),
            academic_year: "2025-2026".to_string(),
            start_date: start,
            end_date: end,
            algorithm: "CSP_BACKTRACKING_V1".to_string(),
            status: ScheduleStatus::Draft,
            hard_rule_violations: 0,
            soft_rule_cost: 0,
            total_assignments: 0,
            config_snapshot_json: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn make_assignment(resident_id: &str, date: NaiveDate, category: ShiftCategory) -> Assignment {
        let ts = NaiveDateTime::parse_from_str("2025-06-01 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Assignment::new(
            Uuid::new_v4().to_string(),
            "S001".to_string(),
            resident_id.to_string(),
            date,
            category,
            ts,
        )
    }

    #[test]
    fn test_weekly_hours_flagged_over_cap() {
        // 7 天连排 24h 周末值班 = 168h, 远超 80h
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 9, 7).unwrap();
        let schedule = make_schedule(start, end);
        let assignments: Vec<Assignment> = (0..7)
            .map(|offset| {
                make_assignment(
                    "R001",
                    start + Duration::days(offset),
                    ShiftCategory::WeekendCall,
                )
            })
            .collect();

        let engine = ComplianceEngine::new();
        let violations = engine.evaluate(&schedule, &assignments, &DutyHourPolicy::default());

        let weekly: Vec<_> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::WeeklyHours)
            .collect();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].severity, Severity::Critical);
        assert!(weekly[0].measured_value > 80.0);
    }

    #[test]
    fn test_under_cap_schedule_is_clean() {
        // 每周 2 个 16h 班 = 32h, 间隔充分
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 9, 14).unwrap();
        let schedule = make_schedule(start, end);
        let assignments = vec![
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(), ShiftCategory::WeekdayCall),
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 4).unwrap(), ShiftCategory::WeekdayCall),
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 9).unwrap(), ShiftCategory::WeekdayCall),
        ];

        let engine = ComplianceEngine::new();
        let violations = engine.evaluate(&schedule, &assignments, &DutyHourPolicy::default());
        assert!(violations.is_empty(), "违规应为空: {:?}", violations);
    }

    #[test]
    fn test_consecutive_duty_merges_adjacent_shifts() {
        // 周末值班 (08:00→次日08:00) 紧接夜间兼职? 不可能同类;
        // 用两天连续周末值班构造 48h 连续块
        let start = NaiveDate::from_ymd_opt(2025, 9, 6).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 9, 12).unwrap();
        let schedule = make_schedule(start, end);
        let assignments = vec![
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 6).unwrap(), ShiftCategory::WeekendCall),
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(), ShiftCategory::WeekendCall),
        ];

        let engine = ComplianceEngine::new();
        let violations = engine.evaluate(&schedule, &assignments, &DutyHourPolicy::default());

        let consecutive: Vec<_> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::ConsecutiveHours)
            .collect();
        assert_eq!(consecutive.len(), 1);
        assert_eq!(consecutive[0].measured_value, 48.0);
        assert_eq!(consecutive[0].severity, Severity::Critical);
    }

    #[test]
    fn test_rest_period_shortfall_flagged() {
        // 工作日值班 15:00→次日07:00, 次日再排 15:00 → 间隔 8h < 14h
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 9, 5).unwrap();
        let schedule = make_schedule(start, end);
        let assignments = vec![
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(), ShiftCategory::WeekdayCall),
            make_assignment("R001", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap(), ShiftCategory::WeekdayCall),
        ];

        let engine = ComplianceEngine::new();
        let violations = engine.evaluate(&schedule, &assignments, &DutyHourPolicy::default());

        let rest: Vec<_> = violations
            .iter()
            .filter(|v| v.kind == ViolationKind::RestPeriod)
            .collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].measured_value, 8.0);
        assert_eq!(rest[0].severity, Severity::Critical);
    }

    #[test]
    fn test_days_off_violation_for_unbroken_week() {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 9, 7).unwrap();
        let schedule = make_schedule(start, end);
        let assignments: Vec<Assignment> = (0..7)
            .map(|offset| {
                make_assignment("R001", start + Duration::days(offset), ShiftCategory::Moonlight)
            })
            .collect();

        let engine = ComplianceEngine::new();
        let violations = engine.evaluate(&schedule, &assignments, &DutyHourPolicy::default());

        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::DaysOff && v.measured_value == 7.0));
    }
}
