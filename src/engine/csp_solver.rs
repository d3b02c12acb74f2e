// ==========================================
// 住院医师排班系统 - CSP 求解器
// ==========================================
// 算法: 按日期顺序的构造式回溯搜索
// - 槽位按 (日期, 填充优先级) 展开:
//   节假日值班 → 工作日值班 → 夜间兼职 → 周末值班
// - 每槽位候选人按增量软成本排序, 平票按ID字典序 (可复现)
// - 死路: 回退一个槽位换次优候选; 整日耗尽则回退到前一日
// - 回溯用显式帧栈 + undo 记录, 不用深递归
// - 时间预算在日界检查; 超时返回当前最优部分解
// ==========================================

use chrono::NaiveDate;
use serde::Serialize;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, instrument};

use crate::domain::types::{ShiftCategory, SolveStatus};
use crate::engine::constraint_compiler::{ConstraintSet, SlotRequirement};
use crate::engine::rule_catalog::{RuleCatalog, RuleContext};

// ==========================================
// ObjectiveWeights - 软目标权重
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveWeights {
    pub workload_balance: u32,
    pub preference: u32,
}

// ==========================================
// SolveStats - 搜索统计
// ==========================================
// 用途: 识别失控搜索, 向调用方报告进度
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SolveStats {
    pub assignments_tried: u64,
    pub constraint_checks: u64,
    pub duration_ms: u64,
}

// ==========================================
// SolvedPlacement / UnfillableSlot / SolveOutcome
// ==========================================

/// 求解产出的一条落位 (领域 Assignment 由编排器补全ID等字段)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedPlacement {
    pub resident_id: String,
    pub date: NaiveDate,
    pub category: ShiftCategory,
}

/// 不可填充槽位
#[derive(Debug, Clone, Serialize)]
pub struct UnfillableSlot {
    pub date: NaiveDate,
    pub category: ShiftCategory,
    pub reason: String,
}

/// 求解结果
#[derive(Debug)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub placements: Vec<SolvedPlacement>,
    pub unfillable: Vec<UnfillableSlot>,
    pub stats: SolveStats,
}

// ==========================================
// Frame - 决策帧
// ==========================================
// 帧栈中的一个决策点: 槽位 + 固化的候选序 + 已试进度
struct Frame {
    slot_idx: usize,
    candidates: Vec<String>,
    next_rank: usize,
    assigned: Option<String>,
    skipped: bool, // 可选槽位允许一次"留空"
}

impl Frame {
    fn new(slot_idx: usize, candidates: Vec<String>) -> Self {
        Self {
            slot_idx,
            candidates,
            next_rank: 0,
            assigned: None,
            skipped: false,
        }
    }
}

// ==========================================
// CspSolver - 求解器
// ==========================================
pub struct CspSolver {
    // 无状态引擎, 搜索状态全部在栈帧内
}

impl CspSolver {
    /// 创建新的求解器
    pub fn new() -> Self {
        Self {}
    }

    /// 执行指派搜索
    ///
    /// # 参数
    /// - set: 编译后的约束集
    /// - catalog: 规则目录 (硬规则校验)
    /// - weights: 软目标权重
    /// - time_limit: 墙钟时间预算
    ///
    /// # 返回
    /// - Complete: 全部槽位已填
    /// - Partial: 存在不可填充的必填槽位 (附最小清单)
    /// - TimedOut: 预算耗尽, 返回当前最优部分解
    #[instrument(skip(self, set, catalog), fields(
        days = set.days.len(),
        mandatory_slots = set.mandatory_slot_count()
    ))]
    pub fn solve(
        &self,
        set: &ConstraintSet,
        catalog: &RuleCatalog,
        weights: &ObjectiveWeights,
        time_limit: StdDuration,
    ) -> SolveOutcome {
        let started = Instant::now();
        let mut stats = SolveStats::default();

        let slots: Vec<&SlotRequirement> =
            set.days.iter().flat_map(|day| day.slots.iter()).collect();

        let mut ctx = RuleContext::new(
            &set.residents,
            set.year_start,
            set.orientation_window_days,
            set.pgy2_moonlight_cutoff,
        );

        let mut frames: Vec<Frame> = Vec::with_capacity(slots.len());
        let mut idx = 0usize;
        let mut last_boundary: Option<NaiveDate> = None;
        let mut timed_out = false;
        let mut exhausted = false;

        while idx < slots.len() {
            // 日界时间预算检查 (逐槽检查太贵, 逐日足够)
            if last_boundary != Some(slots[idx].date) {
                last_boundary = Some(slots[idx].date);
                if started.elapsed() >= time_limit {
                    timed_out = true;
                    break;
                }
            }

            let candidates = self.rank_candidates(slots[idx], &ctx, catalog, weights, &mut stats);
            frames.push(Frame::new(idx, candidates));

            // 在帧栈上推进; 无路可走时逐帧回溯
            loop {
                let Some(frame) = frames.last_mut() else {
                    exhausted = true;
                    break;
                };
                let slot = slots[frame.slot_idx];

                // undo 记录: 回到本帧先撤销其现有落位
                if let Some(resident_id) = frame.assigned.take() {
                    ctx.unplace(&resident_id, slot.date, slot.category);
                }

                if frame.next_rank < frame.candidates.len() {
                    let resident_id = frame.candidates[frame.next_rank].clone();
                    frame.next_rank += 1;
                    stats.assignments_tried += 1;
                    ctx.place(&resident_id, slot.date, slot.category);
                    frame.assigned = Some(resident_id);
                    idx = frame.slot_idx + 1;
                    break;
                }

                if !slot.mandatory && !frame.skipped {
                    // 可选槽位: 候选耗尽后允许留空
                    frame.skipped = true;
                    idx = frame.slot_idx + 1;
                    break;
                }

                frames.pop();
            }

            if timed_out || exhausted {
                break;
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;

        if exhausted {
            // 回溯穷尽: 完整解不存在, 降级为贪心填充以给出
            // 最优部分解 + 最小不可填充清单
            debug!("回溯搜索穷尽, 降级为贪心填充");
            return self.greedy_fill(set, &slots, catalog, weights, started, stats);
        }

        let placements = collect_placements(&frames, &slots);

        if timed_out {
            let unfillable = slots[frames.len()..]
                .iter()
                .filter(|slot| slot.mandatory)
                .map(|slot| UnfillableSlot {
                    date: slot.date,
                    category: slot.category,
                    reason: "时间预算耗尽".to_string(),
                })
                .collect();
            return SolveOutcome {
                status: SolveStatus::TimedOut,
                placements,
                unfillable,
                stats,
            };
        }

        SolveOutcome {
            status: SolveStatus::Complete,
            placements,
            unfillable: Vec::new(),
            stats,
        }
    }

    /// 候选人排序: 增量软成本升序, 平票按ID字典序
    ///
    /// 成本构成:
    /// - 工作量均衡: 当前指派总数 × 权重 (少者优先)
    /// - 偏好: 避开日 +权重, 期望日 -权重
    /// - 类别配额: 已达目标者 +1 (把余量让给未达标者)
    ///
    /// 过滤 (硬性):
    /// - 超过班次总数上限
    /// - 夜间兼职超过类别目标
    /// - 违反任一硬规则
    fn rank_candidates(
        &self,
        slot: &SlotRequirement,
        ctx: &RuleContext<'_>,
        catalog: &RuleCatalog,
        weights: &ObjectiveWeights,
        stats: &mut SolveStats,
    ) -> Vec<String> {
        let mut scored: Vec<(i64, String)> = Vec::new();

        for resident_id in &slot.eligible {
            let Some(resident) = ctx.residents.get(resident_id) else {
                continue;
            };
            let quota = RuleCatalog::quotas_for(resident.pgy_level);

            if ctx.total_count(resident_id) >= quota.max_total_shifts {
                continue;
            }
            if slot.category == ShiftCategory::Moonlight
                && ctx.category_count(resident_id, ShiftCategory::Moonlight)
                    >= quota.moonlight_target
            {
                continue;
            }

            stats.constraint_checks += 1;
            if catalog
                .check_placement(ctx, resident, slot.date, slot.category)
                .is_err()
            {
                continue;
            }

            let mut score =
                weights.workload_balance as i64 * ctx.total_count(resident_id) as i64;
            if resident.preferences.avoids(slot.date) {
                score += weights.preference as i64;
            }
            if resident.preferences.prefers(slot.date) {
                score -= weights.preference as i64;
            }
            if ctx.category_count(resident_id, slot.category) >= quota.target_for(slot.category) {
                score += 1;
            }

            scored.push((score, resident_id.clone()));
        }

        scored.sort();
        scored.into_iter().map(|(_, id)| id).collect()
    }

    /// 贪心降级填充: 逐槽取最优候选, 必填槽位无候选即记不可填充
    fn greedy_fill(
        &self,
        set: &ConstraintSet,
        slots: &[&SlotRequirement],
        catalog: &RuleCatalog,
        weights: &ObjectiveWeights,
        started: Instant,
        mut stats: SolveStats,
    ) -> SolveOutcome {
        let mut ctx = RuleContext::new(
            &set.residents,
            set.year_start,
            set.orientation_window_days,
            set.pgy2_moonlight_cutoff,
        );
        let mut placements = Vec::new();
        let mut unfillable = Vec::new();

        for &slot in slots {
            let candidates = self.rank_candidates(slot, &ctx, catalog, weights, &mut stats);
            match candidates.first() {
                Some(resident_id) => {
                    stats.assignments_tried += 1;
                    ctx.place(resident_id, slot.date, slot.category);
                    placements.push(SolvedPlacement {
                        resident_id: resident_id.clone(),
                        date: slot.date,
                        category: slot.category,
                    });
                }
                None if slot.mandatory => unfillable.push(UnfillableSlot {
                    date: slot.date,
                    category: slot.category,
                    reason: "无满足硬规则的候选住院医师".to_string(),
                }),
                None => {}
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        SolveOutcome {
            status: SolveStatus::Partial,
            placements,
            unfillable,
            stats,
        }
    }
}

impl Default for CspSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// 从帧栈提取落位 (帧序即槽位序)
fn collect_placements(frames: &[Frame], slots: &[&SlotRequirement]) -> Vec<SolvedPlacement> {
    frames
        .iter()
        .filter_map(|frame| {
            frame.assigned.as_ref().map(|resident_id| {
                let slot = slots[frame.slot_idx];
                SolvedPlacement {
                    resident_id: resident_id.clone(),
                    date: slot.date,
                    category: slot.category,
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resident::{Resident, ResidentPreferences};
    use crate::domain::types::PgyLevel;
    use crate::engine::constraint_compiler::{CompileInput, ConstraintCompiler};
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

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

    fn compile_set(
        residents: &[Resident],
        range: (NaiveDate, NaiveDate),
        include_moonlight: bool,
    ) -> ConstraintSet {
        let holidays = BTreeMap::new();
        let compiler = ConstraintCompiler::new();
        let outcome = compiler.compile(&CompileInput {
            residents,
            range,
            time_off: &[],
            holiday_requirements: &holidays,
            year_start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            orientation_window_days: 30,
            pgy2_moonlight_cutoff: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            include_moonlight,
        });
        assert!(outcome.errors.is_empty());
        outcome.set
    }

    fn weights() -> ObjectiveWeights {
        ObjectiveWeights {
            workload_balance: 1,
            preference: 2,
        }
    }

    #[test]
    fn test_solver_fills_every_call_slot() {
        // 15 人 (PGY-2/3/4 各 5), 30 天窗口 → 每个值班槽位恰好填充
        let mut residents = Vec::new();
        for i in 0..5 {
            residents.push(make_resident(&format!("R2{:02}", i), PgyLevel::Pgy2));
            residents.push(make_resident(&format!("R3{:02}", i), PgyLevel::Pgy3));
            residents.push(make_resident(&format!("R4{:02}", i), PgyLevel::Pgy4));
        }
        let range = (
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
        );
        let set = compile_set(&residents, range, false);
        let mandatory = set.mandatory_slot_count();

        let solver = CspSolver::new();
        let catalog = RuleCatalog::standard(1, 2);
        let outcome = solver.solve(&set, &catalog, &weights(), StdDuration::from_secs(10));

        assert_eq!(outcome.status, SolveStatus::Complete);
        assert!(outcome.unfillable.is_empty());
        assert_eq!(outcome.placements.len(), mandatory);
    }

    #[test]
    fn test_solver_is_deterministic() {
        let residents = vec![
            make_resident("R001", PgyLevel::Pgy3),
            make_resident("R002", PgyLevel::Pgy3),
            make_resident("R003", PgyLevel::Pgy4),
        ];
        let range = (
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
        );
        let set = compile_set(&residents, range, true);

        let solver = CspSolver::new();
        let catalog = RuleCatalog::standard(1, 2);
        let first = solver.solve(&set, &catalog, &weights(), StdDuration::from_secs(10));
        let second = solver.solve(&set, &catalog, &weights(), StdDuration::from_secs(10));

        assert_eq!(first.placements, second.placements);
    }

    #[test]
    fn test_no_same_day_conflicts_in_solution() {
        let residents = vec![
            make_resident("R001", PgyLevel::Pgy3),
            make_resident("R002", PgyLevel::Pgy4),
        ];
        let range = (
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
        );
        let set = compile_set(&residents, range, true);

        let solver = CspSolver::new();
        let catalog = RuleCatalog::standard(1, 2);
        let outcome = solver.solve(&set, &catalog, &weights(), StdDuration::from_secs(10));

        // 同一人同日不得出现两条互斥指派
        for a in &outcome.placements {
            for b in &outcome.placements {
                if std::ptr::eq(a, b) {
                    continue;
                }
                if a.resident_id == b.resident_id && a.date == b.date {
                    panic!("同日互斥冲突: {:?} vs {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_zero_time_budget_reports_timeout() {
        let residents = vec![make_resident("R001", PgyLevel::Pgy3)];
        let range = (
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
        );
        let set = compile_set(&residents, range, false);

        let solver = CspSolver::new();
        let catalog = RuleCatalog::standard(1, 2);
        let outcome = solver.solve(&set, &catalog, &weights(), StdDuration::ZERO);

        assert_eq!(outcome.status, SolveStatus::TimedOut);
        assert!(!outcome.unfillable.is_empty());
    }

    #[test]
    fn test_workload_spreads_across_level_peers() {
        // 两名同级住院医师, 4 个工作日 → 指派应 2/2 均分
        let residents = vec![
            make_resident("R001", PgyLevel::Pgy3),
            make_resident("R002", PgyLevel::Pgy3),
        ];
        let range = (
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 4).unwrap(),
        );
        let set = compile_set(&residents, range, false);

        let solver = CspSolver::new();
        let catalog = RuleCatalog::standard(1, 2);
        let outcome = solver.solve(&set, &catalog, &weights(), StdDuration::from_secs(10));

        let count = |id: &str| {
            outcome
                .placements
                .iter()
                .filter(|p| p.resident_id == id)
                .count()
        };
        assert_eq!(outcome.status, SolveStatus::Complete);
        assert_eq!(count("R001"), 2);
        assert_eq!(count("R002"), 2);
    }
}
