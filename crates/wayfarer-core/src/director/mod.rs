//! Director: runs both validators, merges their verdicts, and builds the
//! per-day feedback that drives refinement.
//!
//! The validators are pure and independent, so they run concurrently on
//! the blocking pool; both must finish before a combined verdict exists.
//! Deterministic validators gate the non-deterministic generator: the
//! director never trusts provider output that has not passed (or been
//! explicitly accepted despite) these checks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{Day, GroupProfile};
use crate::validator::budget::{self, BudgetConfig, BudgetStatus, BudgetVerdict};
use crate::validator::logistics::{self, LogisticsConfig, LogisticsStatus, LogisticsVerdict};

/// Refinement passes never exceed this cap; afterwards the best available
/// result is accepted even if not fully approved. A deliberate
/// cost/quality tradeoff.
pub const MAX_REFINEMENT_ITERATIONS: u32 = 2;

/// Merged status across both validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Approved,
    Warning,
    Rejected,
}

/// Combined verdict for one validation iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedVerdict {
    pub status: OverallStatus,
    /// Deduplicated, sorted union of both validators' flagged days.
    pub flagged_days: Vec<u32>,
    /// Concatenated suggestions from both validators.
    pub feedback: Vec<String>,
    /// Refinement iterations performed before this verdict.
    pub iteration: u32,
    pub budget: BudgetVerdict,
    pub logistics: LogisticsVerdict,
}

impl CombinedVerdict {
    /// Trailing log lines from both validators, for the validation event.
    pub fn log_tail(&self, max_lines: usize) -> Vec<String> {
        let mut log: Vec<String> = self
            .budget
            .log
            .iter()
            .chain(self.logistics.log.iter())
            .cloned()
            .collect();
        if log.len() > max_lines {
            log.drain(..log.len() - max_lines);
        }
        log
    }
}

/// Run both validators concurrently and merge their verdicts.
pub async fn evaluate(
    days: Arc<Vec<Day>>,
    total_budget: f64,
    num_days: u32,
    profile: GroupProfile,
    budget_config: BudgetConfig,
    logistics_config: LogisticsConfig,
    iteration: u32,
) -> CombinedVerdict {
    let budget_days = Arc::clone(&days);
    let budget_task = tokio::task::spawn_blocking(move || {
        budget::check_budget(&budget_days, total_budget, num_days, &budget_config)
    });
    let logistics_task = tokio::task::spawn_blocking(move || {
        logistics::check_logistics(&days, &profile, &logistics_config)
    });

    let (budget_verdict, logistics_verdict) =
        tokio::join!(budget_task, logistics_task);
    // The validators are panic-free pure functions; a join error here
    // means the runtime is shutting down.
    let budget_verdict = budget_verdict.expect("budget validator task panicked");
    let logistics_verdict = logistics_verdict.expect("logistics validator task panicked");

    combine(budget_verdict, logistics_verdict, iteration)
}

/// Merge two verdicts into a combined one.
pub fn combine(
    budget: BudgetVerdict,
    logistics: LogisticsVerdict,
    iteration: u32,
) -> CombinedVerdict {
    let status = if budget.status == BudgetStatus::OverBudget
        || logistics.status == LogisticsStatus::Impossible
    {
        OverallStatus::Rejected
    } else if budget.status.is_acceptable() && logistics.status.is_acceptable() {
        OverallStatus::Approved
    } else {
        OverallStatus::Warning
    };

    let mut flagged_days: Vec<u32> = budget
        .flagged_days
        .iter()
        .chain(logistics.flagged_days.iter())
        .copied()
        .collect();
    flagged_days.sort_unstable();
    flagged_days.dedup();

    let feedback: Vec<String> = budget
        .suggestions
        .iter()
        .chain(logistics.suggestions.iter())
        .cloned()
        .collect();

    CombinedVerdict {
        status,
        flagged_days,
        feedback,
        iteration,
        budget,
        logistics,
    }
}

/// Build the natural-language feedback for regenerating one flagged day.
///
/// Names the specific violated constraints so the provider has something
/// concrete to fix. There is no convergence guarantee; the caller must
/// re-validate the regenerated day.
pub fn build_feedback(verdict: &CombinedVerdict, day_number: u32) -> String {
    let mut lines = Vec::new();

    if let Some(cost) = verdict
        .budget
        .days
        .iter()
        .find(|d| d.day_number == day_number)
    {
        match cost.status {
            BudgetStatus::OverBudget | BudgetStatus::NearLimit => {
                lines.push(format!(
                    "This day costs {:.0} but only {:.0} is allocated; cut about {:.0} in costs.",
                    cost.actual,
                    cost.allocation,
                    cost.delta.max(0.0)
                ));
            }
            _ => {}
        }
    }

    for conflict in verdict
        .logistics
        .conflicts
        .iter()
        .filter(|c| c.day_number == day_number)
    {
        lines.push(format!("{} problem: {}.", conflict.kind, conflict.detail));
    }

    if lines.is_empty() {
        // Flagged without a day-specific record (e.g. trip-level budget
        // pressure): fall back to the combined suggestions.
        lines.extend(verdict.feedback.iter().cloned());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, ActivityCategory, Day};
    use chrono::NaiveDate;

    fn activity(name: &str, start: &str, cost: f64, duration: u32) -> Activity {
        Activity {
            start_time: start.into(),
            name: name.into(),
            description: String::new(),
            category: ActivityCategory::Activity,
            estimated_cost: cost,
            duration_minutes: duration,
            location: String::new(),
            coords: None,
            transport_mode: None,
            dedup_key: None,
            cost_verification: None,
            place: None,
        }
    }

    fn day(number: u32, activities: Vec<Activity>) -> Day {
        Day {
            day_number: number,
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            title: format!("Day {number}"),
            activities,
            local_food: Vec::new(),
        }
    }

    fn verdicts_for(days: Vec<Day>, budget: f64) -> CombinedVerdict {
        let num_days = days.len() as u32;
        let b = budget::check_budget(&days, budget, num_days, &BudgetConfig::default());
        let l = logistics::check_logistics(
            &days,
            &GroupProfile::default(),
            &LogisticsConfig::default(),
        );
        combine(b, l, 0)
    }

    #[test]
    fn budget_rejection_dominates_approved_logistics() {
        // One hugely over-budget but logistically trivial day.
        let verdict = verdicts_for(
            vec![day(1, vec![activity("Yacht charter", "10:00", 900.0, 120)])],
            200.0,
        );
        assert_eq!(verdict.budget.status, BudgetStatus::OverBudget);
        assert!(verdict.logistics.status.is_acceptable());
        assert_eq!(verdict.status, OverallStatus::Rejected);
        assert_eq!(verdict.flagged_days, vec![1]);
    }

    #[test]
    fn flagged_days_are_the_sorted_union() {
        // Day 2 over budget, day 1 logistically impossible.
        let days = vec![
            day(
                1,
                vec![
                    activity("Long tour", "09:00", 10.0, 240),
                    activity("Overlap", "10:00", 10.0, 60),
                ],
            ),
            day(2, vec![activity("Splurge", "10:00", 500.0, 60)]),
        ];
        let verdict = verdicts_for(days, 300.0);
        assert_eq!(verdict.status, OverallStatus::Rejected);
        assert_eq!(verdict.flagged_days, vec![1, 2]);
    }

    #[test]
    fn acceptable_both_sides_is_approved() {
        let verdict = verdicts_for(
            vec![day(
                1,
                vec![
                    activity("Market", "09:00", 40.0, 60),
                    activity("Lunch", "12:00", 30.0, 60),
                ],
            )],
            100.0,
        );
        assert_eq!(verdict.status, OverallStatus::Approved);
        assert!(verdict.flagged_days.is_empty());
    }

    #[test]
    fn warning_when_near_limit_but_feasible() {
        // Allocation 90, spend 103: near limit, not rejected.
        let verdict = verdicts_for(
            vec![day(1, vec![activity("Spa", "10:00", 103.0, 120)])],
            100.0,
        );
        assert_eq!(verdict.budget.status, BudgetStatus::NearLimit);
        assert_eq!(verdict.status, OverallStatus::Warning);
    }

    #[test]
    fn feedback_names_the_violated_constraints() {
        let days = vec![day(
            1,
            vec![
                activity("Pricey tour", "09:00", 400.0, 240),
                activity("Overlap", "10:00", 10.0, 60),
            ],
        )];
        let verdict = verdicts_for(days, 200.0);
        let feedback = build_feedback(&verdict, 1);
        assert!(feedback.contains("allocated"), "feedback: {feedback}");
        assert!(feedback.contains("timing problem"), "feedback: {feedback}");
    }

    #[test]
    fn feedback_for_unflagged_day_falls_back_to_suggestions() {
        let verdict = verdicts_for(
            vec![day(1, vec![activity("Splurge", "10:00", 500.0, 60)])],
            300.0,
        );
        // Day 7 has no record at all.
        let feedback = build_feedback(&verdict, 7);
        assert!(!feedback.is_empty());
    }

    #[tokio::test]
    async fn evaluate_runs_both_validators() {
        let days = Arc::new(vec![day(
            1,
            vec![activity("Walk", "09:00", 10.0, 60)],
        )]);
        let verdict = evaluate(
            days,
            200.0,
            1,
            GroupProfile::default(),
            BudgetConfig::default(),
            LogisticsConfig::default(),
            0,
        )
        .await;
        assert_eq!(verdict.iteration, 0);
        assert!(!verdict.budget.log.is_empty());
        assert!(!verdict.logistics.log.is_empty());
    }

    #[test]
    fn log_tail_truncates() {
        let verdict = verdicts_for(
            vec![day(1, vec![activity("Walk", "09:00", 10.0, 60)])],
            200.0,
        );
        let full_len = verdict.budget.log.len() + verdict.logistics.log.len();
        assert!(verdict.log_tail(100).len() == full_len);
        assert_eq!(verdict.log_tail(2).len(), 2);
    }
}
