//! Budget validator ("the bursar"): pure per-day and aggregate cost
//! checks against the allocated budget.
//!
//! No I/O, no clocks: `(days, total_budget, num_days, config)` in,
//! verdict plus a log trail out. This is what keeps the validator
//! testable without the orchestrator.

use serde::{Deserialize, Serialize};

use crate::model::{ActivityCategory, Day};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Budget status for a day or for the whole trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Approved,
    NearLimit,
    OverBudget,
    /// Spending far below the allocation. Informational: a day can be
    /// under budget without the trip being rejected.
    UnderBudget,
}

impl BudgetStatus {
    /// Whether this status blocks approval of the run.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::Approved | Self::UnderBudget)
    }
}

/// Thresholds for the budget checks. All ratios are relative to the
/// buffered daily allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Fraction of the total budget held back as a safety buffer.
    pub buffer_fraction: f64,
    /// Overage ratio above which a day is near its limit.
    pub warning_threshold: f64,
    /// Overage ratio above which a day is over budget.
    pub reject_threshold: f64,
    /// (Negative) ratio below which a day counts as under budget.
    pub under_threshold: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            buffer_fraction: 0.10,
            warning_threshold: 0.10,
            reject_threshold: 0.20,
            under_threshold: -0.30,
        }
    }
}

/// Per-category cost totals for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub activities: f64,
    pub meals: f64,
    pub transport: f64,
    pub lodging: f64,
    /// Local-food recommendations, counted toward the day's actual.
    pub local_food: f64,
}

impl CategoryTotals {
    pub fn total(&self) -> f64 {
        self.activities + self.meals + self.transport + self.lodging + self.local_food
    }
}

/// Cost breakdown and status for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCost {
    pub day_number: u32,
    pub allocation: f64,
    pub actual: f64,
    pub delta: f64,
    pub by_category: CategoryTotals,
    pub status: BudgetStatus,
}

/// A typed budget issue for one day or the whole trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetIssue {
    /// `None` for trip-level issues.
    pub day_number: Option<u32>,
    pub status: BudgetStatus,
    pub detail: String,
}

/// Result of the budget check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetVerdict {
    pub status: BudgetStatus,
    pub days: Vec<DayCost>,
    /// Days whose status blocks or warns; sorted ascending.
    pub flagged_days: Vec<u32>,
    pub issues: Vec<BudgetIssue>,
    pub suggestions: Vec<String>,
    pub log: Vec<String>,
    pub total_allocation: f64,
    pub total_actual: f64,
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Check per-day and aggregate spending against the allocated budget.
pub fn check_budget(
    days: &[Day],
    total_budget: f64,
    num_days: u32,
    config: &BudgetConfig,
) -> BudgetVerdict {
    let mut log = Vec::new();

    let allocation = if num_days == 0 {
        0.0
    } else {
        total_budget * (1.0 - config.buffer_fraction) / f64::from(num_days)
    };
    log.push(format!(
        "bursar: allocation {allocation:.2}/day ({num_days} days, {:.0}% buffer)",
        config.buffer_fraction * 100.0
    ));

    let mut day_costs = Vec::with_capacity(days.len());
    let mut flagged_days = Vec::new();
    let mut issues = Vec::new();
    let mut trip_totals = CategoryTotals::default();

    for day in days {
        let by_category = categorize_day(day);
        let actual = by_category.total();
        let delta = actual - allocation;
        let status = classify(delta, allocation, config);

        trip_totals.activities += by_category.activities;
        trip_totals.meals += by_category.meals;
        trip_totals.transport += by_category.transport;
        trip_totals.lodging += by_category.lodging;
        trip_totals.local_food += by_category.local_food;

        log.push(format!(
            "bursar: day {} actual {actual:.2} vs {allocation:.2} ({status:?})",
            day.day_number
        ));

        match status {
            BudgetStatus::OverBudget | BudgetStatus::NearLimit => {
                flagged_days.push(day.day_number);
                issues.push(BudgetIssue {
                    day_number: Some(day.day_number),
                    status,
                    detail: format!(
                        "day {} costs {actual:.2}, {:.2} over its {allocation:.2} allocation",
                        day.day_number,
                        delta.max(0.0)
                    ),
                });
            }
            BudgetStatus::UnderBudget => {
                issues.push(BudgetIssue {
                    day_number: Some(day.day_number),
                    status,
                    detail: format!(
                        "day {} costs only {actual:.2} of its {allocation:.2} allocation",
                        day.day_number
                    ),
                });
            }
            BudgetStatus::Approved => {}
        }

        day_costs.push(DayCost {
            day_number: day.day_number,
            allocation,
            actual,
            delta,
            by_category,
            status,
        });
    }

    let total_allocation = allocation * days.len() as f64;
    let total_actual: f64 = day_costs.iter().map(|d| d.actual).sum();
    let total_delta = total_actual - total_allocation;

    // Aggregate status checks the over-side thresholds against the total
    // delta. Spending under budget never rejects the trip; it surfaces as
    // per-day statuses and a suggestion instead.
    let status = match classify(total_delta, total_allocation, config) {
        BudgetStatus::UnderBudget => BudgetStatus::Approved,
        s => s,
    };
    log.push(format!(
        "bursar: trip actual {total_actual:.2} vs {total_allocation:.2} ({status:?})"
    ));

    let suggestions = build_suggestions(&trip_totals, total_delta, total_budget, status);

    flagged_days.sort_unstable();
    flagged_days.dedup();

    BudgetVerdict {
        status,
        days: day_costs,
        flagged_days,
        issues,
        suggestions,
        log,
        total_allocation,
        total_actual,
    }
}

/// Sum a day's costs by category.
fn categorize_day(day: &Day) -> CategoryTotals {
    let mut totals = CategoryTotals::default();
    for activity in &day.activities {
        let slot = match activity.category {
            ActivityCategory::Activity => &mut totals.activities,
            ActivityCategory::Meal => &mut totals.meals,
            ActivityCategory::Transport => &mut totals.transport,
            ActivityCategory::Lodging => &mut totals.lodging,
        };
        *slot += activity.estimated_cost;
    }
    totals.local_food = day.local_food.iter().map(|f| f.estimated_cost).sum();
    totals
}

/// Classify a delta against an allocation using the configured ratios.
fn classify(delta: f64, allocation: f64, config: &BudgetConfig) -> BudgetStatus {
    if allocation <= 0.0 {
        return if delta > 0.0 {
            BudgetStatus::OverBudget
        } else {
            BudgetStatus::Approved
        };
    }
    let ratio = delta / allocation;
    if ratio > config.reject_threshold {
        BudgetStatus::OverBudget
    } else if ratio > config.warning_threshold {
        BudgetStatus::NearLimit
    } else if ratio < config.under_threshold {
        BudgetStatus::UnderBudget
    } else {
        BudgetStatus::Approved
    }
}

/// Category-specific mitigation suggestions, sized to the overage.
fn build_suggestions(
    totals: &CategoryTotals,
    total_delta: f64,
    total_budget: f64,
    status: BudgetStatus,
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if total_delta > 0.0 && !status.is_acceptable() {
        let overage = total_delta;
        // Largest-contributing category gets a targeted mitigation.
        let categories = [
            ("activities", totals.activities),
            ("meals", totals.meals + totals.local_food),
            ("transport", totals.transport),
            ("lodging", totals.lodging),
        ];
        if let Some((name, spent)) = categories
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .filter(|(_, spent)| *spent > 0.0)
        {
            let trim = overage.min(*spent);
            let hint = match *name {
                "meals" => "switch a few meals to local eateries or markets",
                "activities" => "swap paid attractions for free or cheaper ones",
                "transport" => "use public transit instead of taxis",
                _ => "choose simpler lodging for part of the stay",
            };
            suggestions.push(format!(
                "Cut roughly {trim:.0} from {name} (currently {spent:.0}): {hint}."
            ));
        }

        if overage > 0.30 * total_budget {
            suggestions.push(
                "The plan is far over budget; consider shortening the trip by a day."
                    .to_string(),
            );
        }
    }

    if total_delta < 0.0 && totals.total() > 0.0 && total_delta.abs() > 0.30 * total_budget {
        suggestions.push(
            "There is significant unused budget; consider upgrading a meal or activity."
                .to_string(),
        );
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, LocalFood};
    use chrono::NaiveDate;

    fn activity(name: &str, category: ActivityCategory, cost: f64) -> Activity {
        Activity {
            start_time: "10:00".into(),
            name: name.into(),
            description: String::new(),
            category,
            estimated_cost: cost,
            duration_minutes: 60,
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
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
                + chrono::Duration::days(i64::from(number) - 1),
            title: format!("Day {number}"),
            activities,
            local_food: Vec::new(),
        }
    }

    #[test]
    fn day_actual_is_sum_of_category_costs_plus_local_food() {
        let mut d = day(
            1,
            vec![
                activity("Museum", ActivityCategory::Activity, 20.0),
                activity("Lunch", ActivityCategory::Meal, 15.0),
                activity("Metro", ActivityCategory::Transport, 3.0),
                activity("Hotel", ActivityCategory::Lodging, 80.0),
            ],
        );
        d.local_food.push(LocalFood {
            name: "Pastel de nata".into(),
            estimated_cost: 2.0,
        });

        let verdict = check_budget(&[d], 1000.0, 1, &BudgetConfig::default());
        let cost = &verdict.days[0];
        assert_eq!(cost.by_category.activities, 20.0);
        assert_eq!(cost.by_category.meals, 15.0);
        assert_eq!(cost.by_category.transport, 3.0);
        assert_eq!(cost.by_category.lodging, 80.0);
        assert_eq!(cost.by_category.local_food, 2.0);
        assert_eq!(cost.actual, 120.0);
        // Aggregate actual equals the sum of per-day actuals.
        assert_eq!(verdict.total_actual, 120.0);
    }

    #[test]
    fn modest_spending_is_approved() {
        // Budget 500 over 2 days: days cost 80 and 60.
        let days = vec![
            day(
                1,
                vec![
                    activity("Walking tour", ActivityCategory::Activity, 50.0),
                    activity("Dinner", ActivityCategory::Meal, 30.0),
                ],
            ),
            day(
                2,
                vec![
                    activity("Gallery", ActivityCategory::Activity, 40.0),
                    activity("Lunch", ActivityCategory::Meal, 20.0),
                ],
            ),
        ];
        let verdict = check_budget(&days, 500.0, 2, &BudgetConfig::default());
        assert_eq!(verdict.status, BudgetStatus::Approved);
        assert_eq!(verdict.total_actual, 140.0);
        assert!(verdict.flagged_days.is_empty());
        // Well under budget: the per-day statuses say so.
        assert_eq!(verdict.days[0].status, BudgetStatus::UnderBudget);
    }

    #[test]
    fn overspending_is_rejected_and_flagged() {
        // Budget 200 for 1 day (allocation 180), costs 350.
        let days = vec![day(
            1,
            vec![
                activity("Helicopter tour", ActivityCategory::Activity, 200.0),
                activity("Tasting menu", ActivityCategory::Meal, 150.0),
            ],
        )];
        let verdict = check_budget(&days, 200.0, 1, &BudgetConfig::default());
        assert_eq!(verdict.status, BudgetStatus::OverBudget);
        assert_eq!(verdict.flagged_days, vec![1]);
        assert!(verdict.issues.iter().any(|i| i.day_number == Some(1)));
    }

    #[test]
    fn near_limit_day_is_flagged_as_warning() {
        // Allocation 90; 103 is a 14.4% overage: between warn and reject.
        let days = vec![day(
            1,
            vec![activity("Spa", ActivityCategory::Activity, 103.0)],
        )];
        let verdict = check_budget(&days, 100.0, 1, &BudgetConfig::default());
        assert_eq!(verdict.days[0].status, BudgetStatus::NearLimit);
        assert_eq!(verdict.status, BudgetStatus::NearLimit);
        assert_eq!(verdict.flagged_days, vec![1]);
    }

    #[test]
    fn suggestion_targets_dominant_category() {
        let days = vec![day(
            1,
            vec![
                activity("Snack", ActivityCategory::Activity, 20.0),
                activity("Omakase", ActivityCategory::Meal, 300.0),
            ],
        )];
        let verdict = check_budget(&days, 200.0, 1, &BudgetConfig::default());
        assert_eq!(verdict.status, BudgetStatus::OverBudget);
        let targeted = verdict
            .suggestions
            .iter()
            .any(|s| s.contains("meals") && s.contains("local eateries"));
        assert!(targeted, "suggestions: {:?}", verdict.suggestions);
        // 140 overage on a 200 budget: also suggest shortening the trip.
        assert!(
            verdict.suggestions.iter().any(|s| s.contains("shortening")),
            "suggestions: {:?}",
            verdict.suggestions
        );
    }

    #[test]
    fn empty_days_are_approved_with_empty_breakdown() {
        let verdict = check_budget(&[], 500.0, 3, &BudgetConfig::default());
        assert_eq!(verdict.status, BudgetStatus::Approved);
        assert!(verdict.days.is_empty());
        assert_eq!(verdict.total_actual, 0.0);
    }

    #[test]
    fn zero_budget_with_spending_is_over() {
        let days = vec![day(
            1,
            vec![activity("Anything", ActivityCategory::Activity, 10.0)],
        )];
        let verdict = check_budget(&days, 0.0, 1, &BudgetConfig::default());
        assert_eq!(verdict.status, BudgetStatus::OverBudget);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let config = BudgetConfig {
            reject_threshold: 1.0,
            ..BudgetConfig::default()
        };
        // 50% overage: rejected by default thresholds, tolerated here.
        let days = vec![day(
            1,
            vec![activity("Dinner", ActivityCategory::Meal, 135.0)],
        )];
        let verdict = check_budget(&days, 100.0, 1, &config);
        assert_eq!(verdict.status, BudgetStatus::NearLimit);
    }

    #[test]
    fn log_trail_covers_each_day_and_the_trip() {
        let days = vec![
            day(1, vec![activity("A", ActivityCategory::Activity, 10.0)]),
            day(2, vec![activity("B", ActivityCategory::Activity, 10.0)]),
        ];
        let verdict = check_budget(&days, 100.0, 2, &BudgetConfig::default());
        assert!(verdict.log.iter().any(|l| l.contains("day 1")));
        assert!(verdict.log.iter().any(|l| l.contains("day 2")));
        assert!(verdict.log.iter().any(|l| l.contains("trip actual")));
    }
}
