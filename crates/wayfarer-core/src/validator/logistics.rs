//! Logistics validator ("the logistician"): pure time-and-space
//! feasibility checks for each day against the travel-group profile.
//!
//! Same shape as the budget validator: immutable inputs in, verdict plus
//! a log trail out, no I/O.

use serde::{Deserialize, Serialize};

use crate::model::{Coordinates, Day, GroupProfile, TransportMode};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Feasibility status for a day or the whole trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogisticsStatus {
    /// No conflicts, few activities, generous slack.
    Relaxed,
    Approved,
    /// More than one warning-severity conflict.
    Tight,
    /// At least one error-severity conflict.
    Impossible,
}

impl LogisticsStatus {
    /// Whether this status blocks approval of the run.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::Relaxed | Self::Approved)
    }
}

/// What kind of constraint a conflict violates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// An activity starts before the previous one ends.
    Timing,
    /// Not enough time to physically travel between locations.
    Transit,
    /// Travel fits but the group's required rest buffer does not.
    Buffer,
    /// Too many activities in one day.
    Density,
    /// Total active plus transit time is too long.
    Duration,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timing => "timing",
            Self::Transit => "transit",
            Self::Buffer => "buffer",
            Self::Density => "density",
            Self::Duration => "duration",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One feasibility conflict within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub day_number: u32,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub detail: String,
}

/// Per-mode travel-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeParams {
    pub minutes_per_km: f64,
    /// Fixed boarding/waiting overhead; zero for walking.
    pub overhead_min: f64,
}

/// Tunables for the logistics checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// Minimum rest buffer between activities, minutes.
    pub base_buffer_min: u32,
    /// Buffer when a toddler is in the group.
    pub toddler_buffer_min: u32,
    /// Buffer when an elderly or mobility-impaired traveller is present.
    pub assisted_buffer_min: u32,
    /// Extra buffer for groups larger than `large_group_size`.
    pub large_group_extra_min: u32,
    pub large_group_size: u32,
    /// Activities per day above which the day is infeasible.
    pub max_activities_per_day: usize,
    /// Activities per day that already warrant a warning for toddler groups.
    pub toddler_density_warning: usize,
    /// Total active+transit minutes per day above which to warn.
    pub max_daily_minutes: f64,
    pub walk: ModeParams,
    pub metro: ModeParams,
    pub bus: ModeParams,
    pub taxi: ModeParams,
    pub train: ModeParams,
    /// Auto-selection distance buckets (km): walk below the first bound,
    /// metro below the second, taxi below the third, train beyond.
    pub walk_km: f64,
    pub metro_km: f64,
    pub taxi_km: f64,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            base_buffer_min: 15,
            toddler_buffer_min: 30,
            assisted_buffer_min: 20,
            large_group_extra_min: 10,
            large_group_size: 4,
            max_activities_per_day: 5,
            toddler_density_warning: 4,
            max_daily_minutes: 600.0,
            walk: ModeParams {
                minutes_per_km: 12.0,
                overhead_min: 0.0,
            },
            metro: ModeParams {
                minutes_per_km: 3.0,
                overhead_min: 10.0,
            },
            bus: ModeParams {
                minutes_per_km: 5.0,
                overhead_min: 8.0,
            },
            taxi: ModeParams {
                minutes_per_km: 2.0,
                overhead_min: 5.0,
            },
            train: ModeParams {
                minutes_per_km: 1.2,
                overhead_min: 15.0,
            },
            walk_km: 1.2,
            metro_km: 8.0,
            taxi_km: 30.0,
        }
    }
}

impl LogisticsConfig {
    fn params(&self, mode: TransportMode) -> ModeParams {
        match mode {
            TransportMode::Walk => self.walk,
            TransportMode::Metro => self.metro,
            TransportMode::Bus => self.bus,
            TransportMode::Taxi => self.taxi,
            TransportMode::Train => self.train,
        }
    }
}

/// Per-day feasibility summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLogistics {
    pub day_number: u32,
    pub status: LogisticsStatus,
    /// Estimated active plus transit minutes.
    pub total_minutes: f64,
    pub warnings: usize,
    pub errors: usize,
}

/// Result of the logistics check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsVerdict {
    pub status: LogisticsStatus,
    pub days: Vec<DayLogistics>,
    /// Days that are tight or impossible; sorted ascending.
    pub flagged_days: Vec<u32>,
    pub conflicts: Vec<Conflict>,
    pub suggestions: Vec<String>,
    pub log: Vec<String>,
}

// ---------------------------------------------------------------------------
// Geometry and travel time
// ---------------------------------------------------------------------------

/// Straight-line (great-circle) distance in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Pick a transport mode for a distance when none was specified.
fn auto_mode(distance_km: f64, config: &LogisticsConfig) -> TransportMode {
    if distance_km <= config.walk_km {
        TransportMode::Walk
    } else if distance_km <= config.metro_km {
        TransportMode::Metro
    } else if distance_km <= config.taxi_km {
        TransportMode::Taxi
    } else {
        TransportMode::Train
    }
}

/// Estimated travel minutes between two points, with the mode used.
pub fn travel_estimate(
    distance_km: f64,
    mode: Option<TransportMode>,
    config: &LogisticsConfig,
) -> (TransportMode, f64) {
    let mode = mode.unwrap_or_else(|| auto_mode(distance_km, config));
    let params = config.params(mode);
    (mode, distance_km * params.minutes_per_km + params.overhead_min)
}

/// Required inter-activity rest buffer for a group, in minutes.
pub fn required_buffer(profile: &GroupProfile, config: &LogisticsConfig) -> u32 {
    let mut buffer = config.base_buffer_min;
    if profile.has_toddler {
        buffer = buffer.max(config.toddler_buffer_min);
    }
    if profile.has_elderly || profile.has_mobility_impaired {
        buffer = buffer.max(config.assisted_buffer_min);
    }
    if profile.size > config.large_group_size {
        buffer += config.large_group_extra_min;
    }
    buffer
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Check time-and-space feasibility of each day for the given group.
pub fn check_logistics(
    days: &[Day],
    profile: &GroupProfile,
    config: &LogisticsConfig,
) -> LogisticsVerdict {
    let buffer = required_buffer(profile, config);
    let mut log = vec![format!(
        "logistician: required buffer {buffer}min (group of {})",
        profile.size
    )];

    let mut day_results = Vec::with_capacity(days.len());
    let mut conflicts = Vec::new();
    let mut flagged_days = Vec::new();

    for day in days {
        let before = conflicts.len();
        let (total_minutes, generous_slack) =
            check_day(day, buffer, profile.has_toddler, config, &mut conflicts);
        let day_conflicts = &conflicts[before..];

        let errors = day_conflicts
            .iter()
            .filter(|c| c.severity == Severity::Error)
            .count();
        let warnings = day_conflicts.len() - errors;

        let status = if errors > 0 {
            LogisticsStatus::Impossible
        } else if warnings > 1 {
            LogisticsStatus::Tight
        } else if day_conflicts.is_empty() && day.activities.len() <= 3 && generous_slack {
            LogisticsStatus::Relaxed
        } else {
            LogisticsStatus::Approved
        };

        if matches!(status, LogisticsStatus::Impossible | LogisticsStatus::Tight) {
            flagged_days.push(day.day_number);
        }

        log.push(format!(
            "logistician: day {} {status:?} ({errors} errors, {warnings} warnings, {total_minutes:.0}min)",
            day.day_number
        ));

        day_results.push(DayLogistics {
            day_number: day.day_number,
            status,
            total_minutes,
            warnings,
            errors,
        });
    }

    // Aggregate: IMPOSSIBLE dominates, then the same hierarchy.
    let status = if day_results
        .iter()
        .any(|d| d.status == LogisticsStatus::Impossible)
    {
        LogisticsStatus::Impossible
    } else if day_results.iter().any(|d| d.status == LogisticsStatus::Tight) {
        LogisticsStatus::Tight
    } else if !day_results.is_empty()
        && day_results
            .iter()
            .all(|d| d.status == LogisticsStatus::Relaxed)
    {
        LogisticsStatus::Relaxed
    } else {
        LogisticsStatus::Approved
    };

    let suggestions = build_suggestions(&conflicts);

    flagged_days.sort_unstable();
    flagged_days.dedup();

    LogisticsVerdict {
        status,
        days: day_results,
        flagged_days,
        conflicts,
        suggestions,
        log,
    }
}

/// Check one day. Returns its total active+transit minutes and whether
/// every gap left generous slack (at least travel plus twice the buffer).
fn check_day(
    day: &Day,
    buffer: u32,
    has_toddler: bool,
    config: &LogisticsConfig,
    conflicts: &mut Vec<Conflict>,
) -> (f64, bool) {
    let n = day.activities.len();
    let mut total_minutes: f64 = day
        .activities
        .iter()
        .map(|a| f64::from(a.duration_minutes))
        .sum();
    let mut generous_slack = true;

    for pair in day.activities.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        let (Some(end), Some(start)) = (earlier.end_minutes(), later.start_minutes()) else {
            continue;
        };

        // Time ordering comes first; distance checks only make sense for
        // a validly ordered pair.
        if start < end {
            conflicts.push(Conflict {
                day_number: day.day_number,
                kind: ConflictKind::Timing,
                severity: Severity::Error,
                detail: format!(
                    "'{}' starts at {} before '{}' ends ({}min overlap)",
                    later.name,
                    later.start_time,
                    earlier.name,
                    end - start
                ),
            });
            generous_slack = false;
            continue;
        }
        let gap = f64::from(start - end);

        let travel = match (earlier.coords, later.coords) {
            (Some(from), Some(to)) => {
                let distance = haversine_km(from, to);
                let (mode, minutes) = travel_estimate(distance, later.transport_mode, config);
                total_minutes += minutes;
                if gap < minutes {
                    conflicts.push(Conflict {
                        day_number: day.day_number,
                        kind: ConflictKind::Transit,
                        severity: Severity::Error,
                        detail: format!(
                            "{distance:.1}km to '{}' needs ~{minutes:.0}min by {} but only {gap:.0}min is free",
                            later.name,
                            mode.as_str()
                        ),
                    });
                    generous_slack = false;
                    continue;
                }
                minutes
            }
            // No coordinates: travel time is unknowable, check only the
            // rest buffer.
            _ => 0.0,
        };

        if gap < travel + f64::from(buffer) {
            conflicts.push(Conflict {
                day_number: day.day_number,
                kind: ConflictKind::Buffer,
                severity: Severity::Warning,
                detail: format!(
                    "only {:.0}min between '{}' and '{}', group needs {buffer}min of slack",
                    gap - travel,
                    earlier.name,
                    later.name
                ),
            });
        }
        if gap < travel + f64::from(buffer) * 2.0 {
            generous_slack = false;
        }
    }

    if n > config.max_activities_per_day {
        conflicts.push(Conflict {
            day_number: day.day_number,
            kind: ConflictKind::Density,
            severity: Severity::Error,
            detail: format!(
                "{n} activities in one day (limit {})",
                config.max_activities_per_day
            ),
        });
    } else if has_toddler && n >= config.toddler_density_warning {
        conflicts.push(Conflict {
            day_number: day.day_number,
            kind: ConflictKind::Density,
            severity: Severity::Warning,
            detail: format!("{n} activities is a lot for a group with a toddler"),
        });
    }

    if total_minutes > config.max_daily_minutes {
        conflicts.push(Conflict {
            day_number: day.day_number,
            kind: ConflictKind::Duration,
            severity: Severity::Warning,
            detail: format!(
                "about {total_minutes:.0}min of activity and transit (limit {:.0}min)",
                config.max_daily_minutes
            ),
        });
    }

    (total_minutes, generous_slack)
}

fn build_suggestions(conflicts: &[Conflict]) -> Vec<String> {
    let mut suggestions = Vec::new();
    let has = |kind: ConflictKind| conflicts.iter().any(|c| c.kind == kind);

    if has(ConflictKind::Timing) {
        suggestions.push("Re-order overlapping activities or shorten the earlier one.".into());
    }
    if has(ConflictKind::Transit) {
        suggestions
            .push("Allow more time between distant activities, or pick closer ones.".into());
    }
    if has(ConflictKind::Buffer) {
        suggestions.push("Add rest gaps between activities for this group.".into());
    }
    if has(ConflictKind::Density) {
        suggestions.push("Move some activities to a lighter day.".into());
    }
    if has(ConflictKind::Duration) {
        suggestions.push("The day runs long; drop one activity or end earlier.".into());
    }
    suggestions
}
