//! Stream events: the ordered, finite sequence a run produces.
//!
//! The core emits these values; a transport adapter (SSE, websocket,
//! stdout) decides how they reach the consumer. Every event carries an
//! identifier of the form `{kind}-{index}` with a per-kind monotonically
//! increasing index, so a reconnecting consumer can name the last event
//! it received and have already-generated days replayed.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::director::{CombinedVerdict, OverallStatus};
use crate::model::{Day, RunMetrics};
use crate::validator::{BudgetStatus, LogisticsStatus};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Compact verdict carried by `validation` and `done` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictSummary {
    pub status: OverallStatus,
    pub flagged_days: Vec<u32>,
    /// Refinement iterations performed.
    pub iterations: u32,
}

impl From<&CombinedVerdict> for VerdictSummary {
    fn from(verdict: &CombinedVerdict) -> Self {
        Self {
            status: verdict.status,
            flagged_days: verdict.flagged_days.clone(),
            iterations: verdict.iteration,
        }
    }
}

/// One event in a run's output sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// First event of every (admitted) run.
    Meta {
        id: String,
        run_id: Uuid,
        destination: String,
        total_days: u32,
        start_date: NaiveDate,
        /// Days that already existed when resuming; 0 for fresh runs.
        resumed_days: u32,
    },
    Progress {
        id: String,
        day_number: u32,
        total_days: u32,
        percent: u8,
        status: String,
    },
    /// A completed day.
    Day {
        id: String,
        day: Day,
        /// Replayed from pre-existing state rather than generated now.
        cached: bool,
        /// Regenerated during a refinement pass.
        refined: bool,
    },
    Validation {
        id: String,
        iteration: u32,
        budget_status: BudgetStatus,
        logistics_status: LogisticsStatus,
        flagged_days: Vec<u32>,
        log: Vec<String>,
    },
    /// Announces which days are about to be regenerated and why.
    Refinement {
        id: String,
        iteration: u32,
        days: Vec<u32>,
        reason: String,
    },
    /// Terminal success event (the result may still be partial).
    Done {
        id: String,
        total_days: u32,
        total_activities: u32,
        elapsed_ms: u64,
        /// Whether the run reached the requested day count.
        complete: bool,
        verdict: Option<VerdictSummary>,
        metrics: RunMetrics,
    },
    /// Terminal or inline failure.
    Error {
        id: String,
        message: String,
        recoverable: bool,
        partial_days: u32,
    },
}

impl StreamEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::Meta { id, .. }
            | Self::Progress { id, .. }
            | Self::Day { id, .. }
            | Self::Validation { id, .. }
            | Self::Refinement { id, .. }
            | Self::Done { id, .. }
            | Self::Error { id, .. } => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done { .. } | Self::Error { recoverable: false, .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Identifier allocation
// ---------------------------------------------------------------------------

/// Per-kind event id counters for one run.
///
/// Atomics because the heartbeat task allocates progress ids concurrently
/// with the driver. `day` ids use the day number itself, so a refined day
/// re-emits under the same identifier and replaces the earlier value on
/// the consumer side.
#[derive(Debug, Default)]
pub struct EventIds {
    progress: AtomicU32,
    validation: AtomicU32,
    refinement: AtomicU32,
    error: AtomicU32,
}

impl EventIds {
    pub fn meta(&self) -> String {
        "meta-1".to_string()
    }

    pub fn next_progress(&self) -> String {
        format!("progress-{}", self.progress.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn day(&self, day_number: u32) -> String {
        format!("day-{day_number}")
    }

    pub fn next_validation(&self) -> String {
        format!(
            "validation-{}",
            self.validation.fetch_add(1, Ordering::Relaxed) + 1
        )
    }

    pub fn next_refinement(&self) -> String {
        format!(
            "refinement-{}",
            self.refinement.fetch_add(1, Ordering::Relaxed) + 1
        )
    }

    pub fn done(&self) -> String {
        "done-1".to_string()
    }

    pub fn next_error(&self) -> String {
        format!("error-{}", self.error.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

// ---------------------------------------------------------------------------
// Resume cursor
// ---------------------------------------------------------------------------

/// Parsed `{kind}-{index}` identifier sent by a reconnecting consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeCursor {
    pub kind_is_day: bool,
    pub index: u32,
}

impl ResumeCursor {
    /// Parse a last-event identifier. Returns `None` for unrecognized
    /// strings; an unparseable cursor means "replay everything".
    pub fn parse(id: &str) -> Option<Self> {
        let (kind, index) = id.rsplit_once('-')?;
        let index: u32 = index.parse().ok()?;
        if kind.is_empty() {
            return None;
        }
        Some(Self {
            kind_is_day: kind == "day",
            index,
        })
    }

    /// The last day number the consumer saw, if the cursor names a day.
    pub fn last_day(&self) -> Option<u32> {
        self.kind_is_day.then_some(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_kind_scoped_and_monotonic() {
        let ids = EventIds::default();
        assert_eq!(ids.next_progress(), "progress-1");
        assert_eq!(ids.next_progress(), "progress-2");
        assert_eq!(ids.next_validation(), "validation-1");
        assert_eq!(ids.next_progress(), "progress-3");
        assert_eq!(ids.day(3), "day-3");
        assert_eq!(ids.meta(), "meta-1");
        assert_eq!(ids.done(), "done-1");
    }

    #[test]
    fn cursor_parses_day_ids() {
        let cursor = ResumeCursor::parse("day-3").unwrap();
        assert_eq!(cursor.last_day(), Some(3));

        let cursor = ResumeCursor::parse("progress-7").unwrap();
        assert_eq!(cursor.last_day(), None);

        assert!(ResumeCursor::parse("nonsense").is_none());
        assert!(ResumeCursor::parse("day-x").is_none());
        assert!(ResumeCursor::parse("-3").is_none());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = StreamEvent::Progress {
            id: "progress-1".into(),
            day_number: 2,
            total_days: 5,
            percent: 40,
            status: "generating day 2".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["id"], "progress-1");
        assert_eq!(json["percent"], 40);

        let back: StreamEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn terminal_classification() {
        let done = StreamEvent::Done {
            id: "done-1".into(),
            total_days: 2,
            total_activities: 6,
            elapsed_ms: 1200,
            complete: true,
            verdict: None,
            metrics: RunMetrics::default(),
        };
        assert!(done.is_terminal());

        let inline = StreamEvent::Error {
            id: "error-1".into(),
            message: "parse failed".into(),
            recoverable: true,
            partial_days: 1,
        };
        assert!(!inline.is_terminal());

        let fatal = StreamEvent::Error {
            id: "error-1".into(),
            message: "budget".into(),
            recoverable: false,
            partial_days: 0,
        };
        assert!(fatal.is_terminal());
    }
}
