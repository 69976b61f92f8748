//! Rule-based validators for generated itineraries.
//!
//! Both validators are pure functions over immutable inputs returning a
//! verdict plus a log list. They never touch the provider, the clock, or
//! any I/O, which is what makes them testable without the orchestrator.
//! The [`crate::director`] arbitrates between them.

pub mod budget;
pub mod logistics;

pub use budget::{BudgetConfig, BudgetStatus, BudgetVerdict, check_budget};
pub use logistics::{
    Conflict, ConflictKind, LogisticsConfig, LogisticsStatus, LogisticsVerdict, Severity,
    check_logistics,
};
