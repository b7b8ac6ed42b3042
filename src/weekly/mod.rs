//! Weekly trip rollups.
//!
//! This module pulls the raw trips of one weekly window from the warehouse,
//! reduces them to a single [`WeeklySummary`], and normalizes the record
//! (rounding and integer casts) before it is merged into the summary table.

pub mod aggregate;
pub mod types;
pub mod utility;

pub use aggregate::{compute_weekly_summary, summarize};
pub use types::{TripRecord, WEEKLY_SUMMARY_COLUMNS, WeeklySummary};
