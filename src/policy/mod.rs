//! Maintenance decisions
//!
//! Everything here is a pure function of the container set, the clock and
//! the configuration. Acting on the decisions lives in [`crate::engine`].

pub mod cadence;
pub mod retention;
pub mod update;

pub use cadence::{classify, plan_snapshot, SnapshotDecision};
pub use retention::plan_prune;
pub use update::{
    check_eligibility, resolve_command, rollback_target, should_rollback, SkipReason,
    UpdateOutcome,
};
