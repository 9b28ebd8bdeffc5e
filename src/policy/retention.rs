//! Per-cadence snapshot quotas

use crate::config::RetentionConfig;
use crate::container::{Cadence, Snapshot};

/// Snapshots that exceed their tier's retain count.
///
/// `snapshots` must be ordered newest first: each tier keeps its first
/// `retain` entries and everything older of the same tier is returned,
/// regardless of how other tiers interleave.
pub fn plan_prune<'a>(snapshots: &'a [Snapshot], retention: &RetentionConfig) -> Vec<&'a Snapshot> {
    let mut seen = [0u32; Cadence::ALL.len()];
    snapshots
        .iter()
        .filter(|snapshot| {
            let count = &mut seen[snapshot.cadence as usize];
            *count += 1;
            *count > retention.tier(snapshot.cadence).retain
        })
        .collect()
}
