//! Which snapshot, if any, a container gets today

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::config::{Config, RetentionConfig};
use crate::container::{Cadence, Container};

type Trigger = fn(NaiveDate, &RetentionConfig) -> bool;

fn yearly(day: NaiveDate, r: &RetentionConfig) -> bool {
    day.ordinal() == r.yearly_day
}

fn quarterly(day: NaiveDate, _: &RetentionConfig) -> bool {
    day.day() == 1 && matches!(day.month(), 1 | 4 | 7 | 10)
}

fn monthly(day: NaiveDate, r: &RetentionConfig) -> bool {
    day.day() == r.monthly_day
}

fn weekly(day: NaiveDate, r: &RetentionConfig) -> bool {
    day.weekday().num_days_from_monday() == r.weekly_day
}

fn daily(_: NaiveDate, _: &RetentionConfig) -> bool {
    true
}

/// Cadences in priority order; the first enabled tier whose trigger matches wins.
pub const PRIORITY: [(Cadence, Trigger); 5] = [
    (Cadence::Yearly, yearly),
    (Cadence::Quarterly, quarterly),
    (Cadence::Monthly, monthly),
    (Cadence::Weekly, weekly),
    (Cadence::Daily, daily),
];

/// Pick the single cadence to snapshot at `now`, or `None` if every tier is off
pub fn classify(now: NaiveDateTime, retention: &RetentionConfig) -> Option<Cadence> {
    let day = now.date();
    PRIORITY
        .iter()
        .find(|(cadence, trigger)| retention.tier(*cadence).enabled && trigger(day, retention))
        .map(|(cadence, _)| *cadence)
}

/// Outcome of the snapshot decision for one container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "cadence", rename_all = "snake_case")]
pub enum SnapshotDecision {
    /// Listed in `exclude_from_snapshots`
    Excluded,
    /// A managed snapshot from today exists; the container is not upgrade-safe
    AlreadyTaken,
    Create(Cadence),
    /// Every tier is disabled
    Disabled,
}

/// Decide what the snapshot phase does for `container` at `now`
pub fn plan_snapshot(
    container: &Container,
    now: NaiveDateTime,
    config: &Config,
) -> SnapshotDecision {
    if config.exclude_from_snapshots.contains(&container.id) {
        return SnapshotDecision::Excluded;
    }
    if container.has_snapshot_on(now.date()) {
        return SnapshotDecision::AlreadyTaken;
    }
    match classify(now, &config.retention) {
        Some(cadence) => SnapshotDecision::Create(cadence),
        None => SnapshotDecision::Disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierPolicy;
    use crate::container::{sample_config, ContainerState, OsType, Snapshot};

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_plain_day_is_daily() {
        // Wednesday 2024-05-08, not the 1st, not day 1 of the year
        let retention = RetentionConfig::default();
        assert_eq!(classify(day(2024, 5, 8), &retention), Some(Cadence::Daily));
    }

    #[test]
    fn test_weekly_day() {
        // 2024-05-06 is a Monday
        let retention = RetentionConfig::default();
        assert_eq!(classify(day(2024, 5, 6), &retention), Some(Cadence::Weekly));
    }

    #[test]
    fn test_monthly_beats_weekly() {
        // 2024-07-15 is a Monday
        let retention = RetentionConfig {
            monthly_day: 15,
            ..RetentionConfig::default()
        };
        assert_eq!(classify(day(2024, 7, 15), &retention), Some(Cadence::Monthly));
    }

    #[test]
    fn test_quarterly_beats_monthly() {
        let retention = RetentionConfig::default();
        assert_eq!(classify(day(2024, 4, 1), &retention), Some(Cadence::Quarterly));
        assert_eq!(classify(day(2024, 5, 1), &retention), Some(Cadence::Monthly));
    }

    #[test]
    fn test_yearly_beats_everything() {
        // 2024-01-01 is a Monday, the 1st of a month and of a quarter
        let retention = RetentionConfig::default();
        assert_eq!(classify(day(2024, 1, 1), &retention), Some(Cadence::Yearly));
    }

    #[test]
    fn test_yearly_and_weekly_coincide() {
        // day 40 of 2024 is Friday 2024-02-09
        let retention = RetentionConfig {
            yearly_day: 40,
            weekly_day: 4,
            ..RetentionConfig::default()
        };
        assert_eq!(classify(day(2024, 2, 9), &retention), Some(Cadence::Yearly));
    }

    #[test]
    fn test_disabled_tier_falls_through() {
        let retention = RetentionConfig {
            yearly: TierPolicy::new(false, 1),
            quarterly: TierPolicy::new(false, 1),
            ..RetentionConfig::default()
        };
        assert_eq!(classify(day(2024, 1, 1), &retention), Some(Cadence::Monthly));
    }

    #[test]
    fn test_all_disabled() {
        let off = TierPolicy::new(false, 1);
        let retention = RetentionConfig {
            daily: off,
            weekly: off,
            monthly: off,
            quarterly: off,
            yearly: off,
            ..RetentionConfig::default()
        };
        assert_eq!(classify(day(2024, 1, 1), &retention), None);
        assert_eq!(classify(day(2024, 5, 8), &retention), None);
    }

    #[test]
    fn test_plan_snapshot() {
        let config = Config::default();
        let now = day(2024, 5, 8);
        let fresh = Container::new(
            101,
            sample_config(OsType::Debian),
            ContainerState::Running,
            vec![],
        );
        assert_eq!(
            plan_snapshot(&fresh, now, &config),
            SnapshotDecision::Create(Cadence::Daily)
        );

        let taken = Container::new(
            105,
            sample_config(OsType::Debian),
            ContainerState::Running,
            vec![Snapshot::new(Cadence::Weekly, day(2024, 5, 8))],
        );
        assert_eq!(plan_snapshot(&taken, now, &config), SnapshotDecision::AlreadyTaken);

        let mut config = Config::default();
        config.exclude_from_snapshots.insert(105);
        assert_eq!(plan_snapshot(&taken, now, &config), SnapshotDecision::Excluded);
    }
}
