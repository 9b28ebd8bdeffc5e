//! Managed snapshots and their retention cadence
//!
//! Every snapshot Snapmox creates carries a tag of the form
//! `snapshot-<cadence>-<YYYYMMDD>_<HHMMSS>`. Anything else on a container is
//! foreign and never touched.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapmoxError};

const TAG_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

static TAG_PATTERN: OnceLock<Regex> = OnceLock::new();

fn tag_pattern() -> &'static Regex {
    TAG_PATTERN.get_or_init(|| {
        Regex::new(r"^snapshot-(?P<cadence>[a-z]+)-(?P<stamp>\d{8}_\d{6})$")
            .expect("static tag pattern is valid")
    })
}

/// Retention tier of a managed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Cadence {
    pub const ALL: [Cadence; 5] = [
        Cadence::Daily,
        Cadence::Weekly,
        Cadence::Monthly,
        Cadence::Quarterly,
        Cadence::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
            Cadence::Quarterly => "quarterly",
            Cadence::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = SnapmoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            "quarterly" => Ok(Cadence::Quarterly),
            "yearly" => Ok(Cadence::Yearly),
            other => Err(SnapmoxError::ParseError(format!(
                "unknown snapshot cadence '{}'",
                other
            ))),
        }
    }
}

/// A managed point-in-time checkpoint of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tag: String,
    pub date: NaiveDateTime,
    pub cadence: Cadence,
}

impl Snapshot {
    /// Build the record for a snapshot taken at `at`, truncated to the second
    pub fn new(cadence: Cadence, at: NaiveDateTime) -> Self {
        let date = at.with_nanosecond(0).unwrap_or(at);
        Self {
            tag: format_tag(cadence, date),
            date,
            cadence,
        }
    }

    pub fn taken_on(&self, day: NaiveDate) -> bool {
        self.date.date() == day
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}  {}", self.tag, self.date, self.cadence)
    }
}

/// Render the tag for a snapshot of `cadence` taken at `at`
pub fn format_tag(cadence: Cadence, at: NaiveDateTime) -> String {
    format!("snapshot-{}-{}", cadence, at.format(TAG_TIME_FORMAT))
}

/// Parse a managed tag back into its cadence and embedded timestamp.
///
/// Returns `None` for tags that do not follow the managed naming scheme.
pub fn parse_tag(tag: &str) -> Option<(Cadence, NaiveDateTime)> {
    let caps = tag_pattern().captures(tag)?;
    let cadence = caps["cadence"].parse().ok()?;
    let stamp = NaiveDateTime::parse_from_str(&caps["stamp"], TAG_TIME_FORMAT).ok()?;
    Some((cadence, stamp))
}

pub fn is_managed_tag(tag: &str) -> bool {
    parse_tag(tag).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_format_tag() {
        let tag = format_tag(Cadence::Daily, at(2024, 3, 9, 4, 5, 6));
        assert_eq!(tag, "snapshot-daily-20240309_040506");
    }

    #[test]
    fn test_tag_round_trip_keeps_cadence_and_second() {
        let now = at(2024, 12, 31, 23, 59, 58) + chrono::Duration::milliseconds(731);
        let snapshot = Snapshot::new(Cadence::Quarterly, now);

        let (cadence, date) = parse_tag(&snapshot.tag).unwrap();
        assert_eq!(cadence, Cadence::Quarterly);
        assert_eq!(date, at(2024, 12, 31, 23, 59, 58));
        assert_eq!(date, snapshot.date);
    }

    #[test]
    fn test_foreign_tags_are_unmanaged() {
        assert!(!is_managed_tag("before-upgrade"));
        assert!(!is_managed_tag("snapshot-hourly-20240101_000000"));
        assert!(!is_managed_tag("snapshot-daily-2024010_000000"));
        assert!(!is_managed_tag("snapshot-daily-20241301_000000"));
        assert!(is_managed_tag("snapshot-yearly-20240101_000000"));
    }

    #[test]
    fn test_cadence_from_str() {
        assert_eq!("weekly".parse::<Cadence>().unwrap(), Cadence::Weekly);
        assert!("Weekly".parse::<Cadence>().is_err());
    }

    #[test]
    fn test_taken_on() {
        let snapshot = Snapshot::new(Cadence::Daily, at(2024, 1, 1, 3, 0, 0));
        assert!(snapshot.taken_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(!snapshot.taken_on(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
    }
}
