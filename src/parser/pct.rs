//! Parsers for `pct` command output
//!
//! Each function takes the literal text printed by `pct` and turns it into
//! typed values. Nothing here spawns processes.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use super::parse_bool;
use crate::container::{parse_tag, ContainerConfig, ContainerState, Snapshot};
use crate::error::{Result, SnapmoxError};

const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CURRENT_MARKER: &str = "current";

static LIST_LINE: OnceLock<Regex> = OnceLock::new();
static NET_KEY: OnceLock<Regex> = OnceLock::new();
static SNAPSHOT_LINE: OnceLock<Regex> = OnceLock::new();

fn list_line() -> &'static Regex {
    LIST_LINE.get_or_init(|| {
        Regex::new(r"^\s*(?P<id>\d+)\s+(?P<state>\w+)(?:\s+(?P<rest>.*?))?\s*$")
            .expect("static list pattern is valid")
    })
}

fn net_key() -> &'static Regex {
    NET_KEY.get_or_init(|| Regex::new(r"^net\d+$").expect("static net pattern is valid"))
}

fn snapshot_line() -> &'static Regex {
    SNAPSHOT_LINE.get_or_init(|| {
        Regex::new(
            r"^[\s`|]*->\s*(?P<name>\S+)(?:\s+(?P<date>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}))?(?:\s+(?P<desc>.*?))?\s*$",
        )
        .expect("static snapshot pattern is valid")
    })
}

/// One line of `pct listsnapshot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLine {
    Managed(Snapshot),
    /// A snapshot that does not follow the managed naming scheme
    Unmanaged(String),
    /// The `current` pseudo entry marking the live state
    Current,
}

/// Parse one data row of `pct list` into its container id
pub fn parse_list_line(line: &str) -> Result<u32> {
    let caps = list_line()
        .captures(line)
        .ok_or_else(|| SnapmoxError::ParseError(format!("unexpected pct list line '{}'", line)))?;
    caps["id"]
        .parse()
        .map_err(|e| SnapmoxError::ParseError(format!("invalid container id in '{}': {}", line, e)))
}

/// Parse the full output of `pct list`, skipping the header row.
///
/// Every data row yields its own result so one bad row never hides the others.
pub fn parse_container_list(output: &str) -> Vec<Result<u32>> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(parse_list_line)
        .collect()
}

/// Parse `pct config <id>` output
pub fn parse_config(output: &str) -> Result<ContainerConfig> {
    let mut arch = None;
    let mut os_type = None;
    let mut cores = 0;
    let mut memory_mb = 512;
    let mut swap_mb = 512;
    let mut hostname = String::new();
    let mut root_fs = String::new();
    let mut features = String::new();
    let mut networks = BTreeMap::new();
    let mut unprivileged = false;
    let mut template = false;

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        // pending changes and snapshot sections follow the live config
        if line.starts_with('[') {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(SnapmoxError::ParseError(format!(
                "unexpected pct config line '{}'",
                line
            )));
        };
        let value = value.trim();

        match key {
            "arch" => arch = Some(value.parse()?),
            "ostype" => os_type = Some(value.parse()?),
            "cores" => cores = parse_number(key, value)?,
            "memory" => memory_mb = parse_number(key, value)?,
            "swap" => swap_mb = parse_number(key, value)?,
            "hostname" => hostname = value.to_string(),
            "rootfs" => root_fs = value.to_string(),
            "features" => features = value.to_string(),
            "unprivileged" => unprivileged = parse_bool(value)?,
            "template" => template = parse_bool(value)?,
            k if net_key().is_match(k) => {
                networks.insert(k.to_string(), value.to_string());
            }
            _ => {}
        }
    }

    Ok(ContainerConfig {
        arch: arch.ok_or_else(|| SnapmoxError::ParseError("pct config has no arch".to_string()))?,
        os_type: os_type
            .ok_or_else(|| SnapmoxError::ParseError("pct config has no ostype".to_string()))?,
        cores,
        memory_mb,
        swap_mb,
        hostname,
        root_fs,
        features,
        networks,
        unprivileged,
        template,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| SnapmoxError::ParseError(format!("invalid {} '{}': {}", key, value, e)))
}

/// Parse `pct status <id>` output, e.g. `status: running`
pub fn parse_status(output: &str) -> Result<ContainerState> {
    let trimmed = output.trim();
    let value = trimmed
        .strip_prefix("status:")
        .ok_or_else(|| SnapmoxError::ParseError(format!("unexpected pct status '{}'", trimmed)))?;
    value.trim().parse()
}

/// Parse one line of `pct listsnapshot <id>`.
///
/// Managed entries take their date from the timestamp column. When pct omits
/// the column the timestamp embedded in the tag is used instead.
pub fn parse_snapshot_line(line: &str) -> Result<SnapshotLine> {
    let caps = snapshot_line().captures(line).ok_or_else(|| {
        SnapmoxError::ParseError(format!("unexpected pct listsnapshot line '{}'", line))
    })?;
    let name = &caps["name"];

    if name == CURRENT_MARKER {
        return Ok(SnapshotLine::Current);
    }
    let Some((cadence, tag_date)) = parse_tag(name) else {
        return Ok(SnapshotLine::Unmanaged(name.to_string()));
    };

    let date = match caps.name("date") {
        Some(m) => NaiveDateTime::parse_from_str(m.as_str(), SNAPSHOT_TIME_FORMAT).map_err(|e| {
            SnapmoxError::ParseError(format!("invalid snapshot date '{}': {}", m.as_str(), e))
        })?,
        None => tag_date,
    };

    Ok(SnapshotLine::Managed(Snapshot {
        tag: name.to_string(),
        date,
        cadence,
    }))
}
