//! Parsers for container manager output

pub mod pct;

pub use pct::{
    parse_config, parse_container_list, parse_list_line, parse_snapshot_line, parse_status,
    SnapshotLine,
};

use crate::error::{Result, SnapmoxError};

/// Parse a boolean flag as written by pct.
///
/// Only the literal tokens pct and its users write are accepted; anything
/// else is an error rather than being guessed from truthiness.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SnapmoxError::ParseError(format!(
            "expected a boolean (0/1, true/false, yes/no, on/off), got '{}'",
            other
        ))),
    }
}
