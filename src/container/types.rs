//! Container struct definition
//!
//! A Container is one LXC guest as seen at the start of a run: its parsed
//! configuration, its power state and its managed snapshot history.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::snapshot::Snapshot;
use crate::error::{Result, SnapmoxError};

/// Guest CPU architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
    Armhf,
    I386,
    Riscv32,
    Riscv64,
}

impl FromStr for Arch {
    type Err = SnapmoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "amd64" => Ok(Arch::Amd64),
            "arm64" => Ok(Arch::Arm64),
            "armhf" => Ok(Arch::Armhf),
            "i386" => Ok(Arch::I386),
            "riscv32" => Ok(Arch::Riscv32),
            "riscv64" => Ok(Arch::Riscv64),
            other => Err(SnapmoxError::ParseError(format!(
                "unknown architecture '{}'",
                other
            ))),
        }
    }
}

/// Guest distribution, used to pick the update command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Alpine,
    #[serde(rename = "archlinux")]
    ArchLinux,
    Centos,
    Debian,
    Devuan,
    Fedora,
    Gentoo,
    Nixos,
    Opensuse,
    Ubuntu,
    Unmanaged,
}

impl OsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Alpine => "alpine",
            OsType::ArchLinux => "archlinux",
            OsType::Centos => "centos",
            OsType::Debian => "debian",
            OsType::Devuan => "devuan",
            OsType::Fedora => "fedora",
            OsType::Gentoo => "gentoo",
            OsType::Nixos => "nixos",
            OsType::Opensuse => "opensuse",
            OsType::Ubuntu => "ubuntu",
            OsType::Unmanaged => "unmanaged",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for OsType {
    type Err = SnapmoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alpine" => Ok(OsType::Alpine),
            "archlinux" => Ok(OsType::ArchLinux),
            "centos" => Ok(OsType::Centos),
            "debian" => Ok(OsType::Debian),
            "devuan" => Ok(OsType::Devuan),
            "fedora" => Ok(OsType::Fedora),
            "gentoo" => Ok(OsType::Gentoo),
            "nixos" => Ok(OsType::Nixos),
            "opensuse" => Ok(OsType::Opensuse),
            "ubuntu" => Ok(OsType::Ubuntu),
            "unmanaged" => Ok(OsType::Unmanaged),
            other => Err(SnapmoxError::ParseError(format!(
                "unknown OS type '{}'",
                other
            ))),
        }
    }
}

/// Power state reported by `pct status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Running,
    Stopped,
    Unknown,
    Suspended,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::Unknown => "unknown",
            ContainerState::Suspended => "suspended",
        };
        f.pad(s)
    }
}

impl FromStr for ContainerState {
    type Err = SnapmoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(ContainerState::Running),
            "stopped" => Ok(ContainerState::Stopped),
            "unknown" => Ok(ContainerState::Unknown),
            "suspended" => Ok(ContainerState::Suspended),
            other => Err(SnapmoxError::ParseError(format!(
                "unknown container state '{}'",
                other
            ))),
        }
    }
}

/// Static configuration of a container as read from `pct config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub arch: Arch,
    pub os_type: OsType,
    pub cores: u32,
    pub memory_mb: u64,
    pub swap_mb: u64,
    pub hostname: String,
    pub root_fs: String,
    pub features: String,
    /// Interface name (`net0`, `net1`, ...) to its raw option string
    pub networks: BTreeMap<String, String>,
    pub unprivileged: bool,
    pub template: bool,
}

/// A managed LXC guest
#[derive(Debug, Clone, Serialize)]
pub struct Container {
    pub id: u32,
    #[serde(flatten)]
    pub config: ContainerConfig,
    pub state: ContainerState,
    /// Managed snapshots, newest first
    snapshots: Vec<Snapshot>,
    /// Cleared when no fresh rollback point exists for this run
    pub upgrade_safe: bool,
}

impl Container {
    /// Create a container, ordering its snapshots newest first
    pub fn new(
        id: u32,
        config: ContainerConfig,
        state: ContainerState,
        mut snapshots: Vec<Snapshot>,
    ) -> Self {
        snapshots.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.tag.cmp(&a.tag)));
        Self {
            id,
            config,
            state,
            snapshots,
            upgrade_safe: true,
        }
    }

    /// Managed snapshots ordered from newest to oldest
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn newest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }

    /// Record a freshly created snapshot without breaking the ordering
    pub fn record_snapshot(&mut self, snapshot: Snapshot) {
        let pos = self
            .snapshots
            .iter()
            .position(|s| s.date < snapshot.date)
            .unwrap_or(self.snapshots.len());
        self.snapshots.insert(pos, snapshot);
    }

    /// Drop a snapshot from the in-memory history after it was deleted
    pub fn forget_snapshot(&mut self, tag: &str) -> Option<Snapshot> {
        let pos = self.snapshots.iter().position(|s| s.tag == tag)?;
        Some(self.snapshots.remove(pos))
    }

    /// Whether any managed snapshot was taken on the given calendar day
    pub fn has_snapshot_on(&self, day: NaiveDate) -> bool {
        self.snapshots.iter().any(|s| s.taken_on(day))
    }

    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}
