//! Run configuration for Snapmox
//!
//! Configuration is read once from a YAML file before anything touches a
//! container and is never mutated afterwards. Every key is optional; the
//! defaults are the recommended setup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::container::{Cadence, OsType};
use crate::error::{Result, SnapmoxError};

pub const DEFAULT_SNAPSHOT_DESCRIPTION: &str = "Managed by Snapmox";

const APT_UPGRADE: &str = "apt update && apt upgrade -y && apt autoremove -y";

/// Distribution default update commands
pub fn default_update_commands() -> BTreeMap<OsType, String> {
    [
        (OsType::Alpine, "apk update && apk upgrade"),
        (OsType::Debian, APT_UPGRADE),
        (OsType::Ubuntu, APT_UPGRADE),
        (OsType::Devuan, APT_UPGRADE),
        (OsType::ArchLinux, "pacman -Syu --noconfirm && pacman -Rns --noconfirm $(pacman -Qdtq)"),
        (OsType::Centos, "yum upgrade -y && yum autoremove -y"),
        (OsType::Fedora, "dnf upgrade --refresh -y && dnf autoremove -y"),
        (OsType::Gentoo, "emerge --sync && emerge -uDN @world && emerge --depclean"),
        (
            OsType::Nixos,
            "nix-channel --update && nixos-rebuild switch --upgrade && nix-collect-garbage -d",
        ),
        (
            OsType::Opensuse,
            "zypper refresh && zypper update -y && zypper remove --clean-deps $(zypper packages --unneeded --quiet)",
        ),
    ]
    .into_iter()
    .map(|(os, cmd)| (os, cmd.to_string()))
    .collect()
}

/// Whether a tier is created and how many of its snapshots survive pruning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierPolicy {
    pub enabled: bool,
    pub retain: u32,
}

impl TierPolicy {
    pub const fn new(enabled: bool, retain: u32) -> Self {
        Self { enabled, retain }
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::new(true, 1)
    }
}

/// Snapshot tiers and the calendar days that trigger them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub daily: TierPolicy,
    pub weekly: TierPolicy,
    pub monthly: TierPolicy,
    pub quarterly: TierPolicy,
    pub yearly: TierPolicy,
    /// 0 = Monday ... 6 = Sunday
    pub weekly_day: u32,
    /// 1-28
    pub monthly_day: u32,
    /// 1-365
    pub yearly_day: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            daily: TierPolicy::new(true, 3),
            weekly: TierPolicy::default(),
            monthly: TierPolicy::default(),
            quarterly: TierPolicy::default(),
            yearly: TierPolicy::default(),
            weekly_day: 0,
            monthly_day: 1,
            yearly_day: 1,
        }
    }
}

impl RetentionConfig {
    pub fn tier(&self, cadence: Cadence) -> &TierPolicy {
        match cadence {
            Cadence::Daily => &self.daily,
            Cadence::Weekly => &self.weekly,
            Cadence::Monthly => &self.monthly,
            Cadence::Quarterly => &self.quarterly,
            Cadence::Yearly => &self.yearly,
        }
    }

    pub fn any_enabled(&self) -> bool {
        Cadence::ALL.iter().any(|c| self.tier(*c).enabled)
    }
}

/// Complete configuration of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub do_snapshots: bool,
    pub retention: RetentionConfig,
    pub exclude_from_snapshots: BTreeSet<u32>,
    pub snapshot_description: String,

    pub do_update: bool,
    pub rollback_on_error: bool,
    pub exclude_from_rollback: BTreeSet<u32>,
    pub update_timeout_secs: u64,
    /// Merged over [`default_update_commands`]
    #[serde(deserialize_with = "merge_update_commands")]
    pub update_commands: BTreeMap<OsType, String>,
    pub exclude_from_update: BTreeSet<u32>,
    pub update_overrides: BTreeMap<u32, String>,
    /// Containers updated at the same time
    pub update_parallelism: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            do_snapshots: true,
            retention: RetentionConfig::default(),
            exclude_from_snapshots: BTreeSet::new(),
            snapshot_description: DEFAULT_SNAPSHOT_DESCRIPTION.to_string(),
            do_update: true,
            rollback_on_error: true,
            exclude_from_rollback: BTreeSet::new(),
            update_timeout_secs: 300,
            update_commands: default_update_commands(),
            exclude_from_update: BTreeSet::new(),
            update_overrides: BTreeMap::new(),
            update_parallelism: 1,
        }
    }
}

fn merge_update_commands<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<OsType, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<OsType, String>::deserialize(deserializer)?;
    let mut commands = default_update_commands();
    commands.extend(overrides);
    Ok(commands)
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML configuration text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // An empty document means "all defaults"
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot honour
    pub fn validate(&self) -> Result<()> {
        let r = &self.retention;
        if r.weekly_day > 6 {
            return Err(SnapmoxError::ConfigError(format!(
                "weekly_day must be between 0 (Monday) and 6 (Sunday), got {}",
                r.weekly_day
            )));
        }
        if !(1..=28).contains(&r.monthly_day) {
            return Err(SnapmoxError::ConfigError(format!(
                "monthly_day must be between 1 and 28, got {}",
                r.monthly_day
            )));
        }
        if !(1..=365).contains(&r.yearly_day) {
            return Err(SnapmoxError::ConfigError(format!(
                "yearly_day must be between 1 and 365, got {}",
                r.yearly_day
            )));
        }
        if self.update_timeout_secs == 0 {
            return Err(SnapmoxError::ConfigError(
                "update_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.update_parallelism == 0 {
            return Err(SnapmoxError::ConfigError(
                "update_parallelism must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings that are valid but discouraged
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.do_snapshots && !self.retention.any_enabled() {
            warnings.push(
                "all snapshot tiers are disabled; no snapshots will be created".to_string(),
            );
        }
        if self.do_snapshots && self.retention.daily.retain == 0 {
            warnings.push(
                "daily retain count is 0; daily snapshots are pruned right after creation"
                    .to_string(),
            );
        }
        if self.do_update && self.rollback_on_error && !self.do_snapshots {
            warnings.push(
                "rollback_on_error is set but snapshots are disabled; rollbacks may restore stale state"
                    .to_string(),
            );
        }
        for id in &self.exclude_from_snapshots {
            if self.do_update && !self.exclude_from_update.contains(id) {
                warnings.push(format!("CT {} is excluded from snapshots but still updated", id));
            }
        }
        warnings
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
