//! In-memory control backend for tests.
//!
//! Serves pct-formatted text for a fixed set of containers, records every
//! write, and lets tests decide how commands and snapshot operations behave.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{ControlInterface, ExecOutput};
use crate::container::parse_tag;
use crate::error::{Result, SnapmoxError};

/// What `exec` does for a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockExec {
    /// Exit 0 with the given output
    Succeed(String),
    /// Exit with a non-zero code and output
    Exit(i32, String),
    /// Exceed the time bound
    Timeout,
    /// The exec transport itself fails
    Broken,
}

/// A write performed against the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    CreateSnapshot { ctid: u32, tag: String },
    DeleteSnapshot { ctid: u32, tag: String },
    Rollback { ctid: u32, tag: String, autostart: bool },
    Exec { ctid: u32, command: String },
}

/// One simulated container
#[derive(Debug, Clone)]
pub struct MockContainer {
    pub config: String,
    pub status: String,
    /// Raw `pct listsnapshot` lines, without the `current` entry
    pub snapshot_lines: Vec<String>,
    pub exec: MockExec,
    pub fail_create: bool,
    pub fail_rollback: bool,
    pub fail_delete: BTreeSet<String>,
}

impl MockContainer {
    pub fn new(os_type: &str, state: &str) -> Self {
        Self {
            config: format!(
                "arch: amd64\ncores: 1\nhostname: ct-{os}\nmemory: 512\nnet0: name=eth0,bridge=vmbr0,ip=dhcp,type=veth\nostype: {os}\nrootfs: local-lvm:disk-0,size=4G\nswap: 512\nunprivileged: 1\n",
                os = os_type
            ),
            status: format!("status: {}\n", state),
            snapshot_lines: Vec::new(),
            exec: MockExec::Succeed(String::new()),
            fail_create: false,
            fail_rollback: false,
            fail_delete: BTreeSet::new(),
        }
    }

    pub fn running(os_type: &str) -> Self {
        Self::new(os_type, "running")
    }

    pub fn stopped(os_type: &str) -> Self {
        Self::new(os_type, "stopped")
    }

    pub fn with_config(mut self, config: &str) -> Self {
        self.config = config.to_string();
        self
    }

    /// Add a managed snapshot, deriving the date column from its tag
    pub fn with_snapshot(mut self, tag: &str) -> Self {
        self.snapshot_lines.push(snapshot_line(tag, "Managed by Snapmox"));
        self
    }

    /// Add an arbitrary raw snapshot line
    pub fn with_snapshot_line(mut self, line: &str) -> Self {
        self.snapshot_lines.push(line.to_string());
        self
    }

    pub fn with_exec(mut self, exec: MockExec) -> Self {
        self.exec = exec;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn failing_delete(mut self, tag: &str) -> Self {
        self.fail_delete.insert(tag.to_string());
        self
    }
}

fn snapshot_line(tag: &str, description: &str) -> String {
    match parse_tag(tag) {
        Some((_, date)) => format!(
            "`-> {} {} {}",
            tag,
            date.format("%Y-%m-%d %H:%M:%S"),
            description
        ),
        None => format!("`-> {} {}", tag, description),
    }
}

fn line_tag(line: &str) -> Option<&str> {
    line.split_whitespace().nth(1)
}

#[derive(Debug, Default)]
struct MockState {
    containers: BTreeMap<u32, MockContainer>,
    calls: Vec<ControlCall>,
    list_fails: bool,
}

/// A test double implementing [`ControlInterface`]
#[derive(Debug, Default)]
pub struct MockControl {
    state: Mutex<MockState>,
}

impl MockControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, ctid: u32, container: MockContainer) -> Self {
        self.lock().containers.insert(ctid, container);
        self
    }

    /// Make `list_containers` fail, simulating an unavailable manager
    pub fn unavailable(self) -> Self {
        self.lock().list_fails = true;
        self
    }

    /// All writes performed so far
    pub fn calls(&self) -> Vec<ControlCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Tags currently present on a container, in tree order
    pub fn snapshot_tags(&self, ctid: u32) -> Vec<String> {
        self.lock()
            .containers
            .get(&ctid)
            .map(|c| {
                c.snapshot_lines
                    .iter()
                    .filter_map(|l| line_tag(l))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_ct<T>(
        &self,
        ctid: u32,
        operation: &'static str,
        f: impl FnOnce(&mut MockContainer, &mut Vec<ControlCall>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock();
        let MockState {
            containers, calls, ..
        } = &mut *state;
        let container = containers
            .get_mut(&ctid)
            .ok_or_else(|| SnapmoxError::control(ctid, operation, "no such container"))?;
        f(container, calls)
    }
}

#[async_trait]
impl ControlInterface for MockControl {
    async fn list_containers(&self) -> Result<Vec<u32>> {
        let state = self.lock();
        if state.list_fails {
            return Err(SnapmoxError::ListError("mock: manager unavailable".to_string()));
        }
        Ok(state.containers.keys().copied().collect())
    }

    async fn get_config(&self, ctid: u32) -> Result<String> {
        self.with_ct(ctid, "config", |c, _| Ok(c.config.clone()))
    }

    async fn get_status(&self, ctid: u32) -> Result<String> {
        self.with_ct(ctid, "status", |c, _| Ok(c.status.clone()))
    }

    async fn list_snapshots(&self, ctid: u32) -> Result<Vec<String>> {
        self.with_ct(ctid, "listsnapshot", |c, _| {
            let mut lines = c.snapshot_lines.clone();
            lines.push("`-> current You are here!".to_string());
            Ok(lines)
        })
    }

    async fn create_snapshot(&self, ctid: u32, tag: &str, description: &str) -> Result<()> {
        self.with_ct(ctid, "snapshot", |c, calls| {
            calls.push(ControlCall::CreateSnapshot {
                ctid,
                tag: tag.to_string(),
            });
            if c.fail_create {
                return Err(SnapmoxError::control(ctid, "snapshot", "mock: snapshot failed"));
            }
            if c.snapshot_lines.iter().any(|l| line_tag(l) == Some(tag)) {
                return Err(SnapmoxError::control(ctid, "snapshot", "snapshot name already exists"));
            }
            c.snapshot_lines.push(snapshot_line(tag, description));
            Ok(())
        })
    }

    async fn delete_snapshot(&self, ctid: u32, tag: &str) -> Result<()> {
        self.with_ct(ctid, "delsnapshot", |c, calls| {
            calls.push(ControlCall::DeleteSnapshot {
                ctid,
                tag: tag.to_string(),
            });
            if c.fail_delete.contains(tag) {
                return Err(SnapmoxError::control(ctid, "delsnapshot", "mock: snapshot is locked"));
            }
            let before = c.snapshot_lines.len();
            c.snapshot_lines.retain(|l| line_tag(l) != Some(tag));
            if c.snapshot_lines.len() == before {
                return Err(SnapmoxError::control(ctid, "delsnapshot", "snapshot does not exist"));
            }
            Ok(())
        })
    }

    async fn rollback(&self, ctid: u32, tag: &str, autostart: bool) -> Result<()> {
        self.with_ct(ctid, "rollback", |c, calls| {
            calls.push(ControlCall::Rollback {
                ctid,
                tag: tag.to_string(),
                autostart,
            });
            if c.fail_rollback {
                return Err(SnapmoxError::control(ctid, "rollback", "mock: rollback failed"));
            }
            if autostart {
                c.status = "status: running\n".to_string();
            }
            Ok(())
        })
    }

    async fn exec(&self, ctid: u32, command: &str, timeout: Duration) -> Result<ExecOutput> {
        self.with_ct(ctid, "exec", |c, calls| {
            calls.push(ControlCall::Exec {
                ctid,
                command: command.to_string(),
            });
            match &c.exec {
                MockExec::Succeed(output) => Ok(ExecOutput {
                    output: output.clone(),
                    exit_code: Some(0),
                }),
                MockExec::Exit(code, output) => Ok(ExecOutput {
                    output: output.clone(),
                    exit_code: Some(*code),
                }),
                MockExec::Timeout => Err(SnapmoxError::Timeout {
                    ctid,
                    seconds: timeout.as_secs(),
                }),
                MockExec::Broken => Err(SnapmoxError::control(
                    ctid,
                    "exec",
                    "mock: exec transport failed",
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_pct_text() {
        let mock = MockControl::new().with_container(
            100,
            MockContainer::running("alpine").with_snapshot("snapshot-daily-20240101_030000"),
        );
        assert_eq!(mock.list_containers().await.unwrap(), vec![100]);
        assert!(mock.get_config(100).await.unwrap().contains("ostype: alpine"));
        assert_eq!(mock.get_status(100).await.unwrap().trim(), "status: running");

        let lines = mock.list_snapshots(100).await.unwrap();
        assert_eq!(
            lines[0],
            "`-> snapshot-daily-20240101_030000 2024-01-01 03:00:00 Managed by Snapmox"
        );
        assert!(lines[1].contains("current"));
    }

    #[tokio::test]
    async fn test_records_writes() {
        let mock = MockControl::new().with_container(100, MockContainer::running("debian"));
        mock.create_snapshot(100, "snapshot-daily-20240101_030000", "d")
            .await
            .unwrap();
        assert_eq!(mock.snapshot_tags(100), vec!["snapshot-daily-20240101_030000"]);

        // duplicate names are refused like pct does
        assert!(mock
            .create_snapshot(100, "snapshot-daily-20240101_030000", "d")
            .await
            .is_err());

        mock.delete_snapshot(100, "snapshot-daily-20240101_030000")
            .await
            .unwrap();
        assert!(mock.snapshot_tags(100).is_empty());
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_container() {
        let mock = MockControl::new();
        assert!(mock.get_config(999).await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let mock = MockControl::new().unavailable();
        assert!(matches!(
            mock.list_containers().await,
            Err(SnapmoxError::ListError(_))
        ));
    }
}
