//! Container control backends
//!
//! Every read or write of container state goes through [`ControlInterface`].
//! Implementations return raw manager output; turning it into typed values is
//! the job of [`crate::parser`] and the inventory builder.

pub mod dry_run;
pub mod mock;
pub mod pct;

pub use dry_run::DryRunControl;
pub use mock::{ControlCall, MockContainer, MockControl, MockExec};
pub use pct::PctControl;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of a command run inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// stdout followed by stderr
    pub output: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Primitives the maintenance run needs from the container manager.
///
/// Implementations may be called for different containers concurrently but
/// never run two commands for the same container at once.
#[async_trait]
pub trait ControlInterface: Send + Sync {
    /// Ids of every container on the host
    async fn list_containers(&self) -> Result<Vec<u32>>;

    /// Raw `key: value` configuration text
    async fn get_config(&self, ctid: u32) -> Result<String>;

    /// Raw status text, e.g. `status: running`
    async fn get_status(&self, ctid: u32) -> Result<String>;

    /// Raw snapshot tree lines, one per snapshot
    async fn list_snapshots(&self, ctid: u32) -> Result<Vec<String>>;

    async fn create_snapshot(&self, ctid: u32, tag: &str, description: &str) -> Result<()>;

    async fn delete_snapshot(&self, ctid: u32, tag: &str) -> Result<()>;

    /// Restore `tag`, starting the container afterwards when `autostart` is set
    async fn rollback(&self, ctid: u32, tag: &str, autostart: bool) -> Result<()>;

    /// Run `command` through `sh -c` inside the container.
    ///
    /// Fails with [`crate::SnapmoxError::Timeout`] once `timeout` elapses; the
    /// command is not left running.
    async fn exec(&self, ctid: u32, command: &str, timeout: Duration) -> Result<ExecOutput>;
}
