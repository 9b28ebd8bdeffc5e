//! Control backend driving the Proxmox `pct` tool

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use super::{ControlInterface, ExecOutput};
use crate::error::{Result, SnapmoxError};
use crate::parser::parse_container_list;

pub const DEFAULT_PCT_BINARY: &str = "pct";

/// Runs `pct` subcommands on the local host
#[derive(Debug, Clone)]
pub struct PctControl {
    binary: PathBuf,
}

impl PctControl {
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_PCT_BINARY)
    }

    /// Use a different `pct` executable, e.g. a wrapper script
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `pct <args>` to completion, failing on a non-zero exit
    async fn run(&self, ctid: u32, operation: &'static str, args: &[&str]) -> Result<String> {
        debug!(ct = ctid, "running {} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SnapmoxError::control(ctid, operation, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SnapmoxError::control(
                ctid,
                operation,
                format!("{} ({})", stderr.trim(), output.status),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for PctControl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlInterface for PctControl {
    async fn list_containers(&self) -> Result<Vec<u32>> {
        let output = self
            .run(0, "list", &["list"])
            .await
            .map_err(|e| SnapmoxError::ListError(e.to_string()))?;

        let mut ids = Vec::new();
        for row in parse_container_list(&output) {
            match row {
                Ok(id) => ids.push(id),
                Err(e) => warn!("Skipping container list row: {}", e),
            }
        }
        Ok(ids)
    }

    async fn get_config(&self, ctid: u32) -> Result<String> {
        let id = ctid.to_string();
        self.run(ctid, "config", &["config", &id]).await
    }

    async fn get_status(&self, ctid: u32) -> Result<String> {
        let id = ctid.to_string();
        self.run(ctid, "status", &["status", &id]).await
    }

    async fn list_snapshots(&self, ctid: u32) -> Result<Vec<String>> {
        let id = ctid.to_string();
        let output = self.run(ctid, "listsnapshot", &["listsnapshot", &id]).await?;
        Ok(output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn create_snapshot(&self, ctid: u32, tag: &str, description: &str) -> Result<()> {
        let id = ctid.to_string();
        self.run(
            ctid,
            "snapshot",
            &["snapshot", &id, tag, "--description", description],
        )
        .await
        .map(|_| ())
    }

    async fn delete_snapshot(&self, ctid: u32, tag: &str) -> Result<()> {
        let id = ctid.to_string();
        self.run(ctid, "delsnapshot", &["delsnapshot", &id, tag])
            .await
            .map(|_| ())
    }

    async fn rollback(&self, ctid: u32, tag: &str, autostart: bool) -> Result<()> {
        let id = ctid.to_string();
        let start = if autostart { "1" } else { "0" };
        self.run(ctid, "rollback", &["rollback", &id, tag, "--start", start])
            .await
            .map(|_| ())
    }

    async fn exec(&self, ctid: u32, command: &str, timeout: Duration) -> Result<ExecOutput> {
        let id = ctid.to_string();
        let mut child = Command::new(&self.binary)
            .args(["exec", &id, "--", "sh", "-c", command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SnapmoxError::control(ctid, "exec", e.to_string()))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(SnapmoxError::control(ctid, "exec", "output pipes unavailable"));
        };
        let finished = async {
            let output = read_interleaved(stdout, stderr).await?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((output, status))
        };

        // on timeout the child is dropped here and killed
        let (output, status) = tokio::time::timeout(timeout, finished)
            .await
            .map_err(|_| SnapmoxError::Timeout {
                ctid,
                seconds: timeout.as_secs(),
            })?
            .map_err(|e| SnapmoxError::control(ctid, "exec", e.to_string()))?;

        Ok(ExecOutput {
            output: String::from_utf8_lossy(&output).into_owned(),
            exit_code: status.code(),
        })
    }
}

/// Drain both pipes into one buffer in the order chunks arrive
async fn read_interleaved(
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
) -> std::io::Result<Vec<u8>> {
    let mut combined = Vec::new();
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            n = stdout.read(&mut out_buf), if out_open => match n? {
                0 => out_open = false,
                n => combined.extend_from_slice(&out_buf[..n]),
            },
            n = stderr.read(&mut err_buf), if err_open => match n? {
                0 => err_open = false,
                n => combined.extend_from_slice(&err_buf[..n]),
            },
        }
    }
    Ok(combined)
}
