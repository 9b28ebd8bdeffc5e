//! Dry-run wrapper: reads pass through, writes are only logged

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{ControlInterface, ExecOutput};
use crate::error::Result;

/// Wraps a backend so that nothing on the host is changed
#[derive(Debug, Clone)]
pub struct DryRunControl<C> {
    inner: C,
}

impl<C> DryRunControl<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C: ControlInterface> ControlInterface for DryRunControl<C> {
    async fn list_containers(&self) -> Result<Vec<u32>> {
        self.inner.list_containers().await
    }

    async fn get_config(&self, ctid: u32) -> Result<String> {
        self.inner.get_config(ctid).await
    }

    async fn get_status(&self, ctid: u32) -> Result<String> {
        self.inner.get_status(ctid).await
    }

    async fn list_snapshots(&self, ctid: u32) -> Result<Vec<String>> {
        self.inner.list_snapshots(ctid).await
    }

    async fn create_snapshot(&self, ctid: u32, tag: &str, _description: &str) -> Result<()> {
        info!(ct = ctid, "Would create snapshot {}", tag);
        Ok(())
    }

    async fn delete_snapshot(&self, ctid: u32, tag: &str) -> Result<()> {
        info!(ct = ctid, "Would delete snapshot {}", tag);
        Ok(())
    }

    async fn rollback(&self, ctid: u32, tag: &str, autostart: bool) -> Result<()> {
        info!(ct = ctid, autostart, "Would roll back to {}", tag);
        Ok(())
    }

    async fn exec(&self, ctid: u32, command: &str, _timeout: Duration) -> Result<ExecOutput> {
        info!(ct = ctid, "Would run: {}", command);
        Ok(ExecOutput {
            output: String::new(),
            exit_code: Some(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{MockContainer, MockControl};

    #[tokio::test]
    async fn test_writes_are_not_forwarded() {
        let mock = MockControl::new().with_container(100, MockContainer::running("debian"));
        let control = DryRunControl::new(mock);

        control
            .create_snapshot(100, "snapshot-daily-20240101_000000", "x")
            .await
            .unwrap();
        control.delete_snapshot(100, "snapshot-daily-20231231_000000").await.unwrap();
        control.rollback(100, "snapshot-daily-20231231_000000", true).await.unwrap();
        let out = control
            .exec(100, "apt update", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(out.success());

        // reads still reach the backend
        assert_eq!(control.list_containers().await.unwrap(), vec![100]);

        let mock = control.into_inner();
        assert!(mock.calls().is_empty());
        assert!(mock.snapshot_tags(100).is_empty());
    }
}
