//! Inventory builder

use tracing::{debug, info, warn};

use crate::container::Container;
use crate::control::ControlInterface;
use crate::error::Result;
use crate::parser::{parse_config, parse_snapshot_line, parse_status, SnapshotLine};

/// Load every container the manager knows about.
///
/// Only a failure to list containers is fatal; a container whose data cannot
/// be read or parsed is logged and left out.
pub async fn build_inventory(control: &dyn ControlInterface) -> Result<Vec<Container>> {
    let ids = control.list_containers().await?;
    let mut containers = Vec::with_capacity(ids.len());

    for ctid in ids {
        match load_container(control, ctid).await {
            Ok(container) => {
                info!(
                    ct = ctid,
                    "Parsed information for CT {} ({} managed snapshots)",
                    ctid,
                    container.snapshots().len()
                );
                containers.push(container);
            }
            Err(e) => warn!(ct = ctid, "Skipping CT {}: {}", ctid, e),
        }
    }
    Ok(containers)
}

/// Fetch and parse a single container
pub async fn load_container(control: &dyn ControlInterface, ctid: u32) -> Result<Container> {
    let config = parse_config(&control.get_config(ctid).await?)?;
    let state = parse_status(&control.get_status(ctid).await?)?;

    let mut snapshots = Vec::new();
    for line in control.list_snapshots(ctid).await? {
        match parse_snapshot_line(&line) {
            Ok(SnapshotLine::Managed(snapshot)) => snapshots.push(snapshot),
            Ok(SnapshotLine::Unmanaged(name)) => {
                warn!(ct = ctid, "Found unmanaged snapshot {} for CT {}. Ignoring", name, ctid)
            }
            Ok(SnapshotLine::Current) => {}
            Err(e) => warn!(ct = ctid, "Ignoring snapshot line of CT {}: {}", ctid, e),
        }
    }
    debug!(ct = ctid, state = %state, "loaded {} snapshots", snapshots.len());

    Ok(Container::new(ctid, config, state, snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Cadence, ContainerState, OsType};
    use crate::control::{MockContainer, MockControl};
    use crate::error::SnapmoxError;

    #[tokio::test]
    async fn test_builds_sorted_containers() {
        let control = MockControl::new()
            .with_container(
                100,
                MockContainer::running("debian")
                    .with_snapshot("snapshot-daily-20240505_030000")
                    .with_snapshot("snapshot-weekly-20240506_030000")
                    .with_snapshot("snapshot-daily-20240507_030000"),
            )
            .with_container(101, MockContainer::stopped("alpine"));

        let containers = build_inventory(&control).await.unwrap();
        assert_eq!(containers.len(), 2);

        let first = &containers[0];
        assert_eq!(first.id, 100);
        assert_eq!(first.config.os_type, OsType::Debian);
        assert_eq!(first.state, ContainerState::Running);
        let tags: Vec<_> = first.snapshots().iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "snapshot-daily-20240507_030000",
                "snapshot-weekly-20240506_030000",
                "snapshot-daily-20240505_030000",
            ]
        );
        assert_eq!(first.snapshots()[1].cadence, Cadence::Weekly);
        assert_eq!(containers[1].state, ContainerState::Stopped);
    }

    #[tokio::test]
    async fn test_unparseable_container_is_skipped() {
        let control = MockControl::new()
            .with_container(100, MockContainer::running("debian").with_config("garbage"))
            .with_container(101, MockContainer::new("debian", "exploded"))
            .with_container(102, MockContainer::running("debian"));

        let containers = build_inventory(&control).await.unwrap();
        let ids: Vec<u32> = containers.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![102]);
    }

    #[tokio::test]
    async fn test_unmanaged_snapshots_are_excluded() {
        let control = MockControl::new().with_container(
            100,
            MockContainer::running("debian")
                .with_snapshot_line("`-> before-upgrade 2024-04-30 12:00:00 manual")
                .with_snapshot_line("`-> snapshot-daily-garbage 2024-04-30 12:00:00 looks managed")
                .with_snapshot("snapshot-daily-20240507_030000"),
        );

        let containers = build_inventory(&control).await.unwrap();
        let tags: Vec<_> = containers[0].snapshots().iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["snapshot-daily-20240507_030000"]);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let control = MockControl::new().unavailable();
        assert!(matches!(
            build_inventory(&control).await,
            Err(SnapmoxError::ListError(_))
        ));
    }
}
