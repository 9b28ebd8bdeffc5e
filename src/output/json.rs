//! JSON output formatting

use crate::container::Container;
use crate::engine::RunReport;
use serde_json::{json, Value};

pub fn format_report_json(report: &RunReport) -> String {
    let mut data = serde_json::to_value(report).unwrap_or(json!(null));
    if let Value::Object(ref mut map) = data {
        map.insert("failures".to_string(), json!(report.failures()));
    }
    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_inventory_json(containers: &[Container]) -> String {
    let data = json!({ "containers": containers });
    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{sample_config, Cadence, ContainerState, OsType, Snapshot};
    use crate::engine::ContainerReport;
    use crate::policy::{SkipReason, UpdateOutcome};
    use chrono::NaiveDate;

    #[test]
    fn test_report_json_shape() {
        let report = RunReport {
            started: NaiveDate::from_ymd_opt(2024, 5, 8)
                .unwrap()
                .and_hms_opt(3, 0, 0)
                .unwrap(),
            elapsed_secs: 1.5,
            containers: vec![
                ContainerReport {
                    ctid: 101,
                    hostname: "web".to_string(),
                    snapshot: None,
                    pruned: None,
                    update: Some(UpdateOutcome::skipped(SkipReason::NotUpgradeSafe)),
                },
                ContainerReport {
                    ctid: 102,
                    hostname: "db".to_string(),
                    snapshot: None,
                    pruned: None,
                    update: Some(UpdateOutcome::Failed {
                        error: "exit 1".to_string(),
                    }),
                },
            ],
        };

        let value: Value = serde_json::from_str(&format_report_json(&report)).unwrap();
        assert_eq!(value["failures"], 1);
        assert_eq!(value["containers"][0]["update"]["outcome"], "skipped");
        assert_eq!(value["containers"][0]["update"]["reason"]["reason"], "not_upgrade_safe");
        assert_eq!(value["containers"][1]["update"]["error"], "exit 1");
    }

    #[test]
    fn test_inventory_json_includes_snapshots() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 7)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap();
        let container = Container::new(
            100,
            sample_config(OsType::Debian),
            ContainerState::Running,
            vec![Snapshot::new(Cadence::Daily, at)],
        );

        let value: Value = serde_json::from_str(&format_inventory_json(&[container])).unwrap();
        let ct = &value["containers"][0];
        assert_eq!(ct["id"], 100);
        assert_eq!(ct["state"], "running");
        assert_eq!(ct["snapshots"][0]["tag"], "snapshot-daily-20240507_030000");
    }
}
