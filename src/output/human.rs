//! Human-readable output formatting

use crate::container::Container;
use crate::engine::{ContainerReport, PruneReport, RunReport, SnapshotReport};
use crate::policy::SnapshotDecision;
use bytesize::ByteSize;

pub fn format_report_human(report: &RunReport) -> String {
    let title = format!(
        "Maintenance run {} ({:.1}s)",
        report.started.format("%Y-%m-%d %H:%M:%S"),
        report.elapsed_secs
    );
    let mut output = format!("{}\n{}\n", title, "-".repeat(title.len()));

    if report.containers.is_empty() {
        output.push_str("No containers found\n");
        return output;
    }

    for ct in &report.containers {
        output.push('\n');
        output.push_str(&format_container_report(ct));
    }

    output.push_str(&format!(
        "\n{} containers, {} with failures\n",
        report.containers.len(),
        report.failures()
    ));
    output
}

fn format_container_report(ct: &ContainerReport) -> String {
    let mut output = format!("CT {} ({})\n", ct.ctid, ct.hostname);
    if let Some(ref snapshot) = ct.snapshot {
        output.push_str(&format!("  Snapshot: {}\n", describe_snapshot(snapshot)));
    }
    if let Some(ref pruned) = ct.pruned {
        output.push_str(&format!("  Pruned:   {}\n", describe_prune(pruned)));
    }
    if let Some(ref update) = ct.update {
        output.push_str(&format!("  Update:   {}\n", update));
    }
    output
}

fn describe_snapshot(report: &SnapshotReport) -> String {
    if let Some(ref error) = report.error {
        return format!("failed: {}", error);
    }
    match (report.decision, &report.created) {
        (SnapshotDecision::Create(_), Some(tag)) => format!("created {}", tag),
        (SnapshotDecision::Create(cadence), None) => format!("{} snapshot not created", cadence),
        (SnapshotDecision::AlreadyTaken, _) => "already taken today".to_string(),
        (SnapshotDecision::Excluded, _) => "excluded".to_string(),
        (SnapshotDecision::Disabled, _) => "all tiers disabled".to_string(),
    }
}

fn describe_prune(report: &PruneReport) -> String {
    if report.deleted.is_empty() && report.failed.is_empty() {
        return "nothing to remove".to_string();
    }
    let mut output = format!("{} removed", report.deleted.len());
    if !report.failed.is_empty() {
        let tags: Vec<&str> = report.failed.iter().map(|(tag, _)| tag.as_str()).collect();
        output.push_str(&format!(", {} failed ({})", report.failed.len(), tags.join(", ")));
    }
    output
}

pub fn format_inventory_human(containers: &[Container]) -> String {
    if containers.is_empty() {
        return "No containers found".to_string();
    }

    let mut output = String::from("Containers\n----------\n");
    output.push_str(&format!(
        "{:<6} {:<20} {:<10} {:<8} {:>5} {:>12} {:>5}  {:<31}\n",
        "CTID", "HOSTNAME", "OS", "STATE", "CORES", "MEMORY", "SNAPS", "NEWEST"
    ));
    output.push_str(&"-".repeat(106));
    output.push('\n');
    for ct in containers {
        output.push_str(&format!(
            "{:<6} {:<20} {:<10} {:<8} {:>5} {:>12} {:>5}  {:<31}\n",
            ct.id,
            truncate(&ct.config.hostname, 20),
            ct.config.os_type,
            ct.state,
            ct.config.cores,
            ByteSize::mib(ct.config.memory_mb).to_string_as(true),
            ct.snapshots().len(),
            ct.newest_snapshot().map(|s| s.tag.as_str()).unwrap_or("-")
        ));
    }
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
