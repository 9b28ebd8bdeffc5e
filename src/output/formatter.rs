//! Output formatting

use crate::container::Container;
use crate::engine::RunReport;
use crate::output::human::{format_inventory_human, format_report_human};
use crate::output::json::{format_inventory_json, format_report_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

pub fn format_report(report: &RunReport, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_report_human(report),
        OutputFormat::Json => format_report_json(report),
    }
}

pub fn format_inventory(containers: &[Container], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_inventory_human(containers),
        OutputFormat::Json => format_inventory_json(containers),
    }
}
