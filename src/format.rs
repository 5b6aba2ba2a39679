//! Capture report output

use std::time::Duration;

use colored::Colorize;

use crate::capture::{BoundingBox, StructureSaveRequest, namespaced};

/// Summary of a finished capture run
pub struct CaptureReport {
    pub request: StructureSaveRequest,
    pub bounds: BoundingBox,
    pub commands_sent: usize,
    pub elapsed: Duration,
}

/// Print the report as human-readable colored output
pub fn print_pretty(report: &CaptureReport) {
    let dimensions = &report.request.dimensions;
    println!();
    println!(
        "{} Structure saved as {}",
        "✓".green().bold(),
        namespaced(&report.request.name).cyan()
    );
    println!(
        "  bounds    {} to {}",
        report.bounds.min, report.bounds.max
    );
    println!(
        "  size      {}x{}x{}",
        dimensions.width, dimensions.height, dimensions.depth
    );
    println!("  anchor    {}", report.request.anchor_pos);
    println!("  offset    {}", report.request.offset);
    println!("  commands  {}", report.commands_sent);
    println!("  elapsed   {:.2}s", report.elapsed.as_secs_f64());
}

/// Print the report as JSON to stdout
pub fn print_json(report: &CaptureReport) {
    let output = serde_json::json!({
        "structure": {
            "name": report.request.name,
            "saved_as": namespaced(&report.request.name),
        },
        "bounds": {
            "min": report.bounds.min,
            "max": report.bounds.max,
        },
        "dimensions": report.request.dimensions,
        "anchor": report.request.anchor_pos,
        "offset": report.request.offset,
        "commands_sent": report.commands_sent,
        "duration_secs": report.elapsed.as_secs_f64(),
    });

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}
