//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::anyhow;
use looparc_config::{ArchiveConfig, SourceLocation};
use looparc_fsops::{EvictionPlan, Inventory, Item, RunReport, ScanWarning, SourceStatus};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

pub(crate) fn render_run_report(report: &RunReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Table => print!("{}", run_report_table(report)),
    }
    Ok(())
}

pub(crate) fn render_inventory(
    inventory: &Inventory,
    plan: &EvictionPlan,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(&InventoryView::new(inventory, plan))?),
        OutputFormat::Table => print!("{}", inventory_table(inventory, plan)),
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn run_report_table(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run: {} (dry run: {})", report.run_id, report.dry_run);
    let _ = writeln!(out, "destination: {}", report.destination.display());
    for name in &report.recovered_partials {
        let _ = writeln!(out, "recovered partial: {name}");
    }

    for source in &report.sources {
        let status = match &source.status {
            SourceStatus::Processed => "processed".to_string(),
            SourceStatus::Skipped { reason } => format!("skipped ({reason})"),
            SourceStatus::Failed { reason } => format!("failed ({reason})"),
        };
        let _ = writeln!(out, "\nsource {}: {status}", source.source);
        let _ = writeln!(
            out,
            "  moved {} item(s), {}",
            source.items_moved(),
            format_bytes(source.bytes_moved())
        );
        for moved in &source.planned_moves {
            let _ = writeln!(
                out,
                "  would move {} -> {} ({})",
                moved.identifier,
                moved.destination_name,
                format_bytes(moved.size_bytes)
            );
        }
        for purged in &source.purged {
            let _ = writeln!(out, "  purged {} ({})", purged.identifier, format_bytes(purged.size_bytes));
        }
        for purged in &source.planned_purges {
            let _ = writeln!(
                out,
                "  would purge {} ({})",
                purged.identifier,
                format_bytes(purged.size_bytes)
            );
        }
        for failure in &source.failures {
            let _ = writeln!(out, "  {failure}");
        }
        write_warnings(&mut out, &source.warnings);
    }

    let eviction = &report.eviction;
    let _ = writeln!(
        out,
        "\neviction: usage {} -> {} (budget {})",
        format_bytes(eviction.usage_before),
        format_bytes(eviction.usage_after),
        format_bytes(eviction.budget)
    );
    if let Some(error) = &eviction.error {
        let _ = writeln!(out, "  skipped: {error}");
    }
    for item in &eviction.evicted {
        let _ = writeln!(out, "  evicted {} ({})", item.identifier, format_bytes(item.size_bytes));
    }
    for item in &eviction.planned {
        let _ = writeln!(
            out,
            "  would evict {} ({})",
            item.identifier,
            format_bytes(item.size_bytes)
        );
    }
    for failure in &eviction.failures {
        let _ = writeln!(out, "  {failure}");
    }
    write_warnings(&mut out, &eviction.warnings);
    out
}

fn write_warnings(out: &mut String, warnings: &[ScanWarning]) {
    for warning in warnings {
        let _ = writeln!(out, "  skipped entry {}: {}", warning.path.display(), warning.reason);
    }
}

pub(crate) fn inventory_table(inventory: &Inventory, plan: &EvictionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<25} {:>12} {:<9} ITEM", "MODIFIED", "SIZE", "EVICT");
    for item in inventory.oldest_first() {
        let evict = if is_candidate(plan, item) { "yes" } else { "" };
        let _ = writeln!(
            out,
            "{:<25} {:>12} {:<9} {}",
            item.age_marker.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            format_bytes(item.size_bytes),
            evict,
            item.identifier
        );
    }
    write_warnings(&mut out, &inventory.warnings);
    let _ = writeln!(
        out,
        "total {} in {} item(s); budget {}; after eviction {}",
        format_bytes(plan.usage_before),
        inventory.items.len(),
        format_bytes(plan.budget),
        format_bytes(plan.projected_usage)
    );
    out
}

fn is_candidate(plan: &EvictionPlan, item: &Item) -> bool {
    plan.candidates
        .iter()
        .any(|candidate| candidate.identifier == item.identifier)
}

#[derive(Serialize)]
struct InventoryView<'a> {
    location: &'a Path,
    total_bytes: u64,
    budget: u64,
    projected_usage: u64,
    items: Vec<&'a Item>,
    eviction_candidates: Vec<&'a str>,
    warnings: &'a [ScanWarning],
}

impl<'a> InventoryView<'a> {
    fn new(inventory: &'a Inventory, plan: &'a EvictionPlan) -> Self {
        Self {
            location: &inventory.location,
            total_bytes: plan.usage_before,
            budget: plan.budget,
            projected_usage: plan.projected_usage,
            items: inventory.oldest_first(),
            eviction_candidates: plan
                .candidates
                .iter()
                .map(|item| item.identifier.as_str())
                .collect(),
            warnings: &inventory.warnings,
        }
    }
}

pub(crate) fn check_summary(config_path: &Path, config: &ArchiveConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "configuration ok: {}", config_path.display());
    let _ = writeln!(out, "destination: {}", config.destination.display());
    let budget = config.capacity_budget.bytes();
    let _ = writeln!(out, "capacity budget: {} ({budget} bytes)", format_bytes(budget));
    for (index, source) in config.sources.iter().enumerate() {
        let kind = match &source.location {
            SourceLocation::Path(_) => "path",
            SourceLocation::Device(_) => "device",
        };
        let _ = writeln!(out, "source {index} ({kind}): {}", source.label());
        let _ = writeln!(out, "  patterns: {}", source.patterns.join(", "));
        if !source.purge_patterns.is_empty() {
            let _ = writeln!(out, "  purge: {}", source.purge_patterns.join(", "));
        }
    }
    out
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;
    const TIB: f64 = GIB * 1024.0;
    let value = bytes_to_f64(bytes);
    if value >= TIB {
        format!("{:.2} TiB", value / TIB)
    } else if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
