use looparc_config::ArchiveConfig;
use looparc_fsops::{ArchiveService, EvictionPlan, Inventory};

use crate::cli::InventoryArgs;
use crate::error::{CliError, CliResult};
use crate::output::render_inventory;

pub(crate) fn handle_inventory(config: ArchiveConfig, args: &InventoryArgs) -> CliResult<()> {
    let (inventory, plan) = collect(config, args.source)?;
    render_inventory(&inventory, &plan, args.format)
}

/// Read-only: scans the destination (or one path source) and plans eviction against the budget.
fn collect(config: ArchiveConfig, source: Option<usize>) -> CliResult<(Inventory, EvictionPlan)> {
    let service = ArchiveService::new(config).map_err(|err| CliError::from_archive(&err))?;
    let inventory = match source {
        Some(index) => service.source_inventory(index),
        None => service.destination_inventory(),
    }
    .map_err(|err| CliError::from_archive(&err))?;
    let plan = service.eviction_plan(&inventory);
    Ok((inventory, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use looparc_config::{ByteSize, LoggingSettings, SourceSpec};
    use looparc_test_support::fixtures::{entry_names, temp_dir, write_file};
    use std::fs;

    #[test]
    fn inventory_plans_without_deleting() -> anyhow::Result<()> {
        let temp = temp_dir("cli-inventory")?;
        let source = temp.path().join("inbox");
        let destination = temp.path().join("archive");
        fs::create_dir(&source)?;
        fs::create_dir(&destination)?;
        write_file(&destination, "x", 60, 1)?;
        write_file(&destination, "y", 50, 2)?;
        write_file(&source, "new", 5, 3)?;
        let config = ArchiveConfig {
            sources: vec![SourceSpec::path(&source)],
            destination: destination.clone(),
            capacity_budget: ByteSize(80),
            logging: LoggingSettings::default(),
        };

        let (inventory, plan) = collect(config.clone(), None)?;
        assert_eq!(inventory.total_bytes(), 110);
        assert_eq!(plan.candidates.len(), 1);
        assert_eq!(plan.candidates[0].identifier, "x");
        assert_eq!(entry_names(&destination)?, vec!["x", "y"]);

        let (inventory, plan) = collect(config.clone(), Some(0))?;
        assert_eq!(inventory.items.len(), 1);
        assert!(plan.is_empty());

        let err = collect(config, Some(3))
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected bad index"))?;
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }
}
