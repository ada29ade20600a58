//! End-to-end archival passes over real temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use looparc_config::{ArchiveConfig, ByteSize, LoggingSettings, SourceSpec};
use looparc_fsops::{
    ArchiveError, ArchiveService, DryRun, FailureKind, RunOptions, STAGING_PREFIX, TransferMethod,
};
use looparc_test_support::fixtures::{entry_names, epoch_secs, set_mtime, temp_dir, write_file};
use tempfile::TempDir;

struct Layout {
    _root: TempDir,
    source: PathBuf,
    destination: PathBuf,
}

fn layout() -> Result<Layout> {
    let root = temp_dir("archive-pass")?;
    let source = root.path().join("inbox");
    let destination = root.path().join("archive");
    fs::create_dir(&source)?;
    fs::create_dir(&destination)?;
    Ok(Layout {
        _root: root,
        source,
        destination,
    })
}

fn service(sources: Vec<SourceSpec>, destination: &Path, budget: u64) -> Result<ArchiveService> {
    Ok(ArchiveService::new(ArchiveConfig {
        sources,
        destination: destination.to_path_buf(),
        capacity_budget: ByteSize(budget),
        logging: LoggingSettings::default(),
    })?)
}

#[test]
fn drains_source_into_empty_destination() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "A", 10, 1)?;
    write_file(&layout.source, "B", 5, 2)?;

    let report = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        100,
    )?
    .run()?;

    let moved: Vec<_> = report.sources[0]
        .moved
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(moved, vec!["A", "B"]);
    assert!(
        report.sources[0]
            .moved
            .iter()
            .all(|item| item.method == TransferMethod::Rename)
    );
    assert_eq!(report.bytes_moved(), 15);
    assert!(entry_names(&layout.source)?.is_empty());
    assert_eq!(entry_names(&layout.destination)?, vec!["A", "B"]);
    assert!(report.eviction.evicted.is_empty());
    assert_eq!(report.eviction.usage_after, 15);
    assert!(!report.has_failures());
    Ok(())
}

#[test]
fn second_pass_without_changes_is_a_no_op() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "A", 10, 1)?;
    write_file(&layout.destination, "older", 30, 0)?;
    let service = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        20,
    )?;

    let first = service.run()?;
    assert_eq!(first.items_moved(), 1);
    assert_eq!(first.eviction.items_evicted(), 1);

    let second = service.run()?;
    assert_eq!(second.items_moved(), 0);
    assert_eq!(second.eviction.items_evicted(), 0);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(entry_names(&layout.destination)?, vec!["A"]);
    Ok(())
}

#[test]
fn eviction_breaks_age_ties_by_identifier() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.destination, "X", 60, 1)?;
    write_file(&layout.destination, "Y", 50, 2)?;
    write_file(&layout.destination, "Z", 10, 1)?;

    let report = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        40,
    )?
    .run()?;

    let order: Vec<_> = report
        .eviction
        .evicted
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(order, vec!["X", "Z", "Y"]);
    assert_eq!(report.eviction.usage_after, 0);
    assert!(entry_names(&layout.destination)?.is_empty());
    Ok(())
}

#[test]
fn collision_is_reported_and_processing_continues() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "dup", 4, 1)?;
    write_file(&layout.source, "fresh", 2, 2)?;
    write_file(&layout.destination, "dup", 9, 1)?;

    let report = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        100,
    )?
    .run()?;

    let source = &report.sources[0];
    assert_eq!(source.failures.len(), 1);
    assert_eq!(source.failures[0].identifier, "dup");
    assert_eq!(source.failures[0].kind, FailureKind::NameCollision);
    assert_eq!(source.items_moved(), 1);
    assert_eq!(fs::read(layout.source.join("dup"))?.len(), 4);
    assert_eq!(fs::read(layout.destination.join("dup"))?.len(), 9);
    assert!(report.has_failures());
    Ok(())
}

#[test]
fn dry_run_leaves_every_location_untouched() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "A", 10, 1)?;
    write_file(&layout.destination, "old", 95, 0)?;
    let stale = layout.destination.join(format!("{STAGING_PREFIX}half"));
    fs::write(&stale, b"half")?;

    let report = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        100,
    )?
    .with_options(RunOptions {
        dry_run: DryRun::All,
    })
    .run()?;

    assert_eq!(report.dry_run, DryRun::All);
    assert_eq!(report.sources[0].planned_moves.len(), 1);
    assert_eq!(report.items_moved(), 0);
    assert_eq!(report.eviction.planned.len(), 1);
    assert_eq!(report.eviction.planned[0].identifier, "old");
    assert!(report.recovered_partials.is_empty());
    assert_eq!(entry_names(&layout.source)?, vec!["A"]);
    assert_eq!(
        entry_names(&layout.destination)?,
        vec![format!("{STAGING_PREFIX}half"), "old".to_string()]
    );
    Ok(())
}

#[test]
fn stale_staging_entries_are_removed_and_never_counted() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.destination, "kept", 10, 1)?;
    write_file(
        &layout.destination,
        &format!("{STAGING_PREFIX}album/part.jpg"),
        500,
        1,
    )?;

    let service = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        20,
    )?;
    let before = service.destination_inventory()?;
    assert_eq!(before.total_bytes(), 10);

    let report = service.run()?;
    assert_eq!(
        report.recovered_partials,
        vec![format!("{STAGING_PREFIX}album")]
    );
    assert_eq!(report.eviction.usage_before, 10);
    assert!(report.eviction.evicted.is_empty());
    assert_eq!(entry_names(&layout.destination)?, vec!["kept"]);
    Ok(())
}

#[test]
fn nested_patterns_flatten_into_destination() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "DCIM/100/clip1.mp4", 3, 1)?;
    write_file(&layout.source, "DCIM/101/clip2.mp4", 4, 2)?;
    write_file(&layout.source, "DCIM/101/thumb.jpg", 1, 2)?;

    let mut spec = SourceSpec::path(&layout.source);
    spec.patterns = vec!["DCIM/*/*.mp4".to_string()];
    let report = service(vec![spec], &layout.destination, 100)?.run()?;

    assert_eq!(report.items_moved(), 2);
    assert_eq!(
        entry_names(&layout.destination)?,
        vec!["clip1.mp4", "clip2.mp4"]
    );
    assert_eq!(
        entry_names(&layout.source.join("DCIM/101"))?,
        vec!["thumb.jpg"]
    );
    assert_eq!(
        fs::metadata(layout.destination.join("clip2.mp4"))?.modified()?,
        epoch_secs(2)
    );
    Ok(())
}

#[test]
fn directories_move_and_evict_as_one_item() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "shoot/a.raw", 30, 5)?;
    write_file(&layout.source, "shoot/b.raw", 30, 5)?;
    set_mtime(&layout.source.join("shoot"), 5)?;
    write_file(&layout.destination, "older", 20, 10)?;

    let report = service(
        vec![SourceSpec::path(&layout.source)],
        &layout.destination,
        30,
    )?
    .run()?;

    assert_eq!(report.sources[0].moved[0].size_bytes, 60);
    let evicted: Vec<_> = report
        .eviction
        .evicted
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(evicted, vec!["shoot"]);
    assert_eq!(entry_names(&layout.destination)?, vec!["older"]);
    Ok(())
}

#[test]
fn missing_destination_aborts_before_touching_sources() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "A", 10, 1)?;
    let missing = layout.destination.join("nope");

    let result = service(vec![SourceSpec::path(&layout.source)], &missing, 100)?.run();
    assert!(matches!(
        result,
        Err(ArchiveError::DestinationUnavailable {
            reason: "missing",
            ..
        })
    ));
    assert_eq!(entry_names(&layout.source)?, vec!["A"]);
    Ok(())
}

#[test]
fn unreadable_source_fails_only_that_source() -> Result<()> {
    let layout = layout()?;
    write_file(&layout.source, "A", 10, 1)?;
    let gone = layout.source.join("gone");

    let report = service(
        vec![SourceSpec::path(&gone), SourceSpec::path(&layout.source)],
        &layout.destination,
        100,
    )?
    .run()?;

    assert!(report.sources[0].has_failures());
    assert_eq!(report.sources[1].items_moved(), 1);
    let json = serde_json::to_value(&report)?;
    assert_eq!(json["sources"][0]["status"]["state"], "failed");
    assert_eq!(json["dry_run"], "off");
    Ok(())
}
