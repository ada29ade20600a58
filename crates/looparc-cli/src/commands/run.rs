use looparc_config::ArchiveConfig;
use looparc_fsops::{ArchiveService, RunOptions, RunReport};
use tracing::info;

use crate::cli::RunArgs;
use crate::error::{CliError, CliResult};
use crate::output::render_run_report;

pub(crate) fn handle_run(config: ArchiveConfig, args: &RunArgs) -> CliResult<()> {
    let report = run_pass(config, args)?;
    render_run_report(&report, args.format)?;
    outcome(&report)
}

fn run_pass(config: ArchiveConfig, args: &RunArgs) -> CliResult<RunReport> {
    let options = RunOptions {
        dry_run: args.dry_run_mode(),
    };
    info!(dry_run = %options.dry_run, "starting archive pass");
    ArchiveService::new(config)
        .map_err(|err| CliError::from_archive(&err))?
        .with_options(options)
        .run()
        .map_err(|err| CliError::from_archive(&err))
}

fn outcome(report: &RunReport) -> CliResult<()> {
    let failed_sources = report
        .sources
        .iter()
        .filter(|source| matches!(source.status, looparc_fsops::SourceStatus::Failed { .. }))
        .count();
    let eviction_error = usize::from(report.eviction.error.is_some());
    let failures = report.failures().count() + failed_sources + eviction_error;
    if failures == 0 {
        Ok(())
    } else {
        Err(CliError::Incomplete(failures))
    }
}
