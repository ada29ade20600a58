use std::path::Path;

use looparc_config::ArchiveConfig;
use looparc_fsops::ArchiveService;

use crate::error::{CliError, CliResult};
use crate::output::check_summary;

pub(crate) fn handle_check(config_path: &Path, config: &ArchiveConfig) -> CliResult<()> {
    verify(config)?;
    print!("{}", check_summary(config_path, config));
    Ok(())
}

/// Loading already validated the document; this also compiles every glob.
fn verify(config: &ArchiveConfig) -> CliResult<()> {
    ArchiveService::new(config.clone())
        .map(drop)
        .map_err(|err| CliError::from_archive(&err))
}
