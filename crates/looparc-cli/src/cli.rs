//! Argument parsing, configuration loading, and command dispatch.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use looparc_config::{ArchiveConfig, LogFormatSetting, load_from_path};
use looparc_fsops::DryRun;
use looparc_telemetry::{CommandSpanGuard, LogFormat, LoggingConfig, init_logging};

use crate::commands::{handle_check, handle_inventory, handle_run};
use crate::error::{CliError, CliResult};

/// Parses arguments, loads the configuration, installs logging, and runs the
/// requested command. Returns the process exit code.
#[must_use]
pub fn run() -> i32 {
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

fn execute(cli: &Cli) -> CliResult<()> {
    let config_path = cli.config.clone().ok_or_else(|| {
        CliError::validation("configuration path is required (pass --config or set LOOPARC_CONFIG)")
    })?;
    let config = load_from_path(&config_path).map_err(|err| CliError::from_config(&err))?;

    init_logging(&logging_config(cli, &config)).map_err(CliError::failure)?;
    let _span = CommandSpanGuard::new(command_label(&cli.command));
    dispatch(&cli.command, &config_path, config)
}

fn dispatch(command: &Command, config_path: &Path, config: ArchiveConfig) -> CliResult<()> {
    match command {
        Command::Run(args) => handle_run(config, args),
        Command::Inventory(args) => handle_inventory(config, args),
        Command::Check => handle_check(config_path, &config),
    }
}

fn logging_config<'a>(cli: &'a Cli, config: &'a ArchiveConfig) -> LoggingConfig<'a> {
    let format = cli
        .log_format
        .map(LogFormatArg::format)
        .or_else(|| config.logging.format.map(log_format))
        .unwrap_or_else(LogFormat::infer);
    LoggingConfig {
        level: cli.log_level.as_deref().unwrap_or(&config.logging.level),
        format,
        ..LoggingConfig::default()
    }
}

const fn log_format(setting: LogFormatSetting) -> LogFormat {
    match setting {
        LogFormatSetting::Json => LogFormat::Json,
        LogFormatSetting::Pretty => LogFormat::Pretty,
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Run(_) => "run",
        Command::Inventory(_) => "inventory",
        Command::Check => "check",
    }
}

#[derive(Parser)]
#[command(
    name = "looparc",
    version,
    about = "Archive source directories into a destination kept within a capacity budget"
)]
pub(crate) struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, env = "LOOPARC_CONFIG")]
    config: Option<PathBuf>,
    /// Log level or filter directive; `RUST_LOG` takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one archival pass.
    Run(RunArgs),
    /// List items oldest first together with the eviction plan.
    Inventory(InventoryArgs),
    /// Validate the configuration and print a summary.
    Check,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Plan every move, purge, and eviction without changing anything.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Perform moves and purges but only plan evictions.
    #[arg(long, conflicts_with = "dry_run")]
    pub(crate) dry_run_eviction: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

impl RunArgs {
    pub(crate) const fn dry_run_mode(&self) -> DryRun {
        if self.dry_run {
            DryRun::All
        } else if self.dry_run_eviction {
            DryRun::EvictionOnly
        } else {
            DryRun::Off
        }
    }
}

#[derive(Args)]
pub(crate) struct InventoryArgs {
    /// List the path source at this zero-based index instead of the destination.
    #[arg(long)]
    pub(crate) source: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl LogFormatArg {
    const fn format(self) -> LogFormat {
        match self {
            Self::Json => LogFormat::Json,
            Self::Pretty => LogFormat::Pretty,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
