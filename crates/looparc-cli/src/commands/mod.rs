//! Command handlers grouped by subcommand.

mod check;
mod inventory;
mod run;

pub(crate) use check::handle_check;
pub(crate) use inventory::handle_inventory;
pub(crate) use run::handle_run;
