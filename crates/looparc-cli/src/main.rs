//! `looparc` binary entrypoint.

fn main() {
    std::process::exit(looparc_cli::run());
}
