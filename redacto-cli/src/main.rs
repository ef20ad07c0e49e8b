// redacto-cli/src/main.rs
//
// Entry point of the `redacto` binary: parses arguments, sets up logging,
// runs the selected command and maps the outcome to an exit code
// (0 on success, warnings included; 1 on any fatal error).

use clap::Parser;
use redacto_cli::logging;
use redacto_cli::{Cli, Commands, run_probe, run_redact};
use std::process;

fn main() {
    let cli = Cli::parse();

    match logging::init_logging(cli.verbose, cli.log_dir.as_deref()) {
        Ok(Some(path)) => log::debug!("Run log: {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Redact(args) => run_redact(args).map(|_| ()),
        Commands::Probe(args) => run_probe(args).map(|_| ()),
    };

    if let Err(e) = result {
        log::error!("{e}");
        process::exit(1);
    }
}
