//! geoharmonize CLI entrypoint.
//!
//! Provides a thin wrapper over the `cli` module: parse args, build or run a
//! harmonization plan, and exit with appropriate status.
//! For programmatic use, prefer the library API (`geoharmonize::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
