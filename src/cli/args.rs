use clap::{Parser, Subcommand};
use std::path::PathBuf;

use geoharmonize::SpectralIndex;

#[derive(Parser)]
#[command(name = "geoharmonize", version, about = "Band harmonization planner")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable logging (RUST_LOG overrides the default debug level)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a pipeline config and print the execution graph as JSON
    Plan {
        /// Pipeline config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Replace the configured indices (ndvi, evi, savi, ndwi, mndwi, nbr)
        #[arg(long, value_enum, value_delimiter = ',')]
        indices: Option<Vec<SpectralIndex>>,

        /// Pretty-print the JSON output
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Build the plan and evaluate it on local fixture collections
    Run {
        /// Pipeline config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Fixture collections (JSON), keyed by collection id
        #[arg(short, long)]
        fixtures: PathBuf,

        /// Replace the configured indices (ndvi, evi, savi, ndwi, mndwi, nbr)
        #[arg(long, value_enum, value_delimiter = ',')]
        indices: Option<Vec<SpectralIndex>>,

        /// Pretty-print the JSON output
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
}
