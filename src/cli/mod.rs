//! Command Line Interface (CLI) layer for geoharmonize.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `plan` and `run`
//! commands. It wires user-provided options to the library functionality
//! exposed via `geoharmonize::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
