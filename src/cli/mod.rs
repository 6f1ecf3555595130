//! Command-line interface for the reconciliation tool

mod args;

pub use args::CliArgs;

use clap::Parser;

/// Parse the process arguments
///
/// On invalid arguments or `--help`, clap prints the message and exits the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
