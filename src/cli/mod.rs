//! CLI module for stepflow.
//!
//! Argument parsing and the flags handled before a session starts:
//!
//! ```ignore
//! use stepflow::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! if let Some(result) = run_cli_command(&command) {
//!     std::process::exit(if result.is_ok() { 0 } else { 2 });
//! }
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, CliCommand, RunOptions, USAGE};
pub use version::{handle_version_command, VERSION};

use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Run a CLI command if applicable.
///
/// * `None` - the command is `Run`; start a session
/// * `Some(Ok(()))` - help was printed
/// * `Some(Err(e))` - the arguments were invalid
///
/// `Version` never returns.
pub fn run_cli_command(command: &CliCommand) -> Option<Result<()>> {
    match command {
        CliCommand::Version => handle_version_command(),
        CliCommand::Help => {
            println!("{}", USAGE);
            Some(Ok(()))
        }
        CliCommand::Invalid(reason) => Some(Err(eyre!("{}\n\n{}", reason, USAGE))),
        CliCommand::Run(_) => None,
    }
}
