//! Command-line argument parsing for the stepflow CLI.

use crate::flow::Flow;

/// Options for an interactive session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Flow for a new session; falls back to configuration
    pub flow: Option<Flow>,
    /// Resume this session instead of creating one
    pub session: Option<String>,
    /// Backend URL override
    pub api_url: Option<String>,
    /// Ledger directory override
    pub data_dir: Option<String>,
}

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Run an interactive session (default)
    Run(RunOptions),
    /// Arguments could not be parsed
    Invalid(String),
}

/// Usage text printed by `--help`.
pub const USAGE: &str = "\
Usage: stepflow [OPTIONS]

Options:
  --flow <solve|learn>   Flow for a new session
  --session <ID>         Resume an existing session
  --api-url <URL>        Backend URL (env: STEPFLOW_API_URL)
  --data-dir <DIR>       Ledger directory (env: STEPFLOW_DATA_DIR)
  -V, --version          Print version
  -h, --help             Print help";

/// Parse command-line arguments and return the appropriate command.
///
/// The first item is the program name and is skipped. `--version` and
/// `--help` win over everything else.
///
/// # Examples
///
/// ```
/// use stepflow::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["stepflow".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut options = RunOptions::default();
    let mut args = args.skip(1);

    while let Some(arg) = args.next() {
        let (name, inline) = match arg.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };

        match name.as_str() {
            "--version" | "-V" => return CliCommand::Version,
            "--help" | "-h" => return CliCommand::Help,
            "--flow" | "--session" | "--api-url" | "--data-dir" => {
                let Some(value) = inline.or_else(|| args.next()) else {
                    return CliCommand::Invalid(format!("{} requires a value", name));
                };
                match name.as_str() {
                    "--flow" => match value.parse() {
                        Ok(flow) => options.flow = Some(flow),
                        Err(e) => return CliCommand::Invalid(e.to_string()),
                    },
                    "--session" => options.session = Some(value),
                    "--api-url" => options.api_url = Some(value),
                    _ => options.data_dir = Some(value),
                }
            }
            other => return CliCommand::Invalid(format!("Unknown argument: {}", other)),
        }
    }

    CliCommand::Run(options)
}
