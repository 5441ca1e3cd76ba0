mod commands;
mod helpers;

use burnup_core::domain::BurnupError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let burnup_error = error.as_burnup_error();
            eprintln!("{}", burnup_error.diagnostic_line());
            eprintln!("{}", burnup_error.fatal_exit_line());
            burnup_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("burnup-rs".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_logging(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "burnup-rs",
    version,
    about = "Depletion output to transport material card converter"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Convert every matching element output file in parallel
    Batch(commands::BatchArgs),
    /// Convert a single output file into one material card
    Parse(commands::ParseArgs),
    /// Show the latest stored cycle or a specific one
    Status(commands::StatusArgs),
    /// List every stored cycle
    Cycles(commands::DatabaseArgs),
    /// Show one element's materials across cycles
    History(commands::HistoryArgs),
    /// Run one job from a JSON request on stdin (used by the process executor)
    #[command(hide = true)]
    Worker,
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Batch(args) => commands::run_batch_command(args),
        CliCommand::Parse(args) => commands::run_parse_command(args),
        CliCommand::Status(args) => commands::run_status_command(args),
        CliCommand::Cycles(args) => commands::run_cycles_command(args),
        CliCommand::History(args) => commands::run_history_command(args),
        CliCommand::Worker => commands::run_worker_command(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(BurnupError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_burnup_error(&self) -> BurnupError {
        match self {
            Self::Usage(message) => {
                BurnupError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => BurnupError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<BurnupError> for CliError {
    fn from(error: BurnupError) -> Self {
        Self::Compute(error)
    }
}
