mod application;
mod bundle;
mod cancel;
mod commands;
mod config;
mod constants;
mod session;
mod transfer;
mod transport;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests_session;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, ArgGroup, Args, Parser};
use shared::error::SharedError;
use tracing_subscriber::EnvFilter;

use crate::application::SerialTransportProvider;
use crate::cancel::CancellationToken;
use crate::config::RunSettings;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Seal OATH records on a TKey and print their codes from an encrypted bundle"
)]
#[command(group(ArgGroup::new("target").required(true).args(["bundle", "create"])))]
pub struct Cli {
    /// Optional path to the serial device. Falls back to auto-detection when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub port: Option<String>,

    /// Serial line speed in bits per second.
    #[arg(long, value_name = "BPS")]
    pub speed: Option<u32>,

    /// Skip TKey VID/PID filtering and accept the first USB serial device.
    #[arg(long)]
    pub any_port: bool,

    /// JSON file with connection defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log output; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Existing bundle to print codes from, or to add a record to.
    #[arg(long, value_name = "PATH")]
    pub bundle: Option<PathBuf>,

    /// Create a new bundle holding the record given with --secret and --name.
    #[arg(long, value_name = "PATH", requires = "secret")]
    pub create: Option<PathBuf>,

    #[command(flatten)]
    pub record: RecordArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// Unpadded base32 secret of the record to add.
    #[arg(long, value_name = "BASE32", requires = "name")]
    pub secret: Option<String>,

    /// Name shown next to the record's codes.
    #[arg(long, value_name = "NAME", requires = "secret")]
    pub name: Option<String>,

    /// Counter based (HOTP) record instead of time based.
    #[arg(long)]
    pub hotp: bool,

    /// Initial counter of a HOTP record.
    #[arg(long, value_name = "N", requires = "hotp")]
    pub counter: Option<u64>,

    /// Time step of a TOTP record in seconds.
    #[arg(long, value_name = "SECS", conflicts_with = "hotp")]
    pub period: Option<u64>,

    /// Require a touch on the TKey before each code is released.
    #[arg(long)]
    pub touch: bool,

    /// Number of digits in each code.
    #[arg(long, default_value_t = 6)]
    pub digits: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cancel = match setup(&cli) {
        Ok(cancel) => cancel,
        Err(err) => {
            eprintln!("Setup failed: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = RunSettings::resolve(&cli)
        .and_then(|settings| application::execute(settings, &SerialTransportProvider, cancel));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err}", error_category(&err));
            ExitCode::from(err.exit_code())
        }
    }
}

fn setup(cli: &Cli) -> Result<CancellationToken> {
    init_tracing(cli.verbose)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.cancel() {
            std::process::exit(130);
        }
        eprintln!("Interrupted, stopping after the current exchange. Press Ctrl-C again to abort.");
    })
    .context("failed to install the interrupt handler")?;

    Ok(cancel)
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity > 2)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))
}

fn error_category(err: &SharedError) -> &'static str {
    match err {
        SharedError::Transport(_) | SharedError::NoReply { .. } => "Transport failure",
        SharedError::Eof(_) | SharedError::UnexpectedAppIdentity { .. } => "Device not ready",
        SharedError::StatusNotOk { .. }
        | SharedError::TransferRejected { .. }
        | SharedError::CalculateFailed => "Device refused the request",
        SharedError::Bundle(_) | SharedError::TocSizeMismatch { .. } => "Bundle error",
        SharedError::Config(_) => "Configuration error",
        SharedError::Cancelled => "Cancelled",
        SharedError::TransferOverrun { .. } => "Internal error",
        SharedError::MalformedFrame(_)
        | SharedError::FrameLengthMismatch { .. }
        | SharedError::UnexpectedResponse { .. }
        | SharedError::SessionMismatch { .. }
        | SharedError::EmptyChunk { .. } => "Protocol error",
        _ => "Invalid input",
    }
}
