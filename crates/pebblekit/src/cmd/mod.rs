use std::future::Future;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use pebblekit_peer::PeerConfig;
use uuid::Uuid;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;
use crate::sim::{Loopback, SimOptions};

pub mod app;
pub mod dict;
pub mod info;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a dictionary to a watchapp through the mediator.
    Send(SendArgs),
    /// Start or stop a watchapp.
    App(AppArgs),
    /// Query the mediator's watch-state provider.
    Info(InfoArgs),
    /// Encode a dictionary and report its wire size.
    Dict(DictArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => block_on(send::run(args, format)),
        Command::App(args) => block_on(app::run(args, format)),
        Command::Info(args) => block_on(info::run(args, format)),
        Command::Dict(args) => dict::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(command: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    runtime.block_on(command)
}

/// Shape of the simulated mediator the command runs against.
#[derive(Args, Debug, Clone)]
pub struct SimArgs {
    /// Watches reported as connected (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "watch-1")]
    pub connected: Vec<String>,
    /// Run without a mediator app installed.
    #[arg(long)]
    pub no_mediator: bool,
    /// Pin the mediator package instead of auto-selecting.
    #[arg(long, value_name = "PACKAGE")]
    pub select: Option<String>,
}

impl SimArgs {
    pub fn options(&self) -> SimOptions {
        SimOptions {
            watches: self.connected.clone(),
            install_mediator: !self.no_mediator,
            active_app: None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TimeoutArgs {
    /// Maximum wait for the mediator binding (e.g. 10s, 500ms).
    #[arg(long, env = "PEBBLEKIT_BIND_TIMEOUT", default_value = "10s")]
    pub bind_timeout: String,
    /// Maximum wait for a reply; 0 waits indefinitely.
    #[arg(long, env = "PEBBLEKIT_REQUEST_TIMEOUT", default_value = "30s")]
    pub request_timeout: String,
}

impl TimeoutArgs {
    pub fn peer_config(&self) -> CliResult<PeerConfig> {
        let request_timeout = match self.request_timeout.trim() {
            "0" | "0s" | "0ms" => None,
            other => Some(parse_duration(other)?),
        };
        Ok(PeerConfig {
            bind_timeout: parse_duration(&self.bind_timeout)?,
            request_timeout,
        })
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Target watchapp UUID.
    pub uuid: Uuid,
    /// Dictionary entry as KEY=TYPE:VALUE (repeatable).
    #[arg(long = "entry", short = 'e', value_name = "KEY=TYPE:VALUE")]
    pub entries: Vec<String>,
    /// Restrict delivery to these watches (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub watches: Option<Vec<String>>,
    /// Also push the dictionary back to this client as if a watch sent it.
    #[arg(long)]
    pub echo: bool,
    /// Reject dictionaries larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<usize>,
    #[command(flatten)]
    pub sim: SimArgs,
    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum AppAction {
    Start,
    Stop,
}

#[derive(Args, Debug)]
pub struct AppArgs {
    pub action: AppAction,
    /// Target watchapp UUID.
    pub uuid: Uuid,
    /// Restrict to these watches (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub watches: Option<Vec<String>>,
    #[command(flatten)]
    pub sim: SimArgs,
    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Resource path: `connectedWatches` or `activeApp/{watch}`.
    pub path: String,
    /// Columns to return (comma-separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,
    /// Watches reported as connected (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "watch-1")]
    pub connected: Vec<String>,
    /// UUID of the app shown as active on every connected watch.
    #[arg(long, value_name = "UUID")]
    pub active_app: Option<Uuid>,
    /// Display name of the active app.
    #[arg(long, requires = "active_app")]
    pub app_name: Option<String>,
}

#[derive(Args, Debug)]
pub struct DictArgs {
    /// Dictionary entry as KEY=TYPE:VALUE (repeatable).
    #[arg(long = "entry", short = 'e', value_name = "KEY=TYPE:VALUE")]
    pub entries: Vec<String>,
    /// Fail if the encoded dictionary exceeds this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build the simulated mediator and apply `--select`.
pub async fn start_sim(sim: &SimArgs) -> CliResult<Loopback> {
    let loopback = Loopback::start(&sim.options()).await?;
    if let Some(package) = &sim.select {
        loopback.select(package).await?;
    }
    Ok(loopback)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts(bind: &str, request: &str) -> TimeoutArgs {
        TimeoutArgs {
            bind_timeout: bind.to_string(),
            request_timeout: request.to_string(),
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn zero_request_timeout_waits_indefinitely() {
        let config = timeouts("500ms", "0")
            .peer_config()
            .expect("timeouts should parse");
        assert_eq!(config.bind_timeout, Duration::from_millis(500));
        assert_eq!(config.request_timeout, None);

        let config = timeouts("10s", "30s")
            .peer_config()
            .expect("defaults should parse");
        assert_eq!(config, PeerConfig::default());
    }
}
