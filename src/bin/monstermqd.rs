// Daemon entry point, grounded on hebo's `src/bin/hebo.rs` (load config,
// init logging, run the server) but with a `clap` derive CLI in place of
// hebo's hand-parsed argv, matching the rest of this corpus's CLI style.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use monstermq::config::{Config, LogLevel};
use monstermq::error::{Error, ErrorKind};
use monstermq::{broker, log as broker_log};

const DEFAULT_CONFIG_PATH: &str = "/etc/monstermq/monstermq.toml";
const EXIT_ARGUMENT_OR_CONFIG_ERROR: u8 = 1;
const EXIT_STARTUP_FAILURE: u8 = 101;

#[derive(Parser, Debug)]
#[command(name = "monstermqd", version, about = "Clustered MQTT 3.1.1 broker")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Force clustered mode by switching the bus to the external transport,
    /// overriding `[bus] kind` in the config file.
    #[arg(long)]
    cluster: bool,

    /// Override `[log] level` from the config file.
    #[arg(short, long, value_name = "LEVEL")]
    log: Option<String>,

    /// Load and validate the configuration, then exit without binding any
    /// listener.
    #[arg(long)]
    test: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match run(cli, &config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.kind() == ErrorKind::Config => {
            eprintln!("monstermqd: {err}");
            ExitCode::from(EXIT_ARGUMENT_OR_CONFIG_ERROR)
        }
        Err(err) => {
            eprintln!("monstermqd: {err}");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

fn run(cli: Cli, config_path: &PathBuf) -> Result<(), Error> {
    let mut config = Config::load(config_path)?;

    if cli.cluster {
        config.bus.kind = monstermq::config::BusKind::External;
        config.bus.validate()?;
    }
    if let Some(level) = cli.log.as_deref() {
        config.log.level = parse_log_level(level)?;
    }

    broker_log::init(&config.log)?;

    if cli.test {
        log::info!("configuration at {} is valid", config_path.display());
        return Ok(());
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| Error::new(ErrorKind::Io, err.to_string()))?
        .block_on(broker::run(config))
}

fn parse_log_level(level: &str) -> Result<LogLevel, Error> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Ok(LogLevel::Off),
        "error" => Ok(LogLevel::Error),
        "warn" => Ok(LogLevel::Warn),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "trace" => Ok(LogLevel::Trace),
        other => Err(Error::new(ErrorKind::Config, format!("unknown log level: {other}"))),
    }
}
