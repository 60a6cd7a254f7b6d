//! DNSBL Agent CLI.
//!
//! Reads one JSON request line from stdin and writes one JSON decision line
//! to stdout. Any failure, including bad arguments, still produces a
//! well-formed "accept" response.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zentinel_agent_dnsbl::protocol::{self, Response};
use zentinel_agent_dnsbl::{Config, Decision, DnsblAgent, Error};

#[derive(Parser, Debug)]
#[command(name = "zentinel-agent-dnsbl")]
#[command(about = "DNSBL agent for Zentinel - check client IPs against DNS-based block and allow lists")]
#[command(version)]
struct Args {
    /// Path to configuration file
    config: Option<PathBuf>,

    /// Any further arguments turn on debug logging
    #[arg(trailing_var_arg = true, hide = true)]
    extra: Vec<String>,

    /// Log list queries and responses to stderr
    #[arg(short, long)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "warn")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn debug_enabled(&self) -> bool {
        self.debug || !self.extra.is_empty()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if is_informational(e.kind()) => e.exit(),
        Err(e) => {
            eprint!("{}", e);
            return respond(Decision::fail_open(&e).finalize("")).await;
        }
    };

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging; stdout is reserved for the response
    let filter = if args.debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Handle --validate
    if args.validate {
        let config_path = args.config.as_deref().ok_or(Error::NoConfig)?;
        Config::load(config_path)?;
        info!(config = %config_path.display(), "Configuration is valid");
        return Ok(());
    }

    respond(run(args.config.as_deref()).await).await
}

/// Help and version requests exit normally instead of answering.
fn is_informational(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

/// Write the decision to stdout as one response line.
async fn respond(decision: Decision) -> Result<()> {
    let line = Response::from(decision).to_line()?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Load config, read the request and evaluate it, failing open on any error.
async fn run(config_path: Option<&Path>) -> Decision {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load configuration");
            return Decision::fail_open(&e).finalize("");
        }
    };

    let line = match read_request_line().await {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "Failed to read request");
            return Decision::fail_open(&e).finalize("");
        }
    };

    let agent = DnsblAgent::new(config);
    protocol::answer(&agent, &line).await
}

fn load_config(config_path: Option<&Path>) -> Result<Config, Error> {
    Config::load(config_path.ok_or(Error::NoConfig)?)
}

async fn read_request_line() -> Result<String, Error> {
    let mut line = String::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    if reader.read_line(&mut line).await? == 0 {
        return Err(Error::Request("no request on stdin".to_string()));
    }
    Ok(line)
}
