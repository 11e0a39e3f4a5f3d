mod config;
mod http;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("Usage: sitesync-server [--listen <addr>] [--config <path>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --listen <addr>   Address to bind (default 127.0.0.1:8080)");
    eprintln!("  --config <path>   JSON config file (default $SITESYNC_CONFIG)");
    eprintln!("  --version         Print version and exit");
    eprintln!("  --help            Print this help message");
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    listen: Option<String>,
    config: Option<PathBuf>,
}

enum Command {
    Serve(CliArgs),
    Version,
    Help,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut cli = CliArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" => return Ok(Command::Version),
            "--help" => return Ok(Command::Help),
            "--listen" => {
                let value = iter.next().context("--listen requires an address")?;
                cli.listen = Some(value.clone());
            }
            "--config" => {
                let value = iter.next().context("--config requires a path")?;
                cli.config = Some(PathBuf::from(value));
            }
            other => bail!("Unknown option: {other}"),
        }
    }
    Ok(Command::Serve(cli))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let cli = match parse_args(&args) {
        Ok(Command::Version) => {
            println!("sitesync-server {}", VERSION);
            return Ok(());
        }
        Ok(Command::Help) => {
            print_usage();
            return Ok(());
        }
        Ok(Command::Serve(cli)) => cli,
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen))?;

    info!("sitesync-server {} starting", VERSION);
    http::serve(http::AppState::new(config), addr).await
}
