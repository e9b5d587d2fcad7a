use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use townhall::{Config, TownhallServer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Community site API with real-time updates.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// RON configuration file, defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port, takes precedence over the config file and `PORT`.
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let stdout_printer = tracing_subscriber::fmt::Layer::new();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_printer)
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.http_addr.set_port(port);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = TownhallServer::start(&config).await?;
        server.join.await?;
        Ok::<_, anyhow::Error>(())
    })
}
