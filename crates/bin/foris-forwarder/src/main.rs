mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use forward_core::Application;
use forward_core::Configuration;
use forward_core::Host;
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.debug);

    info!("foris-forwarder {}", env!("CARGO_PKG_VERSION"));

    let controller_id = forward_core::ControllerId::from_str(&args.controller_id)
        .map_err(|error| anyhow::anyhow!("invalid --controller-id: {error}"))?;
    let (username, password) = cli::read_passwd_file(&args.passwd_file)?;

    let host = Host {
        controller_id,
        port: args.port,
        username,
        password,
    };

    let config_path = args.uci_config_dir.join("fosquitto");
    let configuration = Configuration::load(host, &config_path, &args.fosquitto_dir)
        .context("failed to load forwarder configuration")?;

    let mut application = Application::new(configuration)
        .map_err(|error| anyhow::anyhow!("{error}"))
        .context("failed to start foris-forwarder")?;

    application.run().await.context("forwarder stopped unexpectedly")
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
