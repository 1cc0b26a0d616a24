use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use rein_core::app::DriverBuilder;
use rein_core::config::Config;
use rein_core::impls::ChatProvider;
use rein_core::ports::{DecisionProvider, RemoteLink};
use rein_core::transport::{SocketBridge, StartMode};

mod telemetry;

/// Drive a game character from a local decision loop.
#[derive(Debug, Parser)]
#[command(name = "rein", version)]
struct Cli {
    /// TOML config file. Defaults and REIN_* variables apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Milliseconds between decision ticks.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Wait this long for the mod to connect before starting. 0 starts right away.
    #[arg(long)]
    connect_timeout_secs: Option<u64>,

    /// Initial directive for the character.
    #[arg(short, long)]
    directive: Option<String>,

    /// Never call the generative provider.
    #[arg(long)]
    rules_only: bool,

    /// Print the action history as JSON on exit.
    #[arg(long)]
    dump_ledger: bool,

    /// -v debug, -vv trace. REIN_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.bridge.host = host.clone();
        }
        if let Some(port) = self.port {
            config.bridge.port = port;
        }
        if let Some(ms) = self.interval_ms {
            config.driver.interval_ms = ms;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.bridge.connect_timeout_secs = secs;
        }
        if self.rules_only {
            config.provider.enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("loading config")?;
    cli.apply(&mut config);
    config.validate().context("invalid settings")?;

    let mode = match config.bridge.connect_timeout() {
        Some(timeout) => StartMode::Blocking {
            timeout: Some(timeout),
        },
        None => StartMode::Background,
    };
    let bridge = SocketBridge::start(&config.bridge, mode)
        .await
        .with_context(|| format!("starting bridge on {}", config.bridge.bind_addr()))?;
    info!(addr = %bridge.local_addr(), "bridge listening");

    let provider = ChatProvider::from_config(&config.provider)
        .context("building chat provider")?
        .map(|p| Arc::new(p) as Arc<dyn DecisionProvider>);

    let driver = DriverBuilder::new(Arc::clone(&bridge) as Arc<dyn RemoteLink>)
        .maybe_provider(provider)
        .config(config.driver.clone())
        .build()
        .context("building driver")?;
    let handle = driver.spawn();

    if let Some(text) = &cli.directive {
        let kind = handle.directives().set(text);
        info!(kind = kind.as_str(), "initial directive");
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down");

    let driver = handle.shutdown_and_join().await;
    bridge.stop().await;

    match driver {
        Some(driver) if cli.dump_ledger => {
            let entries: Vec<_> = driver.ledger().entries().collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Some(_) => {}
        None => warn!("decision loop did not stop cleanly"),
    }
    Ok(())
}
