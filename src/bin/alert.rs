//! Alert service: evaluates metrics from NATS against the configured rules

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use optical_nms::{actors::AlertHandle, bus::NatsBus, config, notify, util};
use tracing::{info, trace};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON, or TOML by extension)
    #[arg(short)]
    file: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::load(args.file.as_deref())?;
    util::init_tracing("nms_alert", config.server.mode);
    trace!("started with args: {args:?}");

    let bus = NatsBus::connect(&config.bus.url)
        .await
        .with_context(|| format!("failed to connect to message bus at {}", config.bus.url))?;

    let rules = config.rule_set();
    info!("loaded {} alert rules", rules.len());

    let notifier = Arc::from(notify::from_config(&config.notifier));
    let engine = AlertHandle::spawn(&bus, rules, notifier).await?;

    util::shutdown_signal().await;
    info!("shutting down");
    engine.shutdown().await?;

    Ok(())
}
