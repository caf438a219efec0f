//! OLT gateway: HTTP access to OLT metrics over SNMP
//!
//! Inventory syncs are forwarded over NATS to the collector, which owns the
//! store the scheduler reads.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use optical_nms::{
    api::{ApiConfig, ApiState, spawn_api_server},
    bus::{MessageBus, NatsBus},
    config,
    olt::SnmpOltService,
    protocols::snmp::session::Snmp2Connector,
    registry::PublishedInventory,
    util,
};
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
    util::init_tracing("nms_gateway", config.server.mode);
    trace!("started with args: {args:?}");

    let bus: Arc<dyn MessageBus> = Arc::new(
        NatsBus::connect(&config.bus.url)
            .await
            .with_context(|| format!("failed to connect to message bus at {}", config.bus.url))?,
    );

    let olt = SnmpOltService::new(Arc::new(Snmp2Connector), &config.olt);
    let devices = PublishedInventory::new(bus, config.devices.clone())?;
    let state = ApiState::new(Arc::new(olt), Arc::new(devices));

    let addr = spawn_api_server(ApiConfig::from(&config.server), state).await?;
    info!("OLT gateway ready on {addr}");

    util::shutdown_signal().await;
    info!("shutting down");

    Ok(())
}
