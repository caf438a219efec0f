//! Scheduler service: owns the device store, publishes poll tasks over NATS
//! and keeps the store current from inventory syncs and poll outcomes

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use optical_nms::{
    actors::{InventoryHandle, SchedulerHandle},
    bus::{MessageBus, NatsBus},
    config,
    registry::DeviceStore,
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
    util::init_tracing("nms_collector", config.server.mode);
    trace!("started with args: {args:?}");

    let bus: Arc<dyn MessageBus> = Arc::new(
        NatsBus::connect(&config.bus.url)
            .await
            .with_context(|| format!("failed to connect to message bus at {}", config.bus.url))?,
    );

    let devices = Arc::new(DeviceStore::from_devices(config.devices.clone())?);
    info!("loaded {} devices", devices.len().await);

    // Track syncs and poll outcomes before the first round goes out
    let tracker = InventoryHandle::spawn(bus.as_ref(), devices.clone()).await?;
    let scheduler = SchedulerHandle::spawn(devices, bus, config.scheduler.tick());

    util::shutdown_signal().await;
    info!("shutting down");
    scheduler.shutdown().await?;
    tracker.shutdown().await?;

    Ok(())
}
