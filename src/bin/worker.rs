//! Poll worker service: consumes poll tasks from NATS, writes points and publishes metrics
//!
//! Device status is not written here: the collector records it from the
//! published metrics.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use optical_nms::{
    actors::{Adapters, PollPipeline, WorkerHandle},
    bus::NatsBus,
    config,
    sink::{InfluxSink, MemorySink, MetricSink},
    util,
};
use tracing::{info, trace, warn};

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
    util::init_tracing("nms_worker", config.server.mode);
    trace!("started with args: {args:?}");

    let bus = NatsBus::connect(&config.bus.url)
        .await
        .with_context(|| format!("failed to connect to message bus at {}", config.bus.url))?;

    let sink: Arc<dyn MetricSink> = match &config.influx {
        Some(influx) => Arc::new(InfluxSink::new(influx)?),
        None => {
            warn!("no time-series store configured, keeping points in memory");
            Arc::new(MemorySink::new())
        }
    };

    let pipeline = PollPipeline::new(
        Adapters::from_config(&config.worker),
        sink,
        Arc::new(bus),
        config.worker.poll_timeout(),
    );
    let worker = WorkerHandle::spawn(pipeline).await?;
    info!("worker waiting for poll tasks");

    util::shutdown_signal().await;
    info!("shutting down");
    worker.shutdown().await?;

    Ok(())
}
