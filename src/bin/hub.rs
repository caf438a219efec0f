//! All services in one process, connected by the in-process bus

use std::sync::Arc;

use clap::Parser;
use optical_nms::{
    actors::{Adapters, AlertHandle, PollPipeline, SchedulerHandle, WorkerHandle},
    bus::{MemoryBus, MessageBus},
    config, notify,
    registry::{DeviceRegistry, DeviceStore},
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
    util::init_tracing("nms_hub", config.server.mode);
    trace!("started with args: {args:?}");

    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::new());
    let devices = Arc::new(DeviceStore::from_devices(config.devices.clone())?);
    let registry: Arc<dyn DeviceRegistry> = devices.clone();

    let sink: Arc<dyn MetricSink> = match &config.influx {
        Some(influx) => Arc::new(InfluxSink::new(influx)?),
        None => {
            warn!("no time-series store configured, keeping points in memory");
            Arc::new(MemorySink::new())
        }
    };

    // Consumers subscribe before the scheduler publishes its first round
    let notifier = Arc::from(notify::from_config(&config.notifier));
    let alerts = AlertHandle::spawn(bus.as_ref(), config.rule_set(), notifier).await?;

    let pipeline = PollPipeline::new(
        Adapters::from_config(&config.worker),
        sink,
        bus.clone(),
        config.worker.poll_timeout(),
    )
    .with_registry(registry.clone());
    let worker = WorkerHandle::spawn(pipeline).await?;

    let scheduler = SchedulerHandle::spawn(registry, bus, config.scheduler.tick());

    #[cfg(feature = "api")]
    {
        use optical_nms::api::{ApiConfig, ApiState, spawn_api_server};
        use optical_nms::olt::SnmpOltService;
        use optical_nms::protocols::snmp::session::Snmp2Connector;

        let olt = SnmpOltService::new(Arc::new(Snmp2Connector), &config.olt);
        let state = ApiState::new(Arc::new(olt), devices.clone());
        let addr = spawn_api_server(ApiConfig::from(&config.server), state).await?;
        info!("OLT gateway ready on {addr}");
    }

    info!("hub running with {} devices", devices.len().await);
    util::shutdown_signal().await;
    info!("shutting down");

    scheduler.shutdown().await?;
    worker.shutdown().await?;
    alerts.shutdown().await?;

    Ok(())
}
