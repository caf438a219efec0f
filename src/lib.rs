//! Poll, dispatch, collect and alert pipeline for network equipment.
//!
//! ```text
//! Scheduler → nms.poll.tasks → Worker → {MetricSink, nms.metrics} → AlertEngine → Notifier
//! ```
//!
//! The OLT gateway (`api`) exposes the SNMP OLT adapter over HTTP.

pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod bus;
pub mod config;
pub mod model;
pub mod notify;
pub mod olt;
pub mod protocols;
pub mod registry;
pub mod rules;
pub mod sink;
pub mod util;

pub use model::{
    ApiAuth, Device, DeviceStatus, DeviceType, InventorySnapshot, Metric, MetricValue, PollTask,
    Protocol,
};
