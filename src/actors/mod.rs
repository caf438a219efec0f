//! Long-lived pipeline services
//!
//! Each service is an actor: a struct owning its inputs, driven by
//! `tokio::select!` in `run(self)`, and controlled through a cloneable handle
//! that talks to it over an `mpsc` command channel.
//!
//! ```text
//!  Scheduler ──nms.poll.tasks──▶ Worker ──nms.metrics──▶ AlertEngine ──▶ Notifier
//!      ▲                          │  │
//!  DeviceStore                    │  └──▶ MetricSink
//!      ▲                          │
//!  InventoryTracker ◀─nms.metrics─┘
//!      ▲
//!  nms.inventory.sync (gateway)
//! ```
//!
//! The [`InventoryTracker`] runs next to the scheduler and is the only writer
//! of its store when the services are deployed separately.
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: control messages on the actor's mpsc channel
//! 2. **Bus**: tasks and metrics travel as JSON over a [`crate::bus::MessageBus`]
//! 3. **Request/Response**: oneshot channels for stats and manual ticks
//!
//! `shutdown()` on a handle returns once the actor has finished its in-flight
//! work and stopped.

pub mod alert;
pub mod inventory;
pub mod messages;
pub mod scheduler;
pub mod worker;

pub use alert::{AlertEngine, AlertHandle};
pub use inventory::{InventoryHandle, InventoryTracker};
pub use messages::{AlertStats, InventoryStats, WorkerStats};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use worker::{Adapters, PollPipeline, Worker, WorkerHandle};
