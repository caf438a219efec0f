//! Commands and replies exchanged between actor handles and actors

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Commands that can be sent to the Scheduler
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Dispatch a round of poll tasks immediately
    ///
    /// Responds with the number of tasks published.
    TickNow { respond_to: oneshot::Sender<usize> },

    /// Stop ticking; a round in progress is finished first
    Shutdown,
}

/// Commands that can be sent to the Worker
#[derive(Debug)]
pub enum WorkerCommand {
    GetStats {
        respond_to: oneshot::Sender<WorkerStats>,
    },

    /// Stop taking tasks and wait for running polls
    Shutdown,
}

/// Commands that can be sent to the AlertEngine
#[derive(Debug)]
pub enum AlertCommand {
    GetStats {
        respond_to: oneshot::Sender<AlertStats>,
    },

    Shutdown,
}

/// Commands that can be sent to the InventoryTracker
#[derive(Debug)]
pub enum InventoryCommand {
    GetStats {
        respond_to: oneshot::Sender<InventoryStats>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Tasks decoded from the bus
    pub received: u64,

    /// Polls finished, successful or not
    pub completed: u64,

    /// Polls whose device answered
    pub succeeded: u64,

    /// Payloads that were not a valid `PollTask`
    pub malformed: u64,

    /// Polls currently running
    pub in_flight: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub metrics_evaluated: u64,
    pub alerts_fired: u64,
    pub notify_failures: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    /// Inventory snapshots applied to the store
    pub syncs_applied: u64,

    /// Snapshots the store refused (duplicate IPs)
    pub syncs_rejected: u64,

    /// Poll outcomes written back to the store
    pub polls_recorded: u64,

    /// Payloads on either topic that did not decode
    pub malformed: u64,
}
