//! API shared state

use std::sync::Arc;

use crate::olt::OltService;
use crate::registry::InventorySync;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Answers OLT queries
    pub olt: Arc<dyn OltService>,

    /// Device inventory replaced by the sync endpoint
    pub devices: Arc<dyn InventorySync>,
}

impl ApiState {
    pub fn new(olt: Arc<dyn OltService>, devices: Arc<dyn InventorySync>) -> Self {
        Self { olt, devices }
    }
}
