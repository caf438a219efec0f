//! Request and response bodies owned by the API itself
//!
//! OLT bodies live in [`crate::olt::dto`].

use serde::{Deserialize, Serialize};

use crate::model::Device;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Devices currently in the inventory
    pub devices: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub count: usize,
}
