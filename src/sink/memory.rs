//! In-memory sink (no persistence)
//!
//! Keeps the most recent points in a ring buffer. Used by the hub when no
//! time-series store is configured, and by tests to inspect what workers wrote.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::{MetricSink, Point, SinkResult};

const DEFAULT_CAPACITY: usize = 1000;

pub struct MemorySink {
    points: RwLock<VecDeque<Point>>,
    capacity: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Points currently held, oldest first
    pub async fn points(&self) -> Vec<Point> {
        self.points.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    async fn write_point(&self, point: Point) -> SinkResult<()> {
        let mut points = self.points.write().await;
        if points.len() == self.capacity {
            points.pop_front();
        }
        trace!("buffered {} point", point.measurement);
        points.push_back(point);
        Ok(())
    }
}
