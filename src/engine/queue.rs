//! MAPQUEUE - LocalQueue (In-Memory Reference Queue)

use std::collections::VecDeque;

use crate::error::{MapQueueError, Result};

use super::metrics::EngineMetrics;
use super::{Context, Queue};

/// In-memory queue backed by a `VecDeque`.
///
/// Values go in at the front and come out at the back, which happens to be
/// FIFO. Callers must not rely on that; the [`Queue`] contract promises no
/// order.
pub struct LocalQueue {
    /// `None` while closed.
    values: Option<VecDeque<Vec<u8>>>,
    metrics: EngineMetrics,
}

impl LocalQueue {
    /// Create a closed LocalQueue. Call [`Context::open`] before use.
    pub fn new() -> Self {
        Self {
            values: None,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

impl Default for LocalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for LocalQueue {
    fn open(&mut self) -> Result<()> {
        if self.values.is_none() {
            self.values = Some(VecDeque::new());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(values) = self.values.take() {
            if !values.is_empty() {
                log::info!("LocalQueue closed with {} pending values", values.len());
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.values.is_some()
    }
}

impl Queue for LocalQueue {
    fn add(&mut self, kind: &str, value: &[u8]) -> Result<Vec<u8>> {
        let values = self.values.as_mut().ok_or(MapQueueError::Closed)?;
        values.push_front(value.to_vec());
        self.metrics.record_add();
        log::debug!("LocalQueue add ({}, {} bytes)", kind, value.len());
        Ok(value.to_vec())
    }

    fn pop(&mut self) -> Result<Option<Vec<u8>>> {
        let values = self.values.as_mut().ok_or(MapQueueError::Closed)?;
        let value = values.pop_back();
        if value.is_some() {
            self.metrics.record_pop();
        }
        Ok(value)
    }

    fn len(&self) -> usize {
        self.values.as_ref().map_or(0, VecDeque::len)
    }
}
