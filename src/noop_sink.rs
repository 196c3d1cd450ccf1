use crate::record::EventPayload;
use crate::sink::PayloadSink;
use async_trait::async_trait;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

/// A sink that drops every payload, counting what it saw.
///
/// Useful for measuring normalization overhead without any I/O.
#[derive(Default)]
pub struct NoopSink {
    received: AtomicU64,
}

impl NoopSink {
    /// Number of payloads passed to [`PayloadSink::send`] so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PayloadSink for NoopSink {
    async fn send(&self, _payload: &EventPayload) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
