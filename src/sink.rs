use crate::record::EventPayload;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for normalized [`EventPayload`]s.
///
/// This is the seam to the transport layer: implementations batch, queue,
/// retry and ship payloads to a monitoring backend. The normalizers never
/// call a sink themselves; instrumentation hands their output over.
#[async_trait]
pub trait PayloadSink: Send + Sync {
    /// Send a single payload to the underlying transport.
    ///
    /// **Returns**
    /// - `Ok(())` if the payload was accepted.
    /// - `Err(..)` if the transport rejected it (network error, encoding
    ///   error, backend status, etc).
    async fn send(&self, payload: &EventPayload) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered payloads, if the transport buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
