//! Provider trait for frame sources

use crate::Result;
use crate::types::FrameEvent;

/// Trait for transport-side frame sources
///
/// Providers abstract over where frames come from (a capture device feed,
/// a recorded replay) and handle their own pacing. Batches must be returned
/// in transmission order.
///
/// The driver polls `next_batch` inside `tokio::select!`, so implementations
/// must be cancellation safe: dropping the future before it completes must
/// not lose events.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next batch of frame events
    ///
    /// Returns:
    /// - `Ok(Some(batch))` - Events available (may be empty)
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Transport error; the driver retries with backoff
    async fn next_batch(&mut self) -> Result<Option<Vec<FrameEvent>>>;

    /// Take batches the source has already accepted but not yet delivered.
    ///
    /// Called once when the capture stops, so queued data reaches the final
    /// flush. Must not wait. Sources without an internal queue keep the default.
    fn drain_buffered(&mut self) -> Vec<Vec<FrameEvent>> {
        Vec::new()
    }

    /// Short name used in logs
    fn name(&self) -> &str {
        "provider"
    }
}
