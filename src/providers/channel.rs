//! Channel-fed provider for in-process transports

use tokio::sync::mpsc;
use tracing::debug;

use crate::Result;
use crate::provider::Provider;
use crate::types::FrameEvent;

/// Default number of batches the transport may queue ahead of the driver.
pub const DEFAULT_CHANNEL_DEPTH: usize = 256;

/// Provider receiving batches from a transport task over a bounded channel.
///
/// The transport side blocks (asynchronously) when the driver falls behind,
/// so the queue between them never grows without bound.
pub struct ChannelProvider {
    rx: mpsc::Receiver<Vec<FrameEvent>>,
    received: u64,
}

impl ChannelProvider {
    /// Create a provider and the sender the transport writes to.
    pub fn new(depth: usize) -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (FrameSender { tx }, Self { rx, received: 0 })
    }

    /// Number of batches received so far.
    pub fn batches_received(&self) -> u64 {
        self.received
    }
}

#[async_trait::async_trait]
impl Provider for ChannelProvider {
    async fn next_batch(&mut self) -> Result<Option<Vec<FrameEvent>>> {
        match self.rx.recv().await {
            Some(batch) => {
                self.received += 1;
                Ok(Some(batch))
            }
            None => {
                debug!("Transport closed after {} batches", self.received);
                Ok(None)
            }
        }
    }

    fn drain_buffered(&mut self) -> Vec<Vec<FrameEvent>> {
        // Later sends fail with SessionClosed instead of queueing unseen data
        self.rx.close();
        let mut batches = Vec::new();
        while let Ok(batch) = self.rx.try_recv() {
            self.received += 1;
            batches.push(batch);
        }
        if !batches.is_empty() {
            debug!("Drained {} queued batches on stop", batches.len());
        }
        batches
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Transport half of a [`ChannelProvider`].
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<Vec<FrameEvent>>,
}

impl FrameSender {
    /// Send one batch; fails once the capture has stopped.
    pub async fn send(&self, batch: Vec<FrameEvent>) -> Result<()> {
        self.tx.send(batch).await.map_err(|_| crate::CaptureError::SessionClosed)
    }

    /// Send without waiting; fails when the queue is full or the capture stopped.
    pub fn try_send(&self, batch: Vec<FrameEvent>) -> Result<()> {
        self.tx.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                crate::CaptureError::transport_failed("frame queue is full")
            }
            mpsc::error::TrySendError::Closed(_) => crate::CaptureError::SessionClosed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
