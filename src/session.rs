//! Capture session: a running ingestion task plus its read handles

use futures::Stream;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::decode::FrameDecoder;
use crate::driver::{Driver, DriverCommand};
use crate::ingest::{CaptureSummary, Pipeline};
use crate::provider::Provider;
use crate::store::{FrameStore, LiveView, SignalBuffers, SignalView, shared_frame_store, shared_signal_buffers};
use crate::{CaptureError, Result};

/// A live capture.
///
/// Created on capture start; the frame store and signal buffers it exposes live
/// exactly as long as the session's ingestion task. Stopping the session runs one
/// final flush of anything still queued.
pub struct CaptureSession {
    live: LiveView,
    signals: SignalView,
    updates: watch::Receiver<CaptureSummary>,
    discovered: watch::Receiver<Arc<[u32]>>,
    config: watch::Sender<Arc<PipelineConfig>>,
    commands: mpsc::Sender<DriverCommand>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<CaptureSummary>>,
}

impl CaptureSession {
    /// Start capturing from `provider`.
    pub fn start<P: Provider>(provider: P, config: PipelineConfig) -> Result<Self> {
        Self::start_inner(provider, config, None)
    }

    /// Start capturing, decoding processed frames into signal buffers with `decoder`.
    pub fn start_with_decoder<P, D>(provider: P, config: PipelineConfig, decoder: D) -> Result<Self>
    where
        P: Provider,
        D: FrameDecoder,
    {
        Self::start_inner(provider, config, Some(Box::new(decoder)))
    }

    fn start_inner<P: Provider>(
        provider: P,
        config: PipelineConfig,
        decoder: Option<Box<dyn FrameDecoder>>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "Starting capture session (max_buffer={}, flush every {:?})",
            config.max_buffer,
            config.flush_interval()
        );

        let (frame_writer, live) = shared_frame_store(FrameStore::new(config.overshoot_threshold));
        let (signal_writer, signals) = shared_signal_buffers(SignalBuffers::new(config.signal_capacity));
        let mut pipeline = Pipeline::new(frame_writer, signal_writer);
        if let Some(decoder) = decoder {
            pipeline = pipeline.with_decoder(decoder);
        }

        let (config_tx, config_rx) = watch::channel(Arc::new(config));
        let channels = Driver::spawn(provider, pipeline, config_rx);

        Ok(Self {
            live,
            signals,
            updates: channels.updates,
            discovered: channels.discovered,
            config: config_tx,
            commands: channels.commands,
            cancel: channels.cancel,
            handle: Some(channels.handle),
        })
    }

    /// Read-only handle to the live frame store
    pub fn live_view(&self) -> LiveView {
        self.live.clone()
    }

    /// Read-only handle to the signal buffers
    pub fn signals(&self) -> SignalView {
        self.signals.clone()
    }

    /// Capture totals after every flush, as a stream
    pub fn updates(&self) -> impl Stream<Item = CaptureSummary> + 'static {
        WatchStream::new(self.updates.clone())
    }

    /// Totals as of the latest flush
    pub fn current_summary(&self) -> CaptureSummary {
        *self.updates.borrow()
    }

    /// Routing IDs seen so far, sorted
    pub fn seen_ids(&self) -> Arc<[u32]> {
        Arc::clone(&self.discovered.borrow())
    }

    /// Discovered routing IDs as a stream
    pub fn discovered(&self) -> impl Stream<Item = Arc<[u32]>> + 'static {
        WatchStream::new(self.discovered.clone())
    }

    /// Current pipeline configuration
    pub fn config(&self) -> Arc<PipelineConfig> {
        Arc::clone(&self.config.borrow())
    }

    /// Replace the pipeline configuration from the next flush on.
    ///
    /// The live buffer target and signal capacity of already-created buffers are
    /// not resized retroactively; the new `max_buffer` applies at the next push.
    pub fn reconfigure(&self, config: PipelineConfig) -> Result<()> {
        config.validate()?;
        self.config.send(Arc::new(config)).map_err(|_| CaptureError::SessionClosed)
    }

    /// Replace the selected routing IDs
    pub async fn set_selection(&self, ids: impl IntoIterator<Item = u32>) -> Result<()> {
        self.command(DriverCommand::SetSelection(ids.into_iter().collect())).await
    }

    /// Declare `derived` as a mirror of `source`
    pub async fn set_mirror_source(&self, derived: u32, source: u32) -> Result<()> {
        self.command(DriverCommand::SetMirrorSource { derived, source }).await
    }

    pub async fn clear_mirror_source(&self, derived: u32) -> Result<()> {
        self.command(DriverCommand::ClearMirrorSource(derived)).await
    }

    /// Drop stored frames, samples and discovered IDs
    pub async fn clear(&self) -> Result<()> {
        self.command(DriverCommand::Clear).await
    }

    async fn command(&self, command: DriverCommand) -> Result<()> {
        self.commands.send(command).await.map_err(|_| CaptureError::SessionClosed)
    }

    /// Whether the ingestion task is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the capture and wait for the final flush.
    pub async fn stop(mut self) -> Result<CaptureSummary> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the provider to end on its own and the final flush to run.
    pub async fn finished(mut self) -> Result<CaptureSummary> {
        self.join().await
    }

    async fn join(&mut self) -> Result<CaptureSummary> {
        let handle = self.handle.take().ok_or(CaptureError::SessionClosed)?;
        let summary = handle.await.map_err(|e| CaptureError::Transport {
            reason: "ingestion task failed".to_string(),
            source: Some(Box::new(e)),
        })?;
        info!("Capture stopped: {} frames in {} flushes", summary.counts.total(), summary.flushes);
        Ok(summary)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        debug!("Dropping capture session");
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifierConfig;
    use crate::decode::FieldDecoder;
    use crate::providers::{ChannelProvider, ReplayProvider};
    use crate::types::{Disposition, ExtractionConfig, FrameEvent};
    use futures::StreamExt;
    use std::time::Duration;

    fn config() -> PipelineConfig {
        PipelineConfig {
            classifier: ClassifierConfig::with_catalog([0x100, 0x200]),
            max_buffer: 100,
            overshoot_threshold: 10,
            ..PipelineConfig::default()
        }
    }

    fn burst(id: u32, start: u64, n: u64) -> Vec<FrameEvent> {
        (start..start + n).map(|ts| FrameEvent::new(id, vec![ts as u8; 8], ts)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_flushed_after_interval() {
        let _ = tracing_subscriber::fmt::try_init();
        let (tx, provider) = ChannelProvider::new(8);
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        tx.send(burst(0x100, 0, 5)).await.unwrap();
        tx.send(burst(0x300, 5, 5)).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(live.len(), 0, "nothing is visible before the flush timer fires");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(live.len(), 10);
        assert_eq!(live.version(), 1, "both batches land in a single flush");

        let summary = session.current_summary();
        assert_eq!(summary.counts.matched, 5);
        assert_eq!(summary.counts.unmatched, 5);
        assert_eq!(&*session.seen_ids(), &[0x100, 0x300]);

        let stopped = session.stop().await.unwrap();
        assert_eq!(stopped.flushes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_flushes_pending_tail() {
        let (tx, provider) = ChannelProvider::new(8);
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        tx.send(burst(0x200, 0, 3)).await.unwrap();
        tokio::task::yield_now().await;

        let summary = session.stop().await.unwrap();
        assert_eq!(summary.counts.matched, 3);
        assert_eq!(live.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_keep_arrival_order_across_flushes() {
        let (tx, provider) = ChannelProvider::new(8);
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        for chunk in 0..4u64 {
            tx.send(burst(0x100, chunk * 10, 10)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        drop(tx);
        let summary = session.finished().await.unwrap();

        assert_eq!(summary.counts.total(), 40);
        let stamps: Vec<u64> = live.snapshot().1.iter().map(|f| f.timestamp_micros()).collect();
        assert_eq!(stamps, (0..40).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn reconfigure_applies_from_next_flush() {
        let (tx, provider) = ChannelProvider::new(8);
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        tx.send(burst(0x100, 0, 2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut next = config();
        next.classifier.min_length = 16;
        session.reconfigure(next).unwrap();
        tx.send(burst(0x100, 2, 2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let dispositions: Vec<_> = live.snapshot().1.iter().map(|f| f.disposition).collect();
        assert_eq!(
            dispositions,
            vec![Disposition::Matched, Disposition::Matched, Disposition::TooShort, Disposition::TooShort]
        );

        let invalid = PipelineConfig { max_buffer: 0, ..config() };
        assert!(session.reconfigure(invalid).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn selection_drives_signal_decoding() {
        let (tx, provider) = ChannelProvider::new(8);
        let decoder = FieldDecoder::new().with_field(0x100, "first_byte", ExtractionConfig::big_endian(0, 1));
        let session = CaptureSession::start_with_decoder(provider, config(), decoder).unwrap();
        let signals = session.signals();

        tx.send(burst(0x100, 0, 3)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(signals.keys().is_empty(), "unselected frames are not decoded");

        session.set_selection([0x100]).await.unwrap();
        tx.send(burst(0x100, 3, 3)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(signals.read_ordered("first_byte"), Some((vec![3, 4, 5], vec![3.0, 4.0, 5.0])));
        assert_eq!(session.current_summary().processed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_empties_the_live_view() {
        let (tx, provider) = ChannelProvider::new(8);
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        tx.send(burst(0x100, 0, 4)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        session.clear().await.unwrap();
        tokio::task::yield_now().await;

        assert!(live.is_empty());
        assert!(session.seen_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn replay_runs_to_completion() {
        let events = burst(0x200, 0, 50).into_iter().map(|mut e| {
            e.timestamp_micros *= 1_000;
            e
        });
        let provider = ReplayProvider::new(events.collect());
        let session = CaptureSession::start(provider, config()).unwrap();
        let mut updates = session.updates();
        let live = session.live_view();

        // Initial value, then at least one flush
        updates.next().await;
        assert!(updates.next().await.is_some());

        let summary = session.finished().await.unwrap();
        assert_eq!(summary.counts.matched, 50);
        assert_eq!(live.len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_right_after_send_keeps_queued_batches() {
        let (tx, provider) = ChannelProvider::new(8);
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        tx.send(burst(0x100, 0, 4)).await.unwrap();
        tx.send(burst(0x200, 4, 4)).await.unwrap();
        tx.send(burst(0x300, 8, 4)).await.unwrap();
        let summary = session.stop().await.unwrap();

        assert_eq!(summary.counts.total(), 12);
        assert_eq!(live.len(), 12);
        assert!(tx.send(burst(0x100, 12, 1)).await.is_err());
    }

    /// Yields one batch, then fails on every call.
    struct FailingProvider {
        first: Option<Vec<FrameEvent>>,
    }

    #[async_trait::async_trait]
    impl Provider for FailingProvider {
        async fn next_batch(&mut self) -> Result<Option<Vec<FrameEvent>>> {
            match self.first.take() {
                Some(batch) => Ok(Some(batch)),
                None => Err(CaptureError::transport_failed("bus off")),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn provider_backoff_does_not_delay_flush_or_stop() {
        let provider = FailingProvider { first: Some(burst(0x100, 0, 2)) };
        let session = CaptureSession::start(provider, config()).unwrap();
        let live = session.live_view();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(live.len(), 2, "flush fires on time while the provider backs off");

        // Several errors in, the backoff is hundreds of milliseconds long
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let started = tokio::time::Instant::now();
        let summary = session.stop().await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(10));
        assert_eq!(summary.counts.total(), 2);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_start() {
        let (_tx, provider) = ChannelProvider::new(1);
        let config = PipelineConfig { flush_interval_ms: 0, ..PipelineConfig::default() };
        assert!(matches!(
            CaptureSession::start(provider, config),
            Err(CaptureError::Config { field: "flush_interval_ms", .. })
        ));
    }
}
