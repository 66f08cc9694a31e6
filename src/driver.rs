//! Driver spawns and runs the ingestion task

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::PipelineConfig;
use crate::ingest::{Batcher, CaptureSummary, Pipeline, Schedule};
use crate::provider::Provider;
use crate::types::FrameEvent;

/// Depth of the control channel into the ingestion task.
pub(crate) const COMMAND_DEPTH: usize = 32;

/// Selection and store control messages for the ingestion task.
#[derive(Debug, Clone)]
pub enum DriverCommand {
    /// Replace the selected routing IDs
    SetSelection(Vec<u32>),
    /// Declare `derived` as a mirror of `source`
    SetMirrorSource { derived: u32, source: u32 },
    /// Remove a mirror declaration
    ClearMirrorSource(u32),
    /// Drop stored frames, samples and discovered IDs
    Clear,
}

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Capture totals, updated after every flush
    pub updates: watch::Receiver<CaptureSummary>,
    /// Routing IDs seen so far, sorted
    pub discovered: watch::Receiver<Arc<[u32]>>,
    /// Control messages into the task
    pub commands: mpsc::Sender<DriverCommand>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves to the final totals once the last flush has run
    pub handle: JoinHandle<CaptureSummary>,
}

/// Driver spawns and manages the ingestion task
///
/// The task owns the provider, the batcher and the pipeline (and through it the
/// write side of the stores). All store mutation happens inside this one task,
/// one flush at a time.
pub struct Driver;

impl Driver {
    /// Spawn the ingestion task for the given provider
    ///
    /// `config` is re-read at every flush, so updates sent through it apply from
    /// the next flush on.
    pub fn spawn<P>(
        provider: P,
        pipeline: Pipeline,
        config: watch::Receiver<Arc<PipelineConfig>>,
    ) -> DriverChannels
    where
        P: Provider,
    {
        let (update_tx, update_rx) = watch::channel(pipeline.summary());
        let no_ids: Arc<[u32]> = Arc::from(Vec::new());
        let (discovered_tx, discovered_rx) = watch::channel(no_ids);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_DEPTH);
        let cancel = CancellationToken::new();

        let task = IngestTask {
            pipeline,
            config,
            commands: command_rx,
            updates: update_tx,
            discovered: discovered_tx,
        };
        let cancel_task = cancel.clone();
        let handle = tokio::spawn(async move { task.run(provider, cancel_task).await });

        DriverChannels {
            updates: update_rx,
            discovered: discovered_rx,
            commands: command_tx,
            cancel,
            handle,
        }
    }
}

struct IngestTask {
    pipeline: Pipeline,
    config: watch::Receiver<Arc<PipelineConfig>>,
    commands: mpsc::Receiver<DriverCommand>,
    updates: watch::Sender<CaptureSummary>,
    discovered: watch::Sender<Arc<[u32]>>,
}

impl IngestTask {
    async fn run<P: Provider>(mut self, mut provider: P, cancel: CancellationToken) -> CaptureSummary {
        info!("Ingestion task started ({})", provider.name());
        const MAX_ERRORS: u32 = 10;

        let mut config = self.config.borrow_and_update().clone();
        let mut batcher: Batcher<FrameEvent> = Batcher::new(config.flush_interval());
        self.pipeline.set_overshoot_threshold(config.overshoot_threshold);

        let mut deadline: Option<Instant> = None;
        let mut retry_at: Option<Instant> = None;
        let mut error_count = 0u32;
        let mut batch_count = 0u64;
        let mut source_open = true;
        let mut config_open = true;
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Ingestion task cancelled");
                    break;
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    let events = batcher.take_pending();
                    self.flush(events, &config);
                    if !source_open {
                        break;
                    }
                }

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    retry_at = None;
                }

                changed = self.config.changed(), if config_open => {
                    match changed {
                        Ok(()) => {
                            config = self.config.borrow_and_update().clone();
                            batcher.set_interval(config.flush_interval());
                            self.pipeline.set_overshoot_threshold(config.overshoot_threshold);
                            debug!("Pipeline reconfigured; applies from next flush");
                        }
                        Err(_) => config_open = false,
                    }
                }

                command = self.commands.recv(), if commands_open => {
                    match command {
                        Some(command) => self.apply(command),
                        None => commands_open = false,
                    }
                }

                result = provider.next_batch(), if source_open && retry_at.is_none() => {
                    match result {
                        Ok(Some(batch)) => {
                            error_count = 0;
                            batch_count += 1;
                            trace!("Batch {}: {} events", batch_count, batch.len());
                            if let Schedule::Arm(interval) = batcher.enqueue(batch) {
                                deadline = Some(Instant::now() + interval);
                            }
                        }
                        Ok(None) => {
                            info!("Provider ended after {} batches", batch_count);
                            source_open = false;
                            if deadline.is_none() {
                                break;
                            }
                        }
                        Err(e) => {
                            // Transport error - don't crash on transient failures
                            error_count += 1;
                            error!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                            if error_count >= MAX_ERRORS {
                                error!("Too many provider errors, stopping capture");
                                break;
                            }

                            // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s.
                            // The provider is not polled until retry_at; other arms stay live.
                            let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                            retry_at = Some(Instant::now() + backoff);
                        }
                    }
                }
            }
        }

        // Batches the transport already handed over belong to this capture
        for batch in provider.drain_buffered() {
            batcher.enqueue(batch);
        }

        // Final flush so the tail of the capture is never dropped
        if let Some(tail) = batcher.drain_final() {
            debug!("Final flush of {} pending events", tail.len());
            self.flush(tail, &config);
        }

        let summary = self.pipeline.summary();
        info!(
            "Ingestion task ended ({} flushes, {} frames)",
            summary.flushes,
            summary.counts.total()
        );
        summary
    }

    fn flush(&mut self, events: Vec<FrameEvent>, config: &Arc<PipelineConfig>) {
        if events.is_empty() {
            return;
        }
        let stats = self.pipeline.flush(events, config);
        if !stats.new_ids.is_empty() {
            self.publish_discovered();
        }
        // Receivers may all be gone; the stores remain readable through views
        let _ = self.updates.send(self.pipeline.summary());
    }

    fn apply(&mut self, command: DriverCommand) {
        debug!("Applying {:?}", command);
        match command {
            DriverCommand::SetSelection(ids) => self.pipeline.selection_mut().set_selected(ids),
            DriverCommand::SetMirrorSource { derived, source } => {
                self.pipeline.selection_mut().set_mirror_source(derived, source)
            }
            DriverCommand::ClearMirrorSource(derived) => {
                if self.pipeline.selection_mut().clear_mirror_source(derived).is_none() {
                    warn!("No mirror source registered for {:#x}", derived);
                }
            }
            DriverCommand::Clear => {
                self.pipeline.clear();
                self.publish_discovered();
                let _ = self.updates.send(self.pipeline.summary());
            }
        }
    }

    fn publish_discovered(&self) {
        let ids: Arc<[u32]> = self.pipeline.selection().seen_sorted().into();
        let _ = self.discovered.send(ids);
    }
}
