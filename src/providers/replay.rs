//! Replay provider for recorded frame captures

use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::Result;
use crate::provider::Provider;
use crate::types::FrameEvent;

/// Default wall-clock pacing step.
const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Replays a recorded event list at (a multiple of) capture speed.
///
/// Each tick releases every event whose timestamp falls inside the next
/// `tick * speed` of capture time, preserving recorded order.
pub struct ReplayProvider {
    events: Vec<FrameEvent>,
    cursor: usize,
    /// Capture-time position, in microseconds
    position_micros: u64,
    tick: Duration,
    speed: f64,
    /// Created on first use so construction works outside a runtime
    interval: Option<Interval>,
}

impl ReplayProvider {
    /// Create a replay of `events`. Events are stably sorted by timestamp.
    pub fn new(mut events: Vec<FrameEvent>) -> Self {
        events.sort_by_key(|e| e.timestamp_micros);
        let position_micros = events.first().map_or(0, |e| e.timestamp_micros);

        info!("Loaded replay: {} frames spanning {:?}", events.len(), span(&events));

        Self {
            events,
            cursor: 0,
            position_micros,
            tick: DEFAULT_TICK,
            speed: 1.0,
            interval: None,
        }
    }

    /// Set playback speed (clamped to 0.1x..10x)
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
        debug!("Playback speed set to {}x", self.speed);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Change the wall-clock pacing step.
    pub fn set_tick(&mut self, tick: Duration) {
        self.tick = tick.max(Duration::from_millis(1));
        self.interval = None;
    }

    /// Skip ahead to the first event at or after `timestamp_micros`.
    pub fn seek_to_timestamp(&mut self, timestamp_micros: u64) {
        self.cursor = self.events.partition_point(|e| e.timestamp_micros < timestamp_micros);
        self.position_micros = timestamp_micros;
        debug!("Seeked replay to frame {}", self.cursor);
    }

    /// Frames not yet released.
    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }

    /// Total replay duration
    pub fn duration(&self) -> Duration {
        span(&self.events)
    }

    fn capture_step_micros(&self) -> u64 {
        ((self.tick.as_micros() as f64) * self.speed).max(1.0) as u64
    }
}

fn pacing_interval(tick: Duration) -> Interval {
    let mut interval = interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn span(events: &[FrameEvent]) -> Duration {
    match (events.first(), events.last()) {
        (Some(first), Some(last)) => Duration::from_micros(last.timestamp_micros - first.timestamp_micros),
        _ => Duration::ZERO,
    }
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn next_batch(&mut self) -> Result<Option<Vec<FrameEvent>>> {
        if self.cursor >= self.events.len() {
            debug!("Reached end of replay");
            return Ok(None);
        }

        let tick = self.tick;
        self.interval.get_or_insert_with(|| pacing_interval(tick)).tick().await;

        self.position_micros = self.position_micros.saturating_add(self.capture_step_micros());
        let end = self.cursor
            + self.events[self.cursor..].partition_point(|e| e.timestamp_micros < self.position_micros);
        let batch = self.events[self.cursor..end].to_vec();
        self.cursor = end;

        trace!("Replay released {} frames ({} remaining)", batch.len(), self.remaining());
        Ok(Some(batch))
    }

    fn name(&self) -> &str {
        "replay"
    }
}
