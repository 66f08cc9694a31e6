//! Bounded in-memory storage fed by the flush cycle.
//!
//! - [`FrameStore`] keeps the most recent classified frames for the live view
//! - [`SignalBuffers`] keeps one fixed-capacity [`SignalSeries`] per decoded signal
//!
//! Both are owned by a single writer (the flush task). Readers get cloneable
//! [`LiveView`] / [`SignalView`] handles that can only read.

mod frames;
mod signals;

pub use frames::{
    DEFAULT_MAX_BUFFER, DEFAULT_OVERSHOOT_THRESHOLD, FrameStore, FrameStoreWriter, LiveView,
    shared_frame_store,
};
pub use signals::{
    AlignedSeries, DEFAULT_SIGNAL_CAPACITY, SeriesStats, SignalBuffers, SignalSeries, SignalView,
    SignalWriter, align, shared_signal_buffers,
};
