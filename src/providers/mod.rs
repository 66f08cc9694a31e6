//! Built-in frame providers.
//!
//! - [`ChannelProvider`] receives batches pushed by an in-process transport task
//! - [`ReplayProvider`] paces a recorded capture back at a chosen speed

mod channel;
mod replay;

pub use channel::{ChannelProvider, DEFAULT_CHANNEL_DEPTH, FrameSender};
pub use replay::ReplayProvider;
