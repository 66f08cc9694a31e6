//! Core types for frame capture data.
//!
//! This module provides the foundational data structures that flow through the
//! ingestion pipeline:
//! - [`FrameEvent`] is a raw frame as produced by the transport, with zero-copy payload
//! - [`ExtractionConfig`] describes where an integer routing field lives in the payload
//! - [`extract`] reads that field, never failing on out-of-range layouts
//! - [`ClassifiedFrame`] pairs an event with its [`Disposition`]
//!
//! ## Usage Example
//!
//! ```rust
//! use framestream::types::{ExtractionConfig, FrameEvent};
//!
//! let event = FrameEvent::new(0, vec![0x7E, 0x01, 0x23, 0x00], 1_000);
//! let layout = ExtractionConfig::big_endian(1, 2);
//!
//! assert_eq!(layout.extract(&event.bytes), 0x0123);
//! ```

mod extraction;
mod frame;

pub use extraction::{ExtractionConfig, MAX_FIELD_BYTES, extract};
pub use frame::{ClassifiedFrame, Disposition, FrameEvent};
