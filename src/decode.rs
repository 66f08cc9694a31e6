//! Signal decoding seam between classified frames and the signal buffers

use std::collections::HashMap;

use crate::types::{ClassifiedFrame, ExtractionConfig};

/// One decoded sample destined for a signal series.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSample {
    pub key: String,
    pub timestamp_micros: u64,
    pub value: f64,
}

/// Turns frames that require processing into signal samples.
///
/// Implementations are called from the flush task, once per processed frame,
/// in arrival order. Mux-dependent decoders may rely on that ordering.
pub trait FrameDecoder: Send + 'static {
    /// Append the samples carried by `frame` to `out`.
    fn decode(&mut self, frame: &ClassifiedFrame, out: &mut Vec<SignalSample>);
}

impl<F> FrameDecoder for F
where
    F: FnMut(&ClassifiedFrame, &mut Vec<SignalSample>) + Send + 'static,
{
    fn decode(&mut self, frame: &ClassifiedFrame, out: &mut Vec<SignalSample>) {
        self(frame, out)
    }
}

#[derive(Debug, Clone)]
struct FieldSignal {
    key: String,
    layout: ExtractionConfig,
}

/// Decoder emitting raw unsigned integer fields, keyed by masked routing ID.
///
/// No scaling or sign handling is applied; values are the extracted integers.
#[derive(Debug, Clone, Default)]
pub struct FieldDecoder {
    fields: HashMap<u32, Vec<FieldSignal>>,
}

impl FieldDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `key` from frames with masked ID `id` using `layout`.
    pub fn with_field(mut self, id: u32, key: impl Into<String>, layout: ExtractionConfig) -> Self {
        self.add_field(id, key, layout);
        self
    }

    pub fn add_field(&mut self, id: u32, key: impl Into<String>, layout: ExtractionConfig) {
        self.fields.entry(id).or_default().push(FieldSignal { key: key.into(), layout });
    }

    pub fn field_count(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }
}

impl FrameDecoder for FieldDecoder {
    fn decode(&mut self, frame: &ClassifiedFrame, out: &mut Vec<SignalSample>) {
        let Some(fields) = self.fields.get(&frame.masked_id) else {
            return;
        };
        out.extend(fields.iter().map(|field| SignalSample {
            key: field.key.clone(),
            timestamp_micros: frame.timestamp_micros(),
            value: field.layout.extract(frame.bytes()) as f64,
        }));
    }
}
