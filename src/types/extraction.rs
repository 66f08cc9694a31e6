//! Byte-layout field extraction

use serde::{Deserialize, Serialize};

/// Widest field the extractor accumulates, in bytes.
pub const MAX_FIELD_BYTES: u32 = 8;

/// Byte layout of an integer field inside a frame payload.
///
/// One instance governs routing-ID extraction, an optional second one governs
/// source-address extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ExtractionConfig {
    /// First byte of the field. Negative values count from the end of the payload.
    pub start_byte: i32,
    /// Field width in bytes (saturates at [`MAX_FIELD_BYTES`])
    pub num_bytes: u32,
    /// Byte order of the field
    #[serde(default)]
    pub big_endian: bool,
}

impl ExtractionConfig {
    pub fn new(start_byte: i32, num_bytes: u32, big_endian: bool) -> Self {
        Self { start_byte, num_bytes, big_endian }
    }

    /// Big-endian layout
    pub fn big_endian(start_byte: i32, num_bytes: u32) -> Self {
        Self::new(start_byte, num_bytes, true)
    }

    /// Little-endian layout
    pub fn little_endian(start_byte: i32, num_bytes: u32) -> Self {
        Self::new(start_byte, num_bytes, false)
    }

    /// Resolve `start_byte` against a payload of `len` bytes.
    ///
    /// Returns `None` when the resolved index lies at or past the end.
    pub fn resolve_start(&self, len: usize) -> Option<usize> {
        let resolved = if self.start_byte < 0 {
            (len as i64 + self.start_byte as i64).max(0) as usize
        } else {
            self.start_byte as usize
        };
        (resolved < len).then_some(resolved)
    }

    /// Extract this field from `bytes`. See [`extract`].
    pub fn extract(&self, bytes: &[u8]) -> u64 {
        extract(bytes, self)
    }
}

/// Extract an unsigned integer field from a frame payload.
///
/// Never fails: an out-of-range start yields 0 and a field running past the end
/// of the payload is truncated to the available bytes. The result depends only
/// on `(bytes, config)`, so the live path and the backend re-framing path agree.
///
/// ```rust
/// use framestream::types::{extract, ExtractionConfig};
///
/// let bytes = [0x01, 0x02, 0xAA, 0xBB];
/// assert_eq!(extract(&bytes, &ExtractionConfig::big_endian(2, 2)), 0xAABB);
/// assert_eq!(extract(&bytes, &ExtractionConfig::little_endian(-2, 2)), 0xBBAA);
/// ```
pub fn extract(bytes: &[u8], config: &ExtractionConfig) -> u64 {
    let Some(resolved) = config.resolve_start(bytes.len()) else {
        return 0;
    };

    let width = config.num_bytes.min(MAX_FIELD_BYTES) as usize;
    let end = resolved + width.min(bytes.len() - resolved);
    let field = &bytes[resolved..end];

    if config.big_endian {
        field.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
    } else {
        field.iter().enumerate().fold(0u64, |acc, (i, &b)| acc | ((b as u64) << (8 * i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BYTES: [u8; 4] = [0x01, 0x02, 0xAA, 0xBB];

    #[test]
    fn big_endian_from_start_offset() {
        assert_eq!(extract(&BYTES, &ExtractionConfig::big_endian(2, 2)), 0xAABB);
    }

    #[test]
    fn negative_start_counts_from_end() {
        assert_eq!(extract(&BYTES, &ExtractionConfig::little_endian(-2, 2)), 0xBBAA);
    }

    #[test]
    fn negative_start_past_beginning_clamps_to_zero() {
        assert_eq!(extract(&BYTES, &ExtractionConfig::big_endian(-10, 2)), 0x0102);
    }

    #[test]
    fn start_past_end_yields_zero() {
        assert_eq!(extract(&BYTES, &ExtractionConfig::big_endian(4, 2)), 0);
        assert_eq!(extract(&BYTES, &ExtractionConfig::big_endian(100, 1)), 0);
        assert_eq!(extract(&[], &ExtractionConfig::little_endian(0, 4)), 0);
    }

    #[test]
    fn field_is_truncated_at_payload_end() {
        assert_eq!(extract(&BYTES, &ExtractionConfig::big_endian(3, 4)), 0xBB);
        assert_eq!(extract(&BYTES, &ExtractionConfig::little_endian(2, 4)), 0xBBAA);
    }

    #[test]
    fn zero_width_yields_zero() {
        assert_eq!(extract(&BYTES, &ExtractionConfig::big_endian(0, 0)), 0);
    }

    #[test]
    fn width_saturates_at_eight_bytes() {
        let bytes: Vec<u8> = (1..=12).collect();
        let be = extract(&bytes, &ExtractionConfig::big_endian(0, 12));
        assert_eq!(be, 0x0102_0304_0506_0708);
        let le = extract(&bytes, &ExtractionConfig::little_endian(0, 12));
        assert_eq!(le, 0x0807_0605_0403_0201);
    }

    #[test]
    fn config_deserializes_from_yaml() {
        let config: ExtractionConfig =
            serde_yaml_ng::from_str("start_byte: -2\nnum_bytes: 2\n").unwrap();
        assert_eq!(config, ExtractionConfig::little_endian(-2, 2));
    }
}
