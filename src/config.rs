//! Pipeline configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierConfig;
use crate::store::{DEFAULT_MAX_BUFFER, DEFAULT_OVERSHOOT_THRESHOLD, DEFAULT_SIGNAL_CAPACITY};
use crate::types::ExtractionConfig;
use crate::{CaptureError, Result};

/// Flush cadence for frame records.
pub const FRAME_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Flush cadence for lighter-weight records (serial lines, signal samples).
pub const LIGHT_FLUSH_INTERVAL: Duration = Duration::from_millis(40);

/// Complete set of recognized ingestion options.
///
/// ```rust
/// use framestream::PipelineConfig;
///
/// let config = PipelineConfig::from_yaml_str(
///     "id_extraction: { start_byte: 0, num_bytes: 2, big_endian: true }\n\
///      classifier: { catalog_ids: [0x100], min_length: 4 }\n\
///      max_buffer: 5000\n",
/// )?;
/// assert_eq!(config.max_buffer, 5000);
/// assert_eq!(config.classifier.min_length, 4);
/// # Ok::<(), framestream::CaptureError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Layout of the routing ID in the payload. `None` keeps the transport's ID.
    pub id_extraction: Option<ExtractionConfig>,
    /// Layout of the source address. `None` keeps the transport's address.
    pub source_extraction: Option<ExtractionConfig>,
    pub classifier: ClassifierConfig,
    /// Live buffer target length
    pub max_buffer: usize,
    /// Slack above `max_buffer` tolerated before compaction
    pub overshoot_threshold: usize,
    /// Samples kept per signal series
    pub signal_capacity: usize,
    /// Flush cadence in milliseconds
    pub flush_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            id_extraction: None,
            source_extraction: None,
            classifier: ClassifierConfig::default(),
            max_buffer: DEFAULT_MAX_BUFFER,
            overshoot_threshold: DEFAULT_OVERSHOOT_THRESHOLD,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
            flush_interval_ms: FRAME_FLUSH_INTERVAL.as_millis() as u64,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::config_file(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_buffer == 0 {
            return Err(CaptureError::invalid_config("max_buffer", "must be greater than zero"));
        }
        if self.signal_capacity == 0 {
            return Err(CaptureError::invalid_config("signal_capacity", "must be greater than zero"));
        }
        if self.flush_interval_ms == 0 {
            return Err(CaptureError::invalid_config("flush_interval_ms", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Use the lighter-weight record cadence.
    pub fn with_light_cadence(mut self) -> Self {
        self.flush_interval_ms = LIGHT_FLUSH_INTERVAL.as_millis() as u64;
        self
    }
}
