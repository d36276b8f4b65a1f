//! Format Normalization
//!
//! Brings decoded clips into the render format. Only channel layout is
//! adapted; sample rates are never converted. A failed conversion is not
//! fatal: the decoded buffer is handed back unconverted so the render can
//! keep moving.

use std::path::Path;

use log::{debug, warn};

use crate::engine::buffer::{AudioBuffer, AudioFormat, CANONICAL_FORMAT};
use crate::engine::io::decode_file;
use crate::error::{PadtrackError, Result};

/// Outcome of normalizing one clip
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Decoded buffer already matched the target format
    Native(AudioBuffer),
    /// Buffer was converted to the target format
    Converted(AudioBuffer),
    /// Conversion failed; the decoded buffer is returned in its own format
    Fallback { buffer: AudioBuffer, reason: String },
}

impl Normalized {
    pub fn into_buffer(self) -> AudioBuffer {
        match self {
            Normalized::Native(buffer)
            | Normalized::Converted(buffer)
            | Normalized::Fallback { buffer, .. } => buffer,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback { .. })
    }
}

/// Decodes source clips and converts them to a target format
#[derive(Debug, Clone, Copy)]
pub struct FormatNormalizer {
    target: AudioFormat,
}

impl Default for FormatNormalizer {
    fn default() -> Self {
        Self::new(CANONICAL_FORMAT)
    }
}

impl FormatNormalizer {
    pub fn new(target: AudioFormat) -> Self {
        Self { target }
    }

    pub fn target(&self) -> AudioFormat {
        self.target
    }

    /// Decode `path` and return it in the target format when possible
    ///
    /// # Errors
    /// * `SourceNotFound` - If the path does not resolve to a readable file
    /// * `UnsupportedFormat` - If the container cannot be decoded at all
    pub fn normalize(&self, path: &Path, name: &str) -> Result<AudioBuffer> {
        Ok(self.normalize_detailed(path, name)?.into_buffer())
    }

    /// Like [`normalize`](Self::normalize) but reports which path was taken
    pub fn normalize_detailed(&self, path: &Path, name: &str) -> Result<Normalized> {
        let decoded = decode_file(path, name)?;
        Ok(self.normalize_buffer(decoded, name))
    }

    /// Normalize an already-decoded buffer
    pub fn normalize_buffer(&self, decoded: AudioBuffer, name: &str) -> Normalized {
        if decoded.format() == self.target {
            debug!("{}: already {}, using as is", name, self.target);
            return Normalized::Native(decoded);
        }

        match self.convert(&decoded) {
            Ok(converted) => {
                debug!(
                    "{}: converted {} -> {}",
                    name,
                    decoded.format(),
                    self.target
                );
                Normalized::Converted(converted)
            }
            Err(e) => {
                warn!("{}: {}; falling back to original format", name, e);
                Normalized::Fallback {
                    buffer: decoded,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Same-rate, channel-count-limited copy into the target format
    ///
    /// The first `min(source, target)` channels are copied sample for
    /// sample. Extra target channels stay silent; extra source channels
    /// are dropped.
    pub fn convert(&self, source: &AudioBuffer) -> Result<AudioBuffer> {
        let format = source.format();
        if format.sample_rate != self.target.sample_rate {
            return Err(PadtrackError::ConversionFailure {
                reason: format!(
                    "sample rate {}Hz differs from {}Hz (resampling is not supported)",
                    format.sample_rate, self.target.sample_rate
                ),
            });
        }
        if source.channels() == 0 || self.target.channels == 0 {
            return Err(PadtrackError::ConversionFailure {
                reason: "zero-channel audio".to_string(),
            });
        }

        let frames = source.frame_count();
        let shared = source.channels().min(self.target.channels as usize);
        let channels = (0..self.target.channels as usize)
            .map(|ch| {
                if ch < shared {
                    source.channel(ch).to_vec()
                } else {
                    vec![0.0_f32; frames]
                }
            })
            .collect();

        AudioBuffer::from_planar(self.target, channels)
    }
}
