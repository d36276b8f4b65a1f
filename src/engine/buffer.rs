//! Audio Buffer and Format Model
//!
//! All engine buffers are planar 32-bit float. Rendering normalizes every
//! source to [`CANONICAL_FORMAT`] (44.1kHz stereo) before concatenation.

use std::fmt;

use crate::error::{PadtrackError, Result};

// ============================================================================
// Audio Format
// ============================================================================

/// Sample rate and channel count of a PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

/// Normalization target for every render (44.1kHz, stereo)
pub const CANONICAL_FORMAT: AudioFormat = AudioFormat {
    sample_rate: 44100,
    channels: 2,
};

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of frames covering `duration_secs`, rounded to the nearest frame
    ///
    /// Non-positive and non-finite durations map to zero frames.
    pub fn frames_for(&self, duration_secs: f64) -> usize {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return 0;
        }
        (duration_secs * self.sample_rate as f64).round() as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        CANONICAL_FORMAT
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Immutable in-memory PCM buffer
///
/// Stores audio as non-interleaved 32-bit floating point samples, one
/// `Vec<f32>` per channel. Every channel holds exactly `frame_count()`
/// samples. Transforms produce a new buffer.
///
/// # Example
/// ```
/// use padtrack::engine::buffer::{AudioBuffer, CANONICAL_FORMAT};
///
/// let buffer = AudioBuffer::silent(CANONICAL_FORMAT, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.frame_count(), 44100);
/// assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    format: AudioFormat,
    samples: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a zero-filled buffer
    pub fn silent(format: AudioFormat, frames: usize) -> Self {
        Self {
            format,
            samples: vec![vec![0.0_f32; frames]; format.channels as usize],
        }
    }

    /// Create an empty buffer (zero frames) in the given format
    pub fn empty(format: AudioFormat) -> Self {
        Self::silent(format, 0)
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Fails if the channel count disagrees with `format` or the channels
    /// have different lengths.
    pub fn from_planar(format: AudioFormat, samples: Vec<Vec<f32>>) -> Result<Self> {
        if samples.len() != format.channels as usize {
            return Err(PadtrackError::ConversionFailure {
                reason: format!(
                    "{} channel vectors supplied for a {}-channel format",
                    samples.len(),
                    format.channels
                ),
            });
        }

        let frames = samples.first().map(Vec::len).unwrap_or(0);
        if samples.iter().any(|ch| ch.len() != frames) {
            return Err(PadtrackError::ConversionFailure {
                reason: "channel lengths differ".to_string(),
            });
        }

        Ok(Self { format, samples })
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    pub fn from_interleaved(interleaved: &[f32], format: AudioFormat) -> Result<Self> {
        let num_channels = format.channels as usize;
        if num_channels == 0 {
            return Err(PadtrackError::ConversionFailure {
                reason: "zero-channel format".to_string(),
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(PadtrackError::ConversionFailure {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
            });
        }

        let frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self { format, samples })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frame_count();
        let mut interleaved = Vec::with_capacity(frames * self.channels());
        for frame in 0..frames {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    #[inline]
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.samples.first().map(Vec::len).unwrap_or(0)
    }

    /// Total number of samples across all channels
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.frame_count() * self.channels()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.format.sample_rate as f64
    }

    /// Samples of one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get a sample at the specified channel and frame
    #[inline]
    pub fn get_sample(&self, channel: usize, frame: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(frame).copied())
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// True when every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().flat_map(|ch| ch.iter()).all(|&s| s == 0.0)
    }

    /// Take the per-channel sample vectors
    pub fn into_planar(self) -> Vec<Vec<f32>> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_buffer() {
        let buffer = AudioBuffer::silent(CANONICAL_FORMAT, 100);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frame_count(), 100);
        assert_eq!(buffer.sample_count(), 200);
        assert!(buffer.is_silent());
    }

    #[test]
    fn test_frames_for_rounds() {
        assert_eq!(CANONICAL_FORMAT.frames_for(0.5), 22050);
        // 0.00001s * 44100 = 0.441 -> 0
        assert_eq!(CANONICAL_FORMAT.frames_for(0.00001), 0);
        // 0.00002s * 44100 = 0.882 -> 1
        assert_eq!(CANONICAL_FORMAT.frames_for(0.00002), 1);
        assert_eq!(CANONICAL_FORMAT.frames_for(-1.0), 0);
        assert_eq!(CANONICAL_FORMAT.frames_for(f64::NAN), 0);
    }

    #[test]
    fn test_from_interleaved_stereo() {
        let buffer =
            AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4], CANONICAL_FORMAT).unwrap();
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.get_sample(0, 1), Some(0.3));
        assert_eq!(buffer.get_sample(1, 0), Some(0.2));
        assert_eq!(buffer.to_interleaved(), vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_from_interleaved_invalid() {
        let result = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3], CANONICAL_FORMAT);
        assert!(matches!(
            result,
            Err(PadtrackError::ConversionFailure { .. })
        ));
    }

    #[test]
    fn test_from_planar_rejects_ragged_channels() {
        let result = AudioBuffer::from_planar(CANONICAL_FORMAT, vec![vec![0.0; 3], vec![0.0; 2]]);
        assert!(result.is_err());

        let result = AudioBuffer::from_planar(CANONICAL_FORMAT, vec![vec![0.0; 3]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_and_peak() {
        let format = AudioFormat::new(1000, 1);
        let buffer = AudioBuffer::from_planar(format, vec![vec![0.0, -0.75, 0.5, 0.0]]).unwrap();
        assert!((buffer.duration_secs() - 0.004).abs() < 1e-12);
        assert_eq!(buffer.peak(), 0.75);
        assert!(!buffer.is_silent());
    }
}
