//! Silence generation for timeline gaps

use crate::engine::buffer::{AudioBuffer, AudioFormat};

/// Generate a zero-filled buffer lasting `duration_secs`
///
/// Frame count is `round(duration_secs * sample_rate)`. Gap durations are
/// validated when they enter a timeline; a non-positive or non-finite
/// duration reaching this point yields an empty buffer.
///
/// # Example
/// ```
/// use padtrack::engine::buffer::CANONICAL_FORMAT;
/// use padtrack::engine::silence::generate_silence;
///
/// let gap = generate_silence(0.5, CANONICAL_FORMAT);
/// assert_eq!(gap.frame_count(), 22050);
/// assert!(gap.is_silent());
/// ```
pub fn generate_silence(duration_secs: f64, format: AudioFormat) -> AudioBuffer {
    AudioBuffer::silent(format, format.frames_for(duration_secs))
}

/// Generate silence for a gap starting `start_secs` into a render
///
/// Frames are allotted on the render's global frame grid,
/// `round((start + duration) * rate) - round(start * rate)`, so a run of
/// gaps totals `round(sum * rate)` frames instead of accumulating one
/// rounding error per gap. With `start_secs == 0.0` this is
/// [`generate_silence`].
pub fn generate_silence_at(start_secs: f64, duration_secs: f64, format: AudioFormat) -> AudioBuffer {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return AudioBuffer::empty(format);
    }
    let start = format.frames_for(start_secs);
    let end = format.frames_for(start_secs.max(0.0) + duration_secs);
    AudioBuffer::silent(format, end.saturating_sub(start))
}
