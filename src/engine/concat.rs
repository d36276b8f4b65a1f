//! Concatenation Engine
//!
//! Joins an ordered list of PCM segments into one buffer. Concatenation is
//! best effort: a segment that fails to read is skipped and the output is
//! truncated to the frames actually written. Callers compare the skip list
//! (or the output duration) against their item list to detect drops.

use std::borrow::Cow;

use log::{debug, warn};

use crate::engine::buffer::{AudioBuffer, AudioFormat};
use crate::engine::normalizer::FormatNormalizer;
use crate::error::{PadtrackError, Result};

// ============================================================================
// Segments
// ============================================================================

/// A source of PCM frames that may only be materialized on read
pub trait PcmSegment {
    /// Format the segment declares
    fn format(&self) -> AudioFormat;

    /// Frame count the segment declares
    fn frame_count(&self) -> usize;

    /// Materialize the samples
    fn read(&self) -> Result<Cow<'_, AudioBuffer>>;

    /// Label used in logs
    fn label(&self) -> String {
        format!("{} frames @ {}", self.frame_count(), self.format())
    }
}

impl PcmSegment for AudioBuffer {
    fn format(&self) -> AudioFormat {
        AudioBuffer::format(self)
    }

    fn frame_count(&self) -> usize {
        AudioBuffer::frame_count(self)
    }

    fn read(&self) -> Result<Cow<'_, AudioBuffer>> {
        Ok(Cow::Borrowed(self))
    }
}

impl<T: PcmSegment + ?Sized> PcmSegment for Box<T> {
    fn format(&self) -> AudioFormat {
        (**self).format()
    }

    fn frame_count(&self) -> usize {
        (**self).frame_count()
    }

    fn read(&self) -> Result<Cow<'_, AudioBuffer>> {
        (**self).read()
    }

    fn label(&self) -> String {
        (**self).label()
    }
}

// ============================================================================
// Concatenation
// ============================================================================

/// A segment dropped during concatenation
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSegment {
    /// Position of the segment in the input list
    pub index: usize,
    pub label: String,
    pub reason: String,
}

/// Result of a best-effort concatenation
#[derive(Debug, Clone)]
pub struct Concatenated {
    pub buffer: AudioBuffer,
    /// Segments that could not be read, in input order
    pub skipped: Vec<SkippedSegment>,
}

impl Concatenated {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Join owned buffers in order
///
/// A single buffer is returned as is. The output takes the first buffer's
/// format.
///
/// # Errors
/// * `EmptyTimeline` - If `buffers` is empty
pub fn concatenate(mut buffers: Vec<AudioBuffer>) -> Result<AudioBuffer> {
    match buffers.len() {
        0 => Err(PadtrackError::EmptyTimeline),
        1 => Ok(buffers.swap_remove(0)),
        _ => Ok(concatenate_segments(&buffers)?.buffer),
    }
}

/// Join segments in order in the first segment's format
///
/// # Errors
/// * `EmptyTimeline` - If `segments` is empty
pub fn concatenate_segments<S: PcmSegment>(segments: &[S]) -> Result<Concatenated> {
    let first = segments.first().ok_or(PadtrackError::EmptyTimeline)?;
    concatenate_segments_into(segments, first.format())
}

/// Join segments in order into `format`, skipping any that fail to read
///
/// Total frame count is the sum of the declared counts; each segment's
/// samples are copied at a running frame cursor, and the output is
/// truncated to the frames actually written. Segments whose channel count
/// differs from `format` are re-laid into it; a sample-rate mismatch counts
/// as a read failure. A single segment is returned as read.
///
/// # Errors
/// * `EmptyTimeline` - If `segments` is empty
pub fn concatenate_segments_into<S: PcmSegment>(
    segments: &[S],
    format: AudioFormat,
) -> Result<Concatenated> {
    let first = segments.first().ok_or(PadtrackError::EmptyTimeline)?;

    if segments.len() == 1 {
        return Ok(match first.read() {
            Ok(buffer) => Concatenated {
                buffer: buffer.into_owned(),
                skipped: Vec::new(),
            },
            Err(e) => Concatenated {
                buffer: AudioBuffer::empty(format),
                skipped: vec![skip(0, first, &e)],
            },
        });
    }

    let total_frames: usize = segments.iter().map(|s| s.frame_count()).sum();
    debug!(
        "Concatenating {} segments ({} frames @ {})",
        segments.len(),
        total_frames,
        format
    );

    let relayout = FormatNormalizer::new(format);
    let mut output: Vec<Vec<f32>> = (0..format.channels)
        .map(|_| Vec::with_capacity(total_frames))
        .collect();
    let mut cursor = 0usize;
    let mut skipped = Vec::new();

    for (index, segment) in segments.iter().enumerate() {
        let buffer = match segment
            .read()
            .and_then(|b| conform(b, format, &relayout))
        {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(
                    "Skipping segment {} ({}): {}",
                    index,
                    segment.label(),
                    e
                );
                skipped.push(skip(index, segment, &e));
                continue;
            }
        };

        for (ch, out) in output.iter_mut().enumerate() {
            out.extend_from_slice(buffer.channel(ch));
        }
        cursor += buffer.frame_count();
    }

    debug!("Wrote {} of {} frames", cursor, total_frames);

    Ok(Concatenated {
        buffer: AudioBuffer::from_planar(format, output)?,
        skipped,
    })
}

fn conform<'a>(
    buffer: Cow<'a, AudioBuffer>,
    format: AudioFormat,
    relayout: &FormatNormalizer,
) -> Result<Cow<'a, AudioBuffer>> {
    if buffer.format() == format {
        Ok(buffer)
    } else {
        relayout.convert(&buffer).map(Cow::Owned)
    }
}

fn skip<S: PcmSegment + ?Sized>(index: usize, segment: &S, error: &PadtrackError) -> SkippedSegment {
    SkippedSegment {
        index,
        label: segment.label(),
        reason: error.to_string(),
    }
}
