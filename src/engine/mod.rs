//! Audio Engine Module
//!
//! Buffer-level building blocks for rendering:
//! - PCM buffer and format model
//! - File decoding and WAV export
//! - Format normalization
//! - Silence generation
//! - Concatenation

pub mod buffer;
pub mod concat;
pub mod io;
pub mod normalizer;
pub mod silence;

pub use buffer::{AudioBuffer, AudioFormat, CANONICAL_FORMAT};
pub use concat::{
    concatenate, concatenate_segments, concatenate_segments_into, Concatenated, PcmSegment,
};
pub use io::{decode_file, probe_duration, probe_file, write_wav, ProbeInfo};
pub use normalizer::{FormatNormalizer, Normalized};
pub use silence::{generate_silence, generate_silence_at};
