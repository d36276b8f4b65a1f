//! Padtrack - Timeline Audio Rendering & Playback
//!
//! Turns an ordered timeline of audio clips and silence gaps into either one
//! rendered WAV asset or live scheduled playback.
//!
//! # Architecture
//!
//! - `engine`: PCM buffers, decoding, format normalization, silence and
//!   concatenation
//! - `timeline`: the editable item sequence and saved-track records
//! - `render`: offline rendering into the track store
//! - `playback`: real-time scheduling of clip voices
//! - `store`: saved-track persistence and clip lookup

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod render;
pub mod store;
pub mod timeline;

pub use config::EngineConfig;
pub use error::{PadtrackError, Result};
