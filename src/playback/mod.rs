//! Playback Module
//!
//! Live, scheduled playback of a timeline or saved track.

pub mod clock;
pub mod scheduler;
pub mod voice;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{
    PlaybackEvent, PlaybackScheduler, PlaybackState, MAX_LOOP_RESTARTS_PER_TICK,
};
pub use voice::{DecodedVoiceBackend, Voice, VoiceBackend, VoicePool};
