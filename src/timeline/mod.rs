//! Timeline Module
//!
//! The editable sequence of clips and gaps, and the saved-track record
//! produced from it.

pub mod item;
pub mod track;

pub use item::{ClipRef, RenderLock, Timeline, TimelineItem, DEFAULT_MAX_GAP_SECS};
pub use track::{RenderedTrack, SnapshotItem};
