//! Render Module
//!
//! Offline rendering of a timeline into a saved track, inline or on a
//! background worker.

pub mod job;
pub mod renderer;

pub use job::{RenderEvent, RenderGuard, RenderJob};
pub use renderer::{
    asset_file_name, CancelToken, NoopObserver, RenderObserver, RenderState, TimelineRenderer,
};
