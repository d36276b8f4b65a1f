//! Storage Module
//!
//! Saved-track catalog and clip lookup.

pub mod catalog;
pub mod tracks;

pub use catalog::{ClipCatalog, DirectoryCatalog};
pub use tracks::{prune_orphans, JsonTrackStore, MemoryTrackStore, TrackManifest, TrackStore};
