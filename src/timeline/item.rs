//! Timeline items and the editable timeline sequence

use std::path::{Path, PathBuf};
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PadtrackError, Result};

/// Longest gap the editing surface accepts, in seconds
pub const DEFAULT_MAX_GAP_SECS: f64 = 10.0;

/// Reference to an external audio asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipRef {
    /// Catalog identifier of the clip
    pub source_id: String,
    /// Name shown to the user and used in error messages
    pub display_name: String,
    /// Resolved path of the audio file
    pub file_path: PathBuf,
}

impl ClipRef {
    pub fn new(
        source_id: impl Into<String>,
        display_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            display_name: display_name.into(),
            file_path: file_path.into(),
        }
    }

    /// Clip whose id and display name are the file stem
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(stem.clone(), stem, path)
    }
}

/// One entry of a timeline
///
/// A clip's duration is derived by probing its source; a gap's duration is
/// authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineItem {
    Clip(ClipRef),
    Gap { duration_secs: f64 },
}

impl TimelineItem {
    pub fn clip(clip: ClipRef) -> Self {
        TimelineItem::Clip(clip)
    }

    pub fn gap(duration_secs: f64) -> Self {
        TimelineItem::Gap { duration_secs }
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, TimelineItem::Clip(_))
    }

    /// Short label for logs and listings
    pub fn label(&self) -> String {
        match self {
            TimelineItem::Clip(clip) => clip.display_name.clone(),
            TimelineItem::Gap { duration_secs } => format!("gap {:.2}s", duration_secs),
        }
    }
}

/// Shared busy flag marking a timeline as being rendered
#[derive(Debug, Clone, Default)]
pub struct RenderLock(Arc<AtomicBool>);

impl RenderLock {
    /// Acquire the lock; returns false if a render already holds it
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Ordered, editable sequence of timeline items
///
/// Storage order is playback and render order; every mutation preserves
/// the relative order of untouched items. A clone copies the items but
/// starts with its own idle render lock.
#[derive(Debug)]
pub struct Timeline {
    items: Vec<TimelineItem>,
    max_gap_secs: f64,
    lock: RenderLock,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Timeline {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            max_gap_secs: self.max_gap_secs,
            lock: RenderLock::default(),
        }
    }
}

impl PartialEq for Timeline {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl FromIterator<TimelineItem> for Timeline {
    fn from_iter<I: IntoIterator<Item = TimelineItem>>(iter: I) -> Self {
        let mut timeline = Timeline::new();
        timeline.items.extend(iter);
        timeline
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimelineItem;
    type IntoIter = slice::Iter<'a, TimelineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self::with_max_gap(DEFAULT_MAX_GAP_SECS)
    }

    /// Timeline accepting gaps up to `max_gap_secs`
    pub fn with_max_gap(max_gap_secs: f64) -> Self {
        Self {
            items: Vec::new(),
            max_gap_secs,
            lock: RenderLock::default(),
        }
    }

    pub fn items(&self) -> &[TimelineItem] {
        &self.items
    }

    pub fn iter(&self) -> slice::Iter<'_, TimelineItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimelineItem> {
        self.items.get(index)
    }

    pub fn render_lock(&self) -> &RenderLock {
        &self.lock
    }

    pub fn push_clip(&mut self, clip: ClipRef) {
        self.items.push(TimelineItem::Clip(clip));
    }

    /// Append a gap
    ///
    /// # Errors
    /// * `InvalidDuration` - If the duration is not positive, not finite, or
    ///   longer than the timeline's gap limit
    pub fn push_gap(&mut self, duration_secs: f64) -> Result<()> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 || duration_secs > self.max_gap_secs
        {
            return Err(PadtrackError::InvalidDuration { duration_secs });
        }
        self.items.push(TimelineItem::Gap { duration_secs });
        Ok(())
    }

    /// Append any item, validating gaps like [`push_gap`](Self::push_gap)
    pub fn push(&mut self, item: TimelineItem) -> Result<()> {
        match item {
            TimelineItem::Clip(clip) => {
                self.push_clip(clip);
                Ok(())
            }
            TimelineItem::Gap { duration_secs } => self.push_gap(duration_secs),
        }
    }

    /// Remove the item at `index`; out-of-range indices are a no-op
    pub fn remove_at(&mut self, index: usize) -> Option<TimelineItem> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Move an item by removing it and reinserting it at `to`
    ///
    /// Returns false without changing anything when `from == to` or either
    /// index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let len = self.items.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        true
    }

    /// Remove every instance of a clip, e.g. after it was deleted from the catalog
    ///
    /// Returns the number of items removed.
    pub fn remove_clip_everywhere(&mut self, source_id: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|item| match item {
            TimelineItem::Clip(clip) => clip.source_id != source_id,
            TimelineItem::Gap { .. } => true,
        });
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of gap durations (clip durations require probing)
    pub fn gap_duration_secs(&self) -> f64 {
        self.items
            .iter()
            .map(|item| match item {
                TimelineItem::Gap { duration_secs } => *duration_secs,
                TimelineItem::Clip(_) => 0.0,
            })
            .sum()
    }
}
