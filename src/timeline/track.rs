//! Rendered tracks and their frozen timeline snapshots

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timeline::item::{Timeline, TimelineItem};

/// One frozen timeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    /// Index of the item in the timeline it was taken from
    pub position: usize,
    pub item: TimelineItem,
    /// Duration as resolved when the snapshot was taken
    pub duration_secs: f64,
}

/// A saved track as held by the track store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedTrack {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Sum of per-item durations as actually rendered
    pub total_duration_secs: f64,
    /// Rendered WAV asset; empty for composition-only tracks
    #[serde(default)]
    pub asset_path: PathBuf,
    /// SHA-256 of the asset recorded after the post-write check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_sha256: Option<String>,
    pub snapshot: Vec<SnapshotItem>,
}

impl RenderedTrack {
    pub fn new(
        name: impl Into<String>,
        asset_path: PathBuf,
        total_duration_secs: f64,
        snapshot: Vec<SnapshotItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            total_duration_secs,
            asset_path,
            asset_sha256: None,
            snapshot,
        }
    }

    /// True when no audio asset backs this track
    pub fn is_composition_only(&self) -> bool {
        self.asset_path.as_os_str().is_empty()
    }

    pub fn asset(&self) -> Option<&Path> {
        if self.is_composition_only() {
            None
        } else {
            Some(&self.asset_path)
        }
    }

    /// Snapshot entries ordered by original position
    pub fn ordered_snapshot(&self) -> Vec<&SnapshotItem> {
        let mut items: Vec<&SnapshotItem> = self.snapshot.iter().collect();
        items.sort_by_key(|entry| entry.position);
        items
    }

    /// Rebuild an editable timeline from the snapshot
    pub fn to_timeline(&self) -> Timeline {
        self.ordered_snapshot()
            .into_iter()
            .map(|entry| entry.item.clone())
            .collect()
    }
}
