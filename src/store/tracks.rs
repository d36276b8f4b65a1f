//! Track Store
//!
//! Durable catalog of saved tracks. Records are append-only apart from an
//! explicit delete, which also removes the backing asset file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::engine::io::file_sha256;
use crate::error::{PadtrackError, Result};
use crate::timeline::RenderedTrack;

/// Extension of rendered assets
const ASSET_EXTENSION: &str = "wav";

/// Catalog of saved tracks
///
/// Shared between the renderer (which inserts from a worker thread) and the
/// caller, so all methods take `&self`.
pub trait TrackStore: Send + Sync {
    /// Add a new record
    fn insert(&self, track: RenderedTrack) -> Result<()>;

    /// All records, most recent first
    fn list_all(&self) -> Result<Vec<RenderedTrack>>;

    /// Remove a record and its asset file, returning the removed record
    fn delete(&self, id: Uuid) -> Result<RenderedTrack>;

    /// Look up one record
    fn get(&self, id: Uuid) -> Result<RenderedTrack> {
        self.list_all()?
            .into_iter()
            .find(|track| track.id == id)
            .ok_or_else(|| PadtrackError::TrackNotFound { id: id.to_string() })
    }

    /// Check a track's asset against its recorded checksum
    ///
    /// Composition-only tracks and tracks without a checksum verify as long
    /// as their asset (if any) exists.
    fn verify(&self, id: Uuid) -> Result<bool> {
        let track = self.get(id)?;
        let Some(asset) = track.asset() else {
            return Ok(true);
        };
        if !asset.is_file() {
            return Ok(false);
        }
        match &track.asset_sha256 {
            Some(expected) => Ok(&file_sha256(asset)? == expected),
            None => Ok(true),
        }
    }
}

/// Remove a track's asset, tolerating an already-missing file
fn remove_asset(track: &RenderedTrack) -> Result<()> {
    let Some(asset) = track.asset() else {
        return Ok(());
    };
    match fs::remove_file(asset) {
        Ok(()) => {
            info!("Removed asset {}", asset.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Asset {} was already gone", asset.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn sort_most_recent_first(tracks: &mut [RenderedTrack]) {
    tracks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ============================================================================
// In-memory store
// ============================================================================

/// Track store held in memory
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    tracks: Mutex<Vec<RenderedTrack>>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RenderedTrack>> {
        self.tracks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TrackStore for MemoryTrackStore {
    fn insert(&self, track: RenderedTrack) -> Result<()> {
        self.lock().push(track);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<RenderedTrack>> {
        let mut tracks = self.lock().clone();
        sort_most_recent_first(&mut tracks);
        Ok(tracks)
    }

    fn delete(&self, id: Uuid) -> Result<RenderedTrack> {
        let mut tracks = self.lock();
        let index = tracks
            .iter()
            .position(|track| track.id == id)
            .ok_or_else(|| PadtrackError::TrackNotFound { id: id.to_string() })?;
        let removed = tracks.remove(index);
        drop(tracks);

        remove_asset(&removed)?;
        Ok(removed)
    }
}

// ============================================================================
// JSON manifest store
// ============================================================================

/// Manifest file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackManifest {
    pub tracks: Vec<RenderedTrack>,
}

/// Track store persisted as a JSON manifest
pub struct JsonTrackStore {
    manifest_path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonTrackStore {
    pub fn new(manifest_path: &Path) -> Self {
        Self {
            manifest_path: manifest_path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Load the manifest from disk; a missing file is an empty manifest
    pub fn load_manifest(&self) -> Result<TrackManifest> {
        if !self.manifest_path.exists() {
            return Ok(TrackManifest::default());
        }
        let content = fs::read_to_string(&self.manifest_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the manifest to disk
    pub fn save_manifest(&self, manifest: &TrackManifest) -> Result<()> {
        if let Some(parent) = self.manifest_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(manifest)?;
        fs::write(&self.manifest_path, content)?;
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut TrackManifest) -> Result<T>) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut manifest = self.load_manifest()?;
        let value = f(&mut manifest)?;
        self.save_manifest(&manifest)?;
        Ok(value)
    }
}

impl TrackStore for JsonTrackStore {
    fn insert(&self, track: RenderedTrack) -> Result<()> {
        info!("Saving track '{}' ({})", track.name, track.id);
        self.modify(|manifest| {
            manifest.tracks.push(track);
            Ok(())
        })
    }

    fn list_all(&self) -> Result<Vec<RenderedTrack>> {
        let mut tracks = self.load_manifest()?.tracks;
        sort_most_recent_first(&mut tracks);
        Ok(tracks)
    }

    fn delete(&self, id: Uuid) -> Result<RenderedTrack> {
        let removed = self.modify(|manifest| {
            let index = manifest
                .tracks
                .iter()
                .position(|track| track.id == id)
                .ok_or_else(|| PadtrackError::TrackNotFound { id: id.to_string() })?;
            Ok(manifest.tracks.remove(index))
        })?;

        info!("Deleted track '{}' ({})", removed.name, removed.id);
        remove_asset(&removed)?;
        Ok(removed)
    }
}

/// Delete rendered assets in `output_dir` that no stored track references
///
/// Returns the removed paths.
pub fn prune_orphans(store: &dyn TrackStore, output_dir: &Path) -> Result<Vec<PathBuf>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }

    let referenced: HashSet<PathBuf> = store
        .list_all()?
        .iter()
        .filter_map(|track| track.asset().map(canonical_or_self))
        .collect();

    let orphans: Vec<PathBuf> = WalkDir::new(output_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case(ASSET_EXTENSION))
                .unwrap_or(false)
        })
        .filter(|path| !referenced.contains(&canonical_or_self(path)))
        .collect();

    for path in &orphans {
        fs::remove_file(path)?;
        info!("Pruned orphaned asset {}", path.display());
    }

    Ok(orphans)
}

fn canonical_or_self(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
