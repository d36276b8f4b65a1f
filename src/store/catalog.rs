//! Clip catalog
//!
//! Resolves clip identifiers to readable audio files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::engine::io::is_supported_extension;
use crate::error::{PadtrackError, Result};
use crate::timeline::ClipRef;

/// Lookup from clip identifier to a readable file
pub trait ClipCatalog {
    /// Resolve a clip; unknown ids and unreadable files are `SourceNotFound`
    fn resolve(&self, source_id: &str) -> Result<ClipRef>;

    /// All known clips, ordered by id
    fn list(&self) -> Vec<ClipRef>;
}

/// Catalog built from the audio files in one directory, keyed by file stem
#[derive(Debug, Clone, Default)]
pub struct DirectoryCatalog {
    root: PathBuf,
    clips: BTreeMap<String, ClipRef>,
}

impl DirectoryCatalog {
    /// Scan `root` (and subdirectories) for decodable audio files
    ///
    /// On duplicate stems the first path in sorted order wins.
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(PadtrackError::Config {
                reason: format!("clip directory {} does not exist", root.display()),
            });
        }

        let mut clips = BTreeMap::new();
        let entries = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| is_supported_extension(entry.path()));

        for entry in entries {
            let clip = ClipRef::from_path(entry.path());
            clips.entry(clip.source_id.clone()).or_insert(clip);
        }

        debug!("Catalogued {} clips under {}", clips.len(), root.display());

        Ok(Self {
            root: root.to_path_buf(),
            clips,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl ClipCatalog for DirectoryCatalog {
    fn resolve(&self, source_id: &str) -> Result<ClipRef> {
        match self.clips.get(source_id) {
            Some(clip) if clip.file_path.is_file() => Ok(clip.clone()),
            Some(clip) => Err(PadtrackError::SourceNotFound {
                name: clip.display_name.clone(),
                path: clip.file_path.clone(),
            }),
            None => Err(PadtrackError::SourceNotFound {
                name: source_id.to_string(),
                path: self.root.join(source_id),
            }),
        }
    }

    fn list(&self) -> Vec<ClipRef> {
        self.clips.values().cloned().collect()
    }
}
