//! Timeline Renderer
//!
//! Turns a timeline into one WAV asset plus a saved-track record.
//!
//! Clip read failures (missing file, undecodable container) abort the whole
//! render. Conversion failures are absorbed by the normalizer and
//! concatenation read failures by the concatenation engine; both only
//! surface as warnings.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::{EngineConfig, DEFAULT_UNKNOWN_CLIP_DURATION_SECS};
use crate::engine::buffer::AudioBuffer;
use crate::engine::concat::concatenate_segments_into;
use crate::engine::io::{file_sha256, probe_duration, probe_file, write_wav_to};
use crate::engine::normalizer::{FormatNormalizer, Normalized};
use crate::engine::silence::generate_silence_at;
use crate::error::{PadtrackError, Result};
use crate::store::TrackStore;
use crate::timeline::{RenderedTrack, SnapshotItem, Timeline, TimelineItem};

// ============================================================================
// State and Observers
// ============================================================================

/// Render progress through its stages
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Preparing,
    /// Processing the item at this index
    PerItem(usize),
    Concatenating,
    Writing,
    Done,
    /// Terminal; carries the progress reached before the failure
    Failed { reason: String, progress: f64 },
}

impl RenderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderState::Done | RenderState::Failed { .. })
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Idle => write!(f, "Idle"),
            RenderState::Preparing => write!(f, "Preparing"),
            RenderState::PerItem(index) => write!(f, "Item {}", index),
            RenderState::Concatenating => write!(f, "Concatenating"),
            RenderState::Writing => write!(f, "Writing"),
            RenderState::Done => write!(f, "Done"),
            RenderState::Failed { reason, progress } => {
                write!(f, "Failed at {:.0}%: {}", progress * 100.0, reason)
            }
        }
    }
}

/// Receives state transitions and progress from a render
pub trait RenderObserver {
    fn on_state(&mut self, _state: &RenderState) {}

    /// Fraction of items completed, `0.0..=1.0`
    fn on_progress(&mut self, _progress: f64) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RenderObserver for NoopObserver {}

/// Progress-only observer from a closure
impl<F: FnMut(f64)> RenderObserver for F {
    fn on_progress(&mut self, progress: f64) {
        self(progress)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared flag checked by the renderer between items
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Offline renderer writing into an output directory and a track store
#[derive(Clone)]
pub struct TimelineRenderer {
    output_dir: PathBuf,
    store: Arc<dyn TrackStore>,
    normalizer: FormatNormalizer,
    strict_formats: bool,
    unknown_clip_duration_secs: f64,
}

impl fmt::Debug for TimelineRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineRenderer")
            .field("output_dir", &self.output_dir)
            .field("target", &self.normalizer.target())
            .field("strict_formats", &self.strict_formats)
            .finish()
    }
}

/// Tracks stage and progress so a failure can report where it stopped
struct Reporter<'a> {
    observer: &'a mut dyn RenderObserver,
    progress: f64,
}

impl Reporter<'_> {
    fn state(&mut self, state: RenderState) {
        debug!("Render state: {}", state);
        self.observer.on_state(&state);
    }

    fn progress(&mut self, progress: f64) {
        self.progress = progress;
        self.observer.on_progress(progress);
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.state(RenderState::Done),
            Err(e) => {
                warn!("Render failed: {}", e);
                let failed = RenderState::Failed {
                    reason: e.friendly_message(),
                    progress: self.progress,
                };
                self.state(failed);
            }
        }
        result
    }
}

impl TimelineRenderer {
    /// Renderer producing canonical-format assets under `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>, store: Arc<dyn TrackStore>) -> Self {
        Self {
            output_dir: output_dir.into(),
            store,
            normalizer: FormatNormalizer::default(),
            strict_formats: false,
            unknown_clip_duration_secs: DEFAULT_UNKNOWN_CLIP_DURATION_SECS,
        }
    }

    pub fn from_config(config: &EngineConfig, store: Arc<dyn TrackStore>) -> Self {
        Self::new(config.output_dir.clone(), store)
            .with_strict_formats(config.strict_formats)
            .with_unknown_clip_duration(config.unknown_clip_duration_secs)
    }

    /// Reject clips that cannot be brought to the canonical format
    pub fn with_strict_formats(mut self, strict: bool) -> Self {
        self.strict_formats = strict;
        self
    }

    pub fn with_unknown_clip_duration(mut self, duration_secs: f64) -> Self {
        self.unknown_clip_duration_secs = duration_secs;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    /// Render `timeline` to `<track_name>_<epochSeconds>.wav` and save the track
    ///
    /// # Errors
    /// * `EmptyTimeline` - If the timeline has no items
    /// * `SourceNotFound` / `UnsupportedFormat` - If a clip cannot be read;
    ///   nothing is written
    /// * `RenderCancelled` - If `cancel` fires between items
    /// * `WriteFailure` - If the asset cannot be written or fails verification
    pub fn render(
        &self,
        timeline: &Timeline,
        track_name: &str,
        observer: &mut dyn RenderObserver,
        cancel: Option<&CancelToken>,
    ) -> Result<RenderedTrack> {
        let mut reporter = Reporter {
            observer,
            progress: 0.0,
        };
        let result = self.render_inner(timeline, track_name, &mut reporter, cancel);
        reporter.finish(result)
    }

    fn render_inner(
        &self,
        timeline: &Timeline,
        track_name: &str,
        reporter: &mut Reporter<'_>,
        cancel: Option<&CancelToken>,
    ) -> Result<RenderedTrack> {
        reporter.state(RenderState::Preparing);
        if timeline.is_empty() {
            return Err(PadtrackError::EmptyTimeline);
        }

        let target = self.normalizer.target();
        let count = timeline.len();
        let mut buffers: Vec<AudioBuffer> = Vec::with_capacity(count);
        let mut snapshot = Vec::with_capacity(count);
        let mut total_duration = 0.0;

        info!("Rendering '{}' ({} items)", track_name, count);

        for (index, item) in timeline.iter().enumerate() {
            check_cancelled(cancel)?;
            reporter.state(RenderState::PerItem(index));

            let (buffer, duration) = match item {
                TimelineItem::Clip(clip) => {
                    let buffer = self.read_clip(&clip.file_path, &clip.display_name)?;
                    let duration = buffer.duration_secs();
                    (buffer, duration)
                }
                TimelineItem::Gap { duration_secs } => {
                    let duration = renderable_gap(*duration_secs);
                    (generate_silence_at(total_duration, duration, target), duration)
                }
            };

            debug!("{}: {:.3}s", item.label(), duration);
            total_duration += duration;
            snapshot.push(SnapshotItem {
                position: index,
                item: item.clone(),
                duration_secs: duration,
            });
            buffers.push(buffer);
            reporter.progress((index + 1) as f64 / count as f64);
        }

        check_cancelled(cancel)?;
        reporter.state(RenderState::Concatenating);
        let joined = concatenate_segments_into(&buffers, target)?;
        for skipped in &joined.skipped {
            warn!(
                "Item {} ({}) left out of the render: {}",
                skipped.index, skipped.label, skipped.reason
            );
            total_duration -= snapshot[skipped.index].duration_secs;
        }

        reporter.state(RenderState::Writing);
        let (asset_path, sha256) = self.write_asset(&joined.buffer, track_name)?;

        let mut track = RenderedTrack::new(track_name, asset_path.clone(), total_duration, snapshot);
        track.asset_sha256 = Some(sha256);

        if let Err(e) = self.store.insert(track.clone()) {
            remove_quietly(&asset_path);
            return Err(e);
        }

        info!(
            "Rendered '{}' ({:.3}s) to {}",
            track.name,
            track.total_duration_secs,
            asset_path.display()
        );
        Ok(track)
    }

    fn read_clip(&self, path: &Path, name: &str) -> Result<AudioBuffer> {
        match self.normalizer.normalize_detailed(path, name)? {
            Normalized::Fallback { reason, .. } if self.strict_formats => {
                Err(PadtrackError::UnsupportedFormat {
                    name: name.to_string(),
                    reason,
                })
            }
            normalized => Ok(normalized.into_buffer()),
        }
    }

    /// Write to a temp file in the output directory, verify, then move into place
    fn write_asset(&self, buffer: &AudioBuffer, track_name: &str) -> Result<(PathBuf, String)> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| write_failure(&self.output_dir, e))?;

        let final_path = self.output_dir.join(asset_file_name(track_name, Utc::now().timestamp()));

        let mut temp = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(".part")
            .tempfile_in(&self.output_dir)
            .map_err(|e| write_failure(&self.output_dir, e))?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write_wav_to(buffer, &mut writer, &final_path)?;
            writer.flush().map_err(|e| write_failure(&final_path, e))?;
        }

        if final_path.exists() {
            debug!("Replacing existing asset {}", final_path.display());
            fs::remove_file(&final_path).map_err(|e| write_failure(&final_path, e))?;
        }
        temp.persist(&final_path)
            .map_err(|e| write_failure(&final_path, e.error))?;

        match verify_asset(&final_path, buffer) {
            Ok(sha256) => Ok((final_path, sha256)),
            Err(e) => {
                remove_quietly(&final_path);
                Err(e)
            }
        }
    }

    /// Save the timeline as a track without rendering audio
    ///
    /// Clip durations come from file headers; a clip that cannot be probed
    /// counts as the configured fallback duration.
    ///
    /// # Errors
    /// * `EmptyTimeline` - If the timeline has no items
    pub fn save_composition(
        &self,
        timeline: &Timeline,
        track_name: &str,
        observer: &mut dyn RenderObserver,
    ) -> Result<RenderedTrack> {
        let mut reporter = Reporter {
            observer,
            progress: 0.0,
        };
        let result = self.compose_inner(timeline, track_name, &mut reporter);
        reporter.finish(result)
    }

    fn compose_inner(
        &self,
        timeline: &Timeline,
        track_name: &str,
        reporter: &mut Reporter<'_>,
    ) -> Result<RenderedTrack> {
        reporter.state(RenderState::Preparing);
        if timeline.is_empty() {
            return Err(PadtrackError::EmptyTimeline);
        }

        let count = timeline.len();
        let mut snapshot = Vec::with_capacity(count);
        let mut total_duration = 0.0;

        for (index, item) in timeline.iter().enumerate() {
            reporter.state(RenderState::PerItem(index));
            let duration = match item {
                TimelineItem::Clip(clip) => probe_duration(&clip.file_path, &clip.display_name)
                    .unwrap_or_else(|e| {
                        warn!(
                            "{}; assuming {:.2}s",
                            e, self.unknown_clip_duration_secs
                        );
                        self.unknown_clip_duration_secs
                    }),
                TimelineItem::Gap { duration_secs } => renderable_gap(*duration_secs),
            };
            total_duration += duration;
            snapshot.push(SnapshotItem {
                position: index,
                item: item.clone(),
                duration_secs: duration,
            });
            reporter.progress((index + 1) as f64 / count as f64);
        }

        let track = RenderedTrack::new(track_name, PathBuf::new(), total_duration, snapshot);
        self.store.insert(track.clone())?;
        info!(
            "Saved composition '{}' ({:.3}s, {} items)",
            track.name, track.total_duration_secs, count
        );
        Ok(track)
    }
}

/// `<name>_<epochSeconds>.wav`, with path-hostile characters replaced
pub fn asset_file_name(track_name: &str, epoch_secs: i64) -> String {
    let stem: String = track_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "track".to_string()
    } else {
        stem
    };
    format!("{}_{}.wav", stem, epoch_secs)
}

/// Gaps that bypassed timeline validation render as nothing
fn renderable_gap(duration_secs: f64) -> f64 {
    if duration_secs.is_finite() && duration_secs > 0.0 {
        duration_secs
    } else {
        0.0
    }
}

fn check_cancelled(cancel: Option<&CancelToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(PadtrackError::RenderCancelled),
        _ => Ok(()),
    }
}

/// Re-read the written header and hash the file
fn verify_asset(path: &Path, expected: &AudioBuffer) -> Result<String> {
    let probe = probe_file(path, "rendered asset").map_err(|e| write_failure(path, e))?;
    if probe.format != expected.format() || probe.frames != expected.frame_count() as u64 {
        return Err(PadtrackError::WriteFailure {
            path: path.to_path_buf(),
            reason: format!(
                "verification read {} frames @ {}, expected {} @ {}",
                probe.frames,
                probe.format,
                expected.frame_count(),
                expected.format()
            ),
        });
    }
    file_sha256(path)
}

fn write_failure(path: &Path, error: impl fmt::Display) -> PadtrackError {
    PadtrackError::WriteFailure {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
