//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::normalizer::FormatNormalizer;
use crate::error::{PadtrackError, Result};
use crate::playback::{DecodedVoiceBackend, PlaybackEvent, PlaybackScheduler, SystemClock};
use crate::render::{NoopObserver, RenderJob, RenderObserver, RenderState, TimelineRenderer};
use crate::store::{prune_orphans, ClipCatalog, DirectoryCatalog, JsonTrackStore, TrackStore};
use crate::timeline::{ClipRef, Timeline};

/// Longest the playback loop sleeps between ticks
const MAX_IDLE: Duration = Duration::from_millis(20);

fn open_store(config: &EngineConfig) -> Arc<dyn TrackStore> {
    Arc::new(JsonTrackStore::new(&config.store_path))
}

/// Catalog for resolving clip ids; absent when the clip directory is missing
fn open_catalog(config: &EngineConfig) -> Option<DirectoryCatalog> {
    match DirectoryCatalog::scan(&config.clip_dir) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            debug!("No clip catalog: {}", e);
            None
        }
    }
}

/// Parse `clip:<id-or-path>` / `gap:<seconds>` arguments into a timeline
///
/// A clip argument naming an existing file is used directly; anything else
/// is looked up in `catalog`.
pub fn parse_items(
    args: &[String],
    catalog: Option<&dyn ClipCatalog>,
    max_gap_secs: f64,
) -> Result<Timeline> {
    let mut timeline = Timeline::with_max_gap(max_gap_secs);

    for arg in args {
        match arg.split_once(':') {
            Some(("clip", target)) if !target.is_empty() => {
                let path = Path::new(target);
                let clip = if path.is_file() {
                    ClipRef::from_path(path)
                } else {
                    match catalog {
                        Some(catalog) => catalog.resolve(target)?,
                        None => {
                            return Err(PadtrackError::SourceNotFound {
                                name: target.to_string(),
                                path: path.to_path_buf(),
                            })
                        }
                    }
                };
                timeline.push_clip(clip);
            }
            Some(("gap", secs)) => {
                let duration: f64 = secs.trim().parse().map_err(|_| PadtrackError::Config {
                    reason: format!("'{}' is not a number of seconds", secs),
                })?;
                timeline.push_gap(duration)?;
            }
            _ => {
                return Err(PadtrackError::Config {
                    reason: format!(
                        "cannot parse timeline item '{}' (expected clip:<id> or gap:<seconds>)",
                        arg
                    ),
                })
            }
        }
    }

    Ok(timeline)
}

fn timeline_from_args(config: &EngineConfig, items: &[String]) -> Result<Timeline> {
    let catalog = open_catalog(config);
    parse_items(
        items,
        catalog.as_ref().map(|c| c as &dyn ClipCatalog),
        config.max_gap_secs,
    )
}

/// Prints render progress as it arrives from the worker
struct ConsoleProgress;

impl RenderObserver for ConsoleProgress {
    fn on_state(&mut self, state: &RenderState) {
        debug!("Render: {}", state);
    }

    fn on_progress(&mut self, progress: f64) {
        println!("  {:>3.0}%", progress * 100.0);
    }
}

/// Render a timeline to a new asset.
pub fn render(config: &EngineConfig, name: &str, items: &[String]) -> Result<()> {
    let timeline = timeline_from_args(config, items)?;
    info!("Rendering {} items as '{}'", timeline.len(), name);

    let renderer = TimelineRenderer::from_config(config, open_store(config));
    let job = RenderJob::spawn(renderer, &timeline, name)?;
    let track = job.wait_with(&mut ConsoleProgress)?;

    println!("Rendered: {}", track.name);
    println!("  id:       {}", track.id);
    println!("  duration: {:.3}s", track.total_duration_secs);
    println!("  asset:    {}", track.asset_path.display());

    Ok(())
}

/// Save a timeline without rendering audio.
pub fn compose(config: &EngineConfig, name: &str, items: &[String]) -> Result<()> {
    let timeline = timeline_from_args(config, items)?;
    let renderer = TimelineRenderer::from_config(config, open_store(config));
    let track = renderer.save_composition(&timeline, name, &mut NoopObserver)?;

    println!("Saved composition: {}", track.name);
    println!("  id:       {}", track.id);
    println!("  duration: {:.3}s", track.total_duration_secs);

    Ok(())
}

/// List saved tracks.
pub fn list(config: &EngineConfig) -> Result<()> {
    let tracks = open_store(config).list_all()?;

    if tracks.is_empty() {
        println!("No saved tracks.");
        return Ok(());
    }

    println!("Saved Tracks:");
    println!("{:-<72}", "");
    for track in &tracks {
        let kind = if track.is_composition_only() {
            "composition"
        } else {
            "rendered"
        };
        println!(
            "{}  {:<20} {:>8.3}s  {:<11} {}",
            track.id,
            track.name,
            track.total_duration_secs,
            kind,
            track.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// List catalogued clips.
pub fn clips(config: &EngineConfig) -> Result<()> {
    let catalog = DirectoryCatalog::scan(&config.clip_dir)?;

    if catalog.is_empty() {
        println!("No clips in {}.", catalog.root().display());
        return Ok(());
    }

    for clip in catalog.list() {
        println!("{:<20} {}", clip.source_id, clip.file_path.display());
    }
    Ok(())
}

/// Delete a saved track.
pub fn delete(config: &EngineConfig, id: Uuid) -> Result<()> {
    let track = open_store(config).delete(id)?;
    println!("Deleted: {} ({})", track.name, track.id);
    Ok(())
}

/// Verify a saved track's asset.
pub fn verify(config: &EngineConfig, id: Uuid) -> Result<()> {
    if open_store(config).verify(id)? {
        println!("OK: {}", id);
    } else {
        warn!("Track {} failed verification", id);
        println!("MISMATCH: {}", id);
    }
    Ok(())
}

/// Remove unreferenced assets.
pub fn prune(config: &EngineConfig) -> Result<()> {
    let store = open_store(config);
    let removed = prune_orphans(store.as_ref(), &config.output_dir)?;

    if removed.is_empty() {
        println!("No orphaned assets.");
    } else {
        for path in &removed {
            println!("Removed: {}", path.display());
        }
    }
    Ok(())
}

fn scheduler(config: &EngineConfig) -> PlaybackScheduler {
    PlaybackScheduler::from_config(
        config,
        Box::new(SystemClock::new()),
        Box::new(DecodedVoiceBackend::new(FormatNormalizer::default())),
    )
}

/// Tick the scheduler until playback ends or `seconds` elapse
fn drive(player: &mut PlaybackScheduler, seconds: Option<f64>) {
    let started = std::time::Instant::now();

    loop {
        for event in player.tick() {
            match event {
                PlaybackEvent::VoiceStarted { clip, at_secs, .. } => {
                    println!("{:>8.3}s  {}", at_secs, clip.display_name)
                }
                PlaybackEvent::VoiceSkipped { clip, reason } => {
                    println!("{:>9}  {} skipped: {}", "", clip.display_name, reason)
                }
                PlaybackEvent::LoopRestarted { pass } => debug!("Loop pass {}", pass),
                PlaybackEvent::VoiceFinished { .. } | PlaybackEvent::Finished => {}
            }
        }

        if !player.is_playing() && player.voices().is_empty() {
            break;
        }
        if let Some(limit) = seconds {
            if started.elapsed().as_secs_f64() >= limit {
                player.stop();
                break;
            }
        }
        thread::sleep(MAX_IDLE);
    }
}

/// Play a timeline live.
pub fn play(config: &EngineConfig, items: &[String], looping: bool, seconds: Option<f64>) -> Result<()> {
    let timeline = timeline_from_args(config, items)?;
    let mut player = scheduler(config);
    player.set_loop(looping);

    match player.play(&timeline) {
        Err(e) if e.is_silent() => return Ok(()),
        other => other?,
    }
    drive(&mut player, seconds);
    Ok(())
}

/// Play a saved track's timeline live.
pub fn play_track(config: &EngineConfig, id: Uuid, seconds: Option<f64>) -> Result<()> {
    let track = open_store(config).get(id)?;
    let mut player = scheduler(config);

    match player.play_track(&track) {
        Err(e) if e.is_silent() => return Ok(()),
        other => other?,
    }
    drive(&mut player, seconds);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{TimelineItem, DEFAULT_MAX_GAP_SECS};
    use std::fs;
    use tempfile::TempDir;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_paths_and_gaps() {
        let temp_dir = TempDir::new().unwrap();
        let kick = temp_dir.path().join("kick.wav");
        fs::write(&kick, b"x").unwrap();

        let timeline = parse_items(
            &args(&[&format!("clip:{}", kick.display()), "gap:0.5"]),
            None,
            DEFAULT_MAX_GAP_SECS,
        )
        .unwrap();

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.get(0), Some(&TimelineItem::clip(ClipRef::from_path(&kick))));
        assert_eq!(timeline.get(1), Some(&TimelineItem::gap(0.5)));
    }

    #[test]
    fn test_parse_resolves_catalog_ids() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("snare.wav"), b"x").unwrap();
        let catalog = DirectoryCatalog::scan(temp_dir.path()).unwrap();

        let timeline = parse_items(&args(&["clip:snare"]), Some(&catalog), DEFAULT_MAX_GAP_SECS).unwrap();
        match timeline.get(0) {
            Some(TimelineItem::Clip(clip)) => assert_eq!(clip.source_id, "snare"),
            other => panic!("Expected clip, got: {:?}", other),
        }

        assert!(matches!(
            parse_items(&args(&["clip:cowbell"]), Some(&catalog), DEFAULT_MAX_GAP_SECS),
            Err(PadtrackError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_items() {
        for bad in ["kick", "gap:soon", "clip:", "tone:440"] {
            assert!(
                matches!(
                    parse_items(&args(&[bad]), None, DEFAULT_MAX_GAP_SECS),
                    Err(PadtrackError::Config { .. })
                ),
                "{} should not parse",
                bad
            );
        }
        assert!(matches!(
            parse_items(&args(&["gap:0"]), None, DEFAULT_MAX_GAP_SECS),
            Err(PadtrackError::InvalidDuration { .. })
        ));
        assert!(matches!(
            parse_items(&args(&["gap:11"]), None, DEFAULT_MAX_GAP_SECS),
            Err(PadtrackError::InvalidDuration { .. })
        ));
    }
}
