//! Track Store Tests
//!
//! Saved-track persistence, background render jobs and asset housekeeping.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use padtrack::render::{NoopObserver, RenderEvent, RenderJob, TimelineRenderer};
use padtrack::store::{prune_orphans, JsonTrackStore, TrackStore};
use padtrack::timeline::{ClipRef, Timeline};
use padtrack::{EngineConfig, PadtrackError};

fn config(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        output_dir: dir.path().join("tracks"),
        store_path: dir.path().join("tracks").join("tracks.json"),
        clip_dir: dir.path().join("sounds"),
        ..EngineConfig::default()
    }
}

fn gaps(durations: &[f64]) -> Timeline {
    let mut timeline = Timeline::new();
    for &d in durations {
        timeline.push_gap(d).unwrap();
    }
    timeline
}

#[test]
fn test_listing_is_most_recent_first() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(JsonTrackStore::new(&config.store_path));
    let renderer = TimelineRenderer::from_config(&config, store.clone());

    let first = renderer
        .save_composition(&gaps(&[0.1]), "first", &mut NoopObserver)
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));
    let second = renderer
        .save_composition(&gaps(&[0.2]), "second", &mut NoopObserver)
        .unwrap();

    let names: Vec<String> = store.list_all().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["second", "first"]);

    // Composition-only delete has no file to remove
    assert_eq!(store.delete(first.id).unwrap().id, first.id);
    assert_eq!(store.list_all().unwrap(), vec![second]);
}

#[test]
fn test_background_job_reports_and_persists() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(JsonTrackStore::new(&config.store_path));
    let renderer = TimelineRenderer::from_config(&config, store.clone());
    let timeline = gaps(&[0.25, 0.25]);

    let job = RenderJob::spawn(renderer, &timeline, "background").unwrap();
    let mut saw_finished = false;
    let mut progress = Vec::new();
    while let Some(event) = job.next_timeout(Duration::from_secs(10)) {
        match event {
            RenderEvent::Progress(p) => progress.push(p),
            RenderEvent::State(_) => {}
            RenderEvent::Finished(result) => {
                let track = result.unwrap();
                assert_eq!(track.total_duration_secs, 0.5);
                saw_finished = true;
                break;
            }
        }
    }

    assert!(saw_finished);
    assert_eq!(progress, vec![0.5, 1.0]);
    assert_eq!(store.list_all().unwrap().len(), 1);
}

#[test]
fn test_job_failure_is_delivered() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(JsonTrackStore::new(&config.store_path));
    let renderer = TimelineRenderer::from_config(&config, store.clone());

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&dir.path().join("nope.wav")));

    let job = RenderJob::spawn(renderer, &timeline, "nope").unwrap();
    assert!(matches!(
        job.wait(),
        Err(PadtrackError::SourceNotFound { .. })
    ));
    assert!(!timeline.render_lock().is_busy());
    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn test_prune_keeps_referenced_assets() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(JsonTrackStore::new(&config.store_path));
    let renderer = TimelineRenderer::from_config(&config, store.clone());

    let kept = renderer
        .render(&gaps(&[0.1]), "kept", &mut NoopObserver, None)
        .unwrap();
    let stray = config.output_dir.join("stray_1.wav");
    fs::write(&stray, b"RIFF").unwrap();

    let removed = prune_orphans(store.as_ref(), &config.output_dir).unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!stray.exists());
    assert!(kept.asset_path.exists());
    assert!(config.store_path.exists());
}

#[test]
fn test_tampered_asset_fails_verification() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let store = Arc::new(JsonTrackStore::new(&config.store_path));
    let renderer = TimelineRenderer::from_config(&config, store.clone());

    let track = renderer
        .render(&gaps(&[0.1]), "tamper", &mut NoopObserver, None)
        .unwrap();
    assert!(store.verify(track.id).unwrap());

    fs::write(&track.asset_path, b"changed").unwrap();
    assert!(!store.verify(track.id).unwrap());

    fs::remove_file(&track.asset_path).unwrap();
    assert!(!store.verify(track.id).unwrap());
    // A missing asset does not block deleting the record
    store.delete(track.id).unwrap();
}
