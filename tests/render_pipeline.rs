//! Render Pipeline Tests
//!
//! End-to-end rendering of timelines into assets and track records.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use approx::assert_relative_eq;
use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::TempDir;

use padtrack::engine::{concatenate, decode_file, AudioBuffer, CANONICAL_FORMAT};
use padtrack::render::{NoopObserver, TimelineRenderer};
use padtrack::store::{JsonTrackStore, MemoryTrackStore, TrackStore};
use padtrack::timeline::{ClipRef, Timeline, TimelineItem};
use padtrack::PadtrackError;

/// Write a 16-bit stereo sawtooth clip at 44.1kHz
fn write_clip(dir: &Path, name: &str, duration_secs: f64, period: usize) -> PathBuf {
    let path = dir.join(format!("{}.wav", name));
    let spec = WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let frames = (duration_secs * 44100.0).round() as usize;
    let mut writer = WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
        let value = ((i % period) as i32 * 1000 - 8000) as i16;
        writer.write_sample(value).unwrap();
        writer.write_sample(-value).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn renderer(dir: &TempDir) -> (TimelineRenderer, Arc<MemoryTrackStore>) {
    let store = Arc::new(MemoryTrackStore::new());
    (
        TimelineRenderer::new(dir.path().join("tracks"), store.clone()),
        store,
    )
}

fn assets(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

// === Duration Properties ===

#[test]
fn test_gap_only_timeline_is_exact() {
    let dir = TempDir::new().unwrap();
    let (renderer, _) = renderer(&dir);

    let gaps = [0.1, 0.2, 0.33333, 0.00001, 1.5];
    let mut timeline = Timeline::new();
    for &gap in &gaps {
        timeline.push_gap(gap).unwrap();
    }

    let track = renderer
        .render(&timeline, "silence", &mut NoopObserver, None)
        .unwrap();

    let sum: f64 = gaps.iter().sum();
    assert_eq!(track.total_duration_secs, sum);

    let rendered = decode_file(&track.asset_path, "silence").unwrap();
    assert_eq!(rendered.format(), CANONICAL_FORMAT);
    assert_eq!(rendered.frame_count(), (sum * 44100.0).round() as usize);
    assert!(rendered.is_silent());
}

#[test]
fn test_single_clip_passes_through() {
    let dir = TempDir::new().unwrap();
    let kick = write_clip(dir.path(), "kick", 0.3, 37);
    let (renderer, _) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&kick));

    let track = renderer
        .render(&timeline, "kick only", &mut NoopObserver, None)
        .unwrap();

    let source = decode_file(&kick, "kick").unwrap();
    let rendered = decode_file(&track.asset_path, "kick only").unwrap();
    assert_eq!(track.total_duration_secs, source.duration_secs());
    assert_eq!(rendered, source);
}

#[test]
fn test_kick_gap_snare_then_remove_gap() {
    let dir = TempDir::new().unwrap();
    let kick = write_clip(dir.path(), "kick", 0.30, 37);
    let snare = write_clip(dir.path(), "snare", 0.25, 11);
    let (renderer, store) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&kick));
    timeline.push_gap(0.5).unwrap();
    timeline.push_clip(ClipRef::from_path(&snare));

    let first = renderer
        .render(&timeline, "beat", &mut NoopObserver, None)
        .unwrap();
    assert_relative_eq!(first.total_duration_secs, 1.05, epsilon = 1e-6);
    let rendered = decode_file(&first.asset_path, "beat").unwrap();
    assert_eq!(rendered.frame_count(), 13230 + 22050 + 11025);

    let removed = timeline.remove_at(1).unwrap();
    assert!(!removed.is_clip());

    let second = renderer
        .render(&timeline, "beat", &mut NoopObserver, None)
        .unwrap();
    assert_relative_eq!(second.total_duration_secs, 0.55, epsilon = 1e-6);

    let tracks = store.list_all().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].id, second.id);
}

#[test]
fn test_snapshot_is_index_tagged() {
    let dir = TempDir::new().unwrap();
    let kick = write_clip(dir.path(), "kick", 0.1, 37);
    let (renderer, _) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_gap(0.2).unwrap();
    timeline.push_clip(ClipRef::from_path(&kick));

    let track = renderer
        .render(&timeline, "tagged", &mut NoopObserver, None)
        .unwrap();
    let positions: Vec<usize> = track.snapshot.iter().map(|s| s.position).collect();
    assert_eq!(positions, vec![0, 1]);
    assert_relative_eq!(track.snapshot[1].duration_secs, 0.1, epsilon = 1e-6);
    assert_eq!(track.to_timeline(), timeline);
}

// === Editing Properties ===

#[test]
fn test_removed_clip_is_never_referenced() {
    let dir = TempDir::new().unwrap();
    let kick = write_clip(dir.path(), "kick", 0.1, 37);
    let hat = write_clip(dir.path(), "hat", 0.1, 5);
    let (renderer, _) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&kick));
    timeline.push_clip(ClipRef::from_path(&hat));
    timeline.remove_at(1);

    // Gone from disk too: a stale reference would fail the render
    fs::remove_file(&hat).unwrap();

    let track = renderer
        .render(&timeline, "no hat", &mut NoopObserver, None)
        .unwrap();
    assert!(track.snapshot.iter().all(|s| match &s.item {
        TimelineItem::Clip(clip) => clip.file_path != hat,
        TimelineItem::Gap { .. } => true,
    }));
}

#[test]
fn test_move_changes_order_not_membership() {
    let dir = TempDir::new().unwrap();
    let kick = write_clip(dir.path(), "kick", 0.1, 37);
    let snare = write_clip(dir.path(), "snare", 0.1, 11);
    let (renderer, _) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&kick));
    timeline.push_gap(0.1).unwrap();
    timeline.push_clip(ClipRef::from_path(&snare));

    let before = renderer
        .render(&timeline, "before", &mut NoopObserver, None)
        .unwrap();
    assert!(timeline.move_item(2, 0));
    let after = renderer
        .render(&timeline, "after", &mut NoopObserver, None)
        .unwrap();

    let labels = |track: &padtrack::timeline::RenderedTrack| -> Vec<String> {
        track.snapshot.iter().map(|s| s.item.label()).collect()
    };
    let mut sorted_before = labels(&before);
    let mut sorted_after = labels(&after);
    assert_ne!(sorted_before, sorted_after);
    sorted_before.sort();
    sorted_after.sort();
    assert_eq!(sorted_before, sorted_after);

    let a = decode_file(&before.asset_path, "before").unwrap();
    let b = decode_file(&after.asset_path, "after").unwrap();
    assert_eq!(a.frame_count(), b.frame_count());
    assert_ne!(a, b);
}

#[test]
fn test_concatenation_is_order_sensitive() {
    let dir = TempDir::new().unwrap();
    let clips: Vec<AudioBuffer> = [("a", 3), ("b", 7), ("c", 13)]
        .iter()
        .map(|(name, period)| {
            let path = write_clip(dir.path(), name, 0.05, *period);
            decode_file(&path, name).unwrap()
        })
        .collect();

    let forward = concatenate(clips.clone()).unwrap();
    let reversed = concatenate(clips.into_iter().rev().collect()).unwrap();

    assert_eq!(forward.frame_count(), reversed.frame_count());
    assert_ne!(forward, reversed);
}

// === Failure Properties ===

#[test]
fn test_missing_clip_fails_without_asset() {
    let dir = TempDir::new().unwrap();
    let (renderer, store) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::new(
        "missing-file",
        "missing-file",
        dir.path().join("missing-file.wav"),
    ));

    match renderer.render(&timeline, "broken", &mut NoopObserver, None) {
        Err(e @ PadtrackError::SourceNotFound { .. }) => {
            assert_eq!(e.clip_name(), Some("missing-file"));
            assert!(e.friendly_message().contains("missing-file"));
        }
        other => panic!("Expected SourceNotFound, got: {:?}", other),
    }
    assert!(assets(renderer.output_dir()).is_empty());
    assert!(store.list_all().unwrap().is_empty());
}

#[test]
fn test_undecodable_clip_aborts_render() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("bogus.wav");
    fs::write(&bogus, b"definitely not audio").unwrap();
    let (renderer, _) = renderer(&dir);

    let mut timeline = Timeline::new();
    timeline.push_gap(0.1).unwrap();
    timeline.push_clip(ClipRef::from_path(&bogus));

    assert!(matches!(
        renderer.render(&timeline, "bogus", &mut NoopObserver, None),
        Err(PadtrackError::UnsupportedFormat { .. })
    ));
    assert!(assets(renderer.output_dir()).is_empty());
}

// === Persistence ===

#[test]
fn test_rendered_track_survives_reload_and_delete() {
    let dir = TempDir::new().unwrap();
    let kick = write_clip(dir.path(), "kick", 0.2, 37);
    let manifest = dir.path().join("tracks.json");
    let renderer =
        TimelineRenderer::new(dir.path().join("tracks"), Arc::new(JsonTrackStore::new(&manifest)));

    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&kick));
    let track = renderer
        .render(&timeline, "saved", &mut NoopObserver, None)
        .unwrap();

    let reopened = JsonTrackStore::new(&manifest);
    assert_eq!(reopened.get(track.id).unwrap(), track);
    assert!(reopened.verify(track.id).unwrap());

    reopened.delete(track.id).unwrap();
    assert!(!track.asset_path.exists());
    assert!(matches!(
        reopened.get(track.id),
        Err(PadtrackError::TrackNotFound { .. })
    ));
}
