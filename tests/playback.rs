//! Playback Tests
//!
//! Scheduler behavior against real decoded clips on a manual clock.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use padtrack::engine::{write_wav, AudioBuffer, CANONICAL_FORMAT};
use padtrack::playback::{
    DecodedVoiceBackend, ManualClock, PlaybackEvent, PlaybackScheduler, PlaybackState,
};
use padtrack::timeline::{ClipRef, Timeline};
use padtrack::EngineConfig;

fn write_clip(dir: &Path, name: &str, frames: usize) -> PathBuf {
    let path = dir.join(format!("{}.wav", name));
    write_wav(&AudioBuffer::silent(CANONICAL_FORMAT, frames), &path).unwrap();
    path
}

fn player(clock: &ManualClock) -> PlaybackScheduler {
    PlaybackScheduler::from_config(
        &EngineConfig::default(),
        Box::new(clock.clone()),
        Box::new(DecodedVoiceBackend::default()),
    )
}

fn three_items(dir: &Path) -> Timeline {
    let mut timeline = Timeline::new();
    timeline.push_clip(ClipRef::from_path(&write_clip(dir, "kick", 13230)));
    timeline.push_gap(0.5).unwrap();
    timeline.push_clip(ClipRef::from_path(&write_clip(dir, "snare", 11025)));
    timeline
}

fn started_names(events: &[PlaybackEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            PlaybackEvent::VoiceStarted { clip, .. } => Some(clip.display_name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_stop_right_after_play_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let mut player = player(&clock);

    player.play(&three_items(dir.path())).unwrap();
    player.stop();

    for step in 1..=20 {
        clock.set(step as f64 * 0.1);
        assert!(player.tick().is_empty());
    }
    assert_eq!(player.voices().started_total(), 0);
    assert_eq!(player.state(), PlaybackState::Stopped);
}

#[test]
fn test_stop_mid_pass_cancels_later_clips() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let mut player = player(&clock);

    player.play(&three_items(dir.path())).unwrap();
    assert_eq!(started_names(&player.tick()), vec!["kick"]);
    assert_eq!(player.voices().len(), 1);

    clock.set(0.4);
    player.stop();
    assert!(player.voices().is_empty());

    clock.set(2.0);
    assert!(player.tick().is_empty());
    assert_eq!(player.voices().started_total(), 1);
}

#[test]
fn test_voices_get_real_durations() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let mut player = player(&clock);

    player.play(&three_items(dir.path())).unwrap();
    player.tick();
    let kick = player.active_voices().next().unwrap();
    assert!((kick.duration_secs() - 0.3).abs() < 1e-9);

    // Still sounding after one spacing step, gone after its length
    clock.set(0.25);
    player.tick();
    assert_eq!(player.voices().len(), 1);
    clock.set(0.3);
    player.tick();
    assert!(player.voices().is_empty());
}

#[test]
fn test_deleted_clip_is_skipped_at_play_time() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let mut player = player(&clock);
    let timeline = three_items(dir.path());
    fs::remove_file(dir.path().join("kick.wav")).unwrap();

    player.play(&timeline).unwrap();
    let events = player.tick();
    assert!(matches!(
        &events[0],
        PlaybackEvent::VoiceSkipped { clip, .. } if clip.display_name == "kick"
    ));

    clock.set(0.75);
    assert_eq!(started_names(&player.tick()), vec!["snare"]);
}

#[test]
fn test_loop_runs_until_disabled() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new();
    let mut player = player(&clock);
    player.set_loop(true);
    player.play(&three_items(dir.path())).unwrap();

    let mut kicks = 0;
    for step in 0..=40 {
        clock.set(step as f64 * 0.25);
        kicks += started_names(&player.tick())
            .iter()
            .filter(|name| *name == "kick")
            .count();
    }
    // One pass per second over ten seconds
    assert_eq!(kicks, 11);
    assert_eq!(player.state(), PlaybackState::Looping);

    player.set_loop(false);
    assert_eq!(player.state(), PlaybackState::Playing);
    clock.set(11.0);
    let events = player.tick();
    assert!(events.contains(&PlaybackEvent::Finished));
    assert_eq!(player.state(), PlaybackState::Stopped);
}

#[test]
fn test_empty_timeline_cannot_loop() {
    let clock = ManualClock::new();
    let mut player = player(&clock);
    player.set_loop(true);

    let result = player.play(&Timeline::new());
    assert!(result.unwrap_err().is_silent());
    assert_eq!(player.state(), PlaybackState::Stopped);
}
