//! Playback Scheduler
//!
//! Plays a timeline live without rendering it. Clip starts are laid out on
//! a logical time axis from the moment `play` is called: each clip advances
//! the offset by a fixed spacing, each gap by its duration. Scheduled starts
//! fire from `tick`, which the owner calls with the clock running.
//!
//! Every `play` and `stop` bumps a generation counter. Tasks carry the
//! generation they were scheduled under and are dropped if it no longer
//! matches when they come due.

use std::fmt;

use log::{debug, info, warn};

use crate::config::{EngineConfig, DEFAULT_CLIP_SPACING_SECS};
use crate::error::{PadtrackError, Result};
use crate::playback::clock::Clock;
use crate::playback::voice::{Voice, VoiceBackend, VoicePool};
use crate::timeline::{ClipRef, RenderedTrack, Timeline, TimelineItem};

/// Loop passes a single `tick` may start before yielding
pub const MAX_LOOP_RESTARTS_PER_TICK: usize = 64;

/// Scheduler playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    /// Playing, restarting from the top at the end of each pass
    Looping,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Looping => write!(f, "Looping"),
        }
    }
}

/// Something that happened during a `tick`
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    VoiceStarted {
        voice_id: u64,
        clip: ClipRef,
        at_secs: f64,
    },
    /// The clip could not be started; the rest of the timeline continues
    VoiceSkipped { clip: ClipRef, reason: String },
    VoiceFinished { voice_id: u64 },
    /// A loop pass ended and the next one was scheduled
    LoopRestarted { pass: u64 },
    /// The last pass ended without looping
    Finished,
}

#[derive(Debug, Clone)]
enum TaskKind {
    StartClip(ClipRef),
    EndOfPass,
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    due_secs: f64,
    generation: u64,
    kind: TaskKind,
}

/// Live timeline player
pub struct PlaybackScheduler {
    clock: Box<dyn Clock>,
    backend: Box<dyn VoiceBackend>,
    spacing_secs: f64,
    state: PlaybackState,
    loop_enabled: bool,
    generation: u64,
    pass: u64,
    items: Vec<TimelineItem>,
    /// Pending tasks, ordered by due time
    pending: Vec<ScheduledTask>,
    voices: VoicePool,
}

impl fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("state", &self.state)
            .field("loop_enabled", &self.loop_enabled)
            .field("generation", &self.generation)
            .field("pending", &self.pending.len())
            .field("voices", &self.voices.len())
            .finish()
    }
}

impl PlaybackScheduler {
    /// Create a stopped scheduler
    ///
    /// A non-positive or non-finite spacing falls back to the default.
    pub fn new(clock: Box<dyn Clock>, backend: Box<dyn VoiceBackend>, spacing_secs: f64) -> Self {
        let spacing_secs = if spacing_secs.is_finite() && spacing_secs > 0.0 {
            spacing_secs
        } else {
            warn!(
                "Invalid clip spacing {}; using {}",
                spacing_secs, DEFAULT_CLIP_SPACING_SECS
            );
            DEFAULT_CLIP_SPACING_SECS
        };

        Self {
            clock,
            backend,
            spacing_secs,
            state: PlaybackState::Stopped,
            loop_enabled: false,
            generation: 0,
            pass: 0,
            items: Vec::new(),
            pending: Vec::new(),
            voices: VoicePool::new(),
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        clock: Box<dyn Clock>,
        backend: Box<dyn VoiceBackend>,
    ) -> Self {
        Self::new(clock, backend, config.clip_spacing_secs)
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state != PlaybackState::Stopped
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn spacing_secs(&self) -> f64 {
        self.spacing_secs
    }

    /// Current play generation; changes on every `play` and `stop`
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn active_voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Number of clip starts scheduled but not yet fired
    pub fn pending_starts(&self) -> usize {
        self.pending
            .iter()
            .filter(|task| matches!(task.kind, TaskKind::StartClip(_)))
            .count()
    }

    /// Clock time of the next scheduled task
    pub fn next_due_secs(&self) -> Option<f64> {
        self.pending.first().map(|task| task.due_secs)
    }

    /// Length of one pass over `items`: spacing per clip plus gap durations
    pub fn pass_duration(&self, items: &[TimelineItem]) -> f64 {
        items
            .iter()
            .map(|item| match item {
                TimelineItem::Clip(_) => self.spacing_secs,
                TimelineItem::Gap { duration_secs } => *duration_secs,
            })
            .sum()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Start playing `timeline` from the top, stopping any current playback
    ///
    /// # Errors
    /// * `EmptyTimeline` - If the timeline has no items; playback stays stopped
    pub fn play(&mut self, timeline: &Timeline) -> Result<()> {
        self.play_items(timeline.items().to_vec())
    }

    /// Play a saved track's frozen snapshot
    pub fn play_track(&mut self, track: &RenderedTrack) -> Result<()> {
        info!("Playing saved track '{}'", track.name);
        let items = track
            .ordered_snapshot()
            .into_iter()
            .map(|entry| entry.item.clone())
            .collect();
        self.play_items(items)
    }

    fn play_items(&mut self, items: Vec<TimelineItem>) -> Result<()> {
        self.stop();
        if items.is_empty() {
            debug!("Nothing to play");
            return Err(PadtrackError::EmptyTimeline);
        }

        self.items = items;
        self.pass = 0;
        self.state = if self.loop_enabled {
            PlaybackState::Looping
        } else {
            PlaybackState::Playing
        };

        let origin = self.clock.now_secs();
        self.schedule_pass(origin);
        info!(
            "Playback started ({} items, {:.2}s per pass, {})",
            self.items.len(),
            self.pass_duration(&self.items),
            self.state
        );
        Ok(())
    }

    /// Stop playback, silencing all voices and cancelling pending starts
    ///
    /// Safe to call at any time, including when already stopped.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.pending.clear();

        let voices = self.voices.drain();
        for voice in &voices {
            self.backend.stop(voice);
        }

        if self.state != PlaybackState::Stopped {
            info!("Playback stopped ({} voices silenced)", voices.len());
        }
        self.state = PlaybackState::Stopped;
    }

    /// Enable or disable restarting at the end of each pass
    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
        self.state = match (self.state, enabled) {
            (PlaybackState::Playing, true) => PlaybackState::Looping,
            (PlaybackState::Looping, false) => PlaybackState::Playing,
            (state, _) => state,
        };
        debug!("Loop {} ({})", if enabled { "on" } else { "off" }, self.state);
    }

    /// Pick up edits to the timeline being played
    ///
    /// The current pass keeps its schedule; the next loop pass uses the new
    /// items. An emptied timeline disables looping and stops playback.
    pub fn sync_timeline(&mut self, timeline: &Timeline) {
        if timeline.is_empty() {
            if self.is_playing() {
                info!("Timeline emptied during playback; stopping");
                self.loop_enabled = false;
                self.stop();
            }
            return;
        }
        self.items = timeline.items().to_vec();
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    fn schedule_pass(&mut self, origin: f64) {
        let mut offset = 0.0;
        for item in &self.items {
            match item {
                TimelineItem::Clip(clip) => {
                    self.pending.push(ScheduledTask {
                        due_secs: origin + offset,
                        generation: self.generation,
                        kind: TaskKind::StartClip(clip.clone()),
                    });
                    offset += self.spacing_secs;
                }
                TimelineItem::Gap { duration_secs } => offset += duration_secs,
            }
        }
        self.pending.push(ScheduledTask {
            due_secs: origin + offset,
            generation: self.generation,
            kind: TaskKind::EndOfPass,
        });
        // Stable sort keeps same-time tasks in timeline order
        self.pending
            .sort_by(|a, b| a.due_secs.total_cmp(&b.due_secs));
        debug!(
            "Scheduled pass {} at {:.3}s ({:.3}s long)",
            self.pass, origin, offset
        );
    }

    /// Fire every task due by now and drop finished voices
    pub fn tick(&mut self) -> Vec<PlaybackEvent> {
        let now = self.clock.now_secs();
        let mut events = Vec::new();
        let mut restarts = 0;

        while restarts < MAX_LOOP_RESTARTS_PER_TICK {
            let task = match self.pop_due(now) {
                Some(task) => task,
                None => break,
            };
            if task.generation != self.generation {
                debug!("Dropping stale task from generation {}", task.generation);
                continue;
            }
            match task.kind {
                TaskKind::StartClip(clip) => self.start_voice(clip, task.due_secs, &mut events),
                TaskKind::EndOfPass => {
                    if self.end_pass(task.due_secs, &mut events) {
                        restarts += 1;
                    }
                }
            }
        }

        for voice in self.voices.prune_finished(now) {
            events.push(PlaybackEvent::VoiceFinished {
                voice_id: voice.id(),
            });
        }
        events
    }

    fn pop_due(&mut self, now: f64) -> Option<ScheduledTask> {
        match self.pending.first() {
            Some(task) if task.due_secs <= now => Some(self.pending.remove(0)),
            _ => None,
        }
    }

    fn start_voice(&mut self, clip: ClipRef, at_secs: f64, events: &mut Vec<PlaybackEvent>) {
        match self.backend.start(&clip, at_secs) {
            Ok(voice) => {
                let voice_id = self.voices.add(voice);
                debug!("Voice {} started: {}", voice_id, clip.display_name);
                events.push(PlaybackEvent::VoiceStarted {
                    voice_id,
                    clip,
                    at_secs,
                });
            }
            Err(e) => {
                warn!("Skipping {}: {}", clip.display_name, e);
                events.push(PlaybackEvent::VoiceSkipped {
                    clip,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Returns true if another pass was scheduled
    fn end_pass(&mut self, at_secs: f64, events: &mut Vec<PlaybackEvent>) -> bool {
        // A pass too short to move the clock would be due again immediately
        let pass_secs = self.pass_duration(&self.items);
        let loopable = !self.items.is_empty() && at_secs + pass_secs > at_secs;

        if self.loop_enabled && loopable {
            self.pass += 1;
            self.schedule_pass(at_secs);
            events.push(PlaybackEvent::LoopRestarted { pass: self.pass });
            return true;
        }

        if self.loop_enabled {
            warn!("Nothing left to loop; disabling loop");
            self.loop_enabled = false;
        }
        // Voices already sounding play out
        self.state = PlaybackState::Stopped;
        events.push(PlaybackEvent::Finished);
        info!("Playback finished");
        false
    }
}
