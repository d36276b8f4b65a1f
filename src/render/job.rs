//! Background render jobs
//!
//! A job renders a copy of the timeline on a worker thread and reports back
//! over a channel, so the caller's thread only ever sees events it pulls.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::error::{PadtrackError, Result};
use crate::render::renderer::{
    CancelToken, NoopObserver, RenderObserver, RenderState, TimelineRenderer,
};
use crate::timeline::{RenderLock, RenderedTrack, Timeline};

/// Event sent from a render worker
#[derive(Debug)]
pub enum RenderEvent {
    State(RenderState),
    Progress(f64),
    /// Last event of every job
    Finished(Result<RenderedTrack>),
}

/// Holds a timeline's busy flag for the lifetime of one render
#[derive(Debug)]
pub struct RenderGuard {
    lock: RenderLock,
}

impl RenderGuard {
    /// Acquire `lock`, failing with `RenderBusy` if a render holds it
    pub fn acquire(lock: &RenderLock) -> Result<Self> {
        if lock.try_acquire() {
            Ok(Self { lock: lock.clone() })
        } else {
            Err(PadtrackError::RenderBusy)
        }
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Forwards observer callbacks into the job channel
struct ChannelObserver {
    events: Sender<RenderEvent>,
}

impl RenderObserver for ChannelObserver {
    fn on_state(&mut self, state: &RenderState) {
        // A dropped receiver just means nobody is listening
        let _ = self.events.send(RenderEvent::State(state.clone()));
    }

    fn on_progress(&mut self, progress: f64) {
        let _ = self.events.send(RenderEvent::Progress(progress));
    }
}

/// A render running on a worker thread
#[derive(Debug)]
pub struct RenderJob {
    events: Receiver<RenderEvent>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl RenderJob {
    /// Start rendering a copy of `timeline`
    ///
    /// Edits made to `timeline` after this returns do not affect the job.
    ///
    /// # Errors
    /// * `RenderBusy` - If a render of this timeline is still running
    pub fn spawn(
        renderer: TimelineRenderer,
        timeline: &Timeline,
        track_name: impl Into<String>,
    ) -> Result<Self> {
        let guard = RenderGuard::acquire(timeline.render_lock())?;
        let snapshot = timeline.clone();
        let track_name = track_name.into();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();

        debug!("Spawning render job for '{}'", track_name);

        let handle = thread::Builder::new()
            .name("padtrack-render".to_string())
            .spawn(move || {
                let _guard = guard;
                let mut observer = ChannelObserver { events: tx.clone() };
                let result =
                    renderer.render(&snapshot, &track_name, &mut observer, Some(&worker_cancel));
                let _ = tx.send(RenderEvent::Finished(result));
            })?;

        Ok(Self {
            events: rx,
            cancel,
            handle: Some(handle),
        })
    }

    /// Ask the worker to stop before its next item
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Next pending event, if any
    pub fn try_next(&self) -> Option<RenderEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event
    pub fn next_timeout(&self, timeout: Duration) -> Option<RenderEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until the job finishes, passing intermediate events to `observer`
    pub fn wait_with(mut self, observer: &mut dyn RenderObserver) -> Result<RenderedTrack> {
        let mut outcome = None;
        for event in self.events.iter() {
            match event {
                RenderEvent::State(state) => observer.on_state(&state),
                RenderEvent::Progress(progress) => observer.on_progress(progress),
                RenderEvent::Finished(result) => {
                    outcome = Some(result);
                    break;
                }
            }
        }
        self.join();

        outcome.unwrap_or_else(|| {
            Err(PadtrackError::WriteFailure {
                path: Default::default(),
                reason: "render worker exited without a result".to_string(),
            })
        })
    }

    /// Block until the job finishes
    pub fn wait(self) -> Result<RenderedTrack> {
        self.wait_with(&mut NoopObserver)
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Render worker panicked");
            }
        }
    }
}
