//! Playback voices
//!
//! A voice is one clip sounding once. Backends create voices; the pool
//! owns them until they finish or playback stops.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::normalizer::FormatNormalizer;
use crate::error::{PadtrackError, Result};
use crate::timeline::ClipRef;

/// One clip playing once from `started_at`
#[derive(Debug, Clone)]
pub struct Voice {
    id: u64,
    clip: ClipRef,
    started_at: f64,
    duration_secs: f64,
    audio: Option<Arc<AudioBuffer>>,
}

impl Voice {
    pub fn new(clip: ClipRef, started_at: f64, duration_secs: f64) -> Self {
        Self {
            id: 0,
            clip,
            started_at,
            duration_secs,
            audio: None,
        }
    }

    /// Attach the decoded audio this voice plays
    pub fn with_audio(mut self, audio: Arc<AudioBuffer>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Pool-assigned id, unique within one scheduler
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn clip(&self) -> &ClipRef {
        &self.clip
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn ends_at(&self) -> f64 {
        self.started_at + self.duration_secs
    }

    pub fn audio(&self) -> Option<&Arc<AudioBuffer>> {
        self.audio.as_ref()
    }

    pub fn is_finished(&self, now_secs: f64) -> bool {
        now_secs >= self.ends_at()
    }
}

/// Creates and silences voices
pub trait VoiceBackend {
    /// Start `clip` at `at_secs`; an error skips this voice only
    fn start(&mut self, clip: &ClipRef, at_secs: f64) -> Result<Voice>;

    /// Silence a voice before it finishes
    fn stop(&mut self, _voice: &Voice) {}
}

/// Backend that decodes each clip to learn its length
///
/// Decoded audio is cached per path, but the file must still exist at
/// start time.
#[derive(Debug, Default)]
pub struct DecodedVoiceBackend {
    normalizer: FormatNormalizer,
    cache: HashMap<PathBuf, Arc<AudioBuffer>>,
}

impl DecodedVoiceBackend {
    pub fn new(normalizer: FormatNormalizer) -> Self {
        Self {
            normalizer,
            cache: HashMap::new(),
        }
    }

    fn load(&mut self, clip: &ClipRef) -> Result<Arc<AudioBuffer>> {
        if !clip.file_path.is_file() {
            self.cache.remove(&clip.file_path);
            return Err(PadtrackError::SourceNotFound {
                name: clip.display_name.clone(),
                path: clip.file_path.clone(),
            });
        }
        if let Some(audio) = self.cache.get(&clip.file_path) {
            return Ok(Arc::clone(audio));
        }
        let audio = Arc::new(
            self.normalizer
                .normalize(&clip.file_path, &clip.display_name)?,
        );
        self.cache.insert(clip.file_path.clone(), Arc::clone(&audio));
        Ok(audio)
    }
}

impl VoiceBackend for DecodedVoiceBackend {
    fn start(&mut self, clip: &ClipRef, at_secs: f64) -> Result<Voice> {
        let audio = self.load(clip)?;
        Ok(Voice::new(clip.clone(), at_secs, audio.duration_secs()).with_audio(audio))
    }
}

/// Voices currently sounding
#[derive(Debug, Default)]
pub struct VoicePool {
    voices: Vec<Voice>,
    next_id: u64,
    started: usize,
}

impl VoicePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a started voice, returning its id
    pub fn add(&mut self, mut voice: Voice) -> u64 {
        self.next_id += 1;
        voice.id = self.next_id;
        self.started += 1;
        self.voices.push(voice);
        self.next_id
    }

    /// Remove and return voices that have played to the end
    pub fn prune_finished(&mut self, now_secs: f64) -> Vec<Voice> {
        let (finished, active): (Vec<Voice>, Vec<Voice>) = self
            .voices
            .drain(..)
            .partition(|voice| voice.is_finished(now_secs));
        self.voices = active;
        for voice in &finished {
            debug!("Voice {} ({}) finished", voice.id, voice.clip.display_name);
        }
        finished
    }

    /// Remove every voice
    pub fn drain(&mut self) -> Vec<Voice> {
        self.voices.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Voice> {
        self.voices.iter()
    }

    /// Voices ever added to this pool
    pub fn started_total(&self) -> usize {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::CANONICAL_FORMAT;
    use crate::engine::io::write_wav;
    use std::fs;
    use tempfile::TempDir;

    fn clip(name: &str) -> ClipRef {
        ClipRef::new(name, name, PathBuf::from(format!("{}.wav", name)))
    }

    #[test]
    fn test_pool_prunes_finished_voices() {
        let mut pool = VoicePool::new();
        let a = pool.add(Voice::new(clip("kick"), 0.0, 0.3));
        let b = pool.add(Voice::new(clip("snare"), 0.25, 0.3));
        assert_ne!(a, b);

        let finished = pool.prune_finished(0.4);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].id(), a);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.drain().len(), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.started_total(), 2);
    }

    #[test]
    fn test_decoded_backend_uses_real_duration() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kick.wav");
        write_wav(&AudioBuffer::silent(CANONICAL_FORMAT, 13230), &path).unwrap();

        let mut backend = DecodedVoiceBackend::default();
        let voice = backend.start(&ClipRef::from_path(&path), 1.0).unwrap();
        assert!((voice.duration_secs() - 0.3).abs() < 1e-9);
        assert!((voice.ends_at() - 1.3).abs() < 1e-9);
        assert!(voice.audio().is_some());
    }

    #[test]
    fn test_decoded_backend_notices_deleted_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hat.wav");
        write_wav(&AudioBuffer::silent(CANONICAL_FORMAT, 100), &path).unwrap();

        let mut backend = DecodedVoiceBackend::default();
        let clip = ClipRef::from_path(&path);
        assert!(backend.start(&clip, 0.0).is_ok());

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            backend.start(&clip, 0.5),
            Err(PadtrackError::SourceNotFound { .. })
        ));
    }
}
