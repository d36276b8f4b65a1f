//! Audio file I/O for Padtrack
//!
//! WAV sources are read with `hound`; every other container (MP3, AIFF,
//! FLAC, OGG) is decode-only through `symphonia`. Decoding never resamples:
//! the buffer comes back in the file's native rate and channel count.
//!
//! Rendered assets are always written as 32-bit float WAV.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::buffer::{AudioBuffer, AudioFormat};
use crate::error::{PadtrackError, Result};

/// Decode an audio file into a buffer in its native format
///
/// `name` is the user-facing clip name used in error messages.
///
/// # Errors
/// * `SourceNotFound` - If the path is not a readable file
/// * `UnsupportedFormat` - If the container or codec cannot be decoded
pub fn decode_file(path: &Path, name: &str) -> Result<AudioBuffer> {
    ensure_readable(path, name)?;

    if is_wav(path) {
        decode_wav(path, name)
    } else {
        decode_with_symphonia(path, name)
    }
}

/// Header-level description of an audio file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeInfo {
    /// Native format of the file
    pub format: AudioFormat,
    /// Number of frames
    pub frames: u64,
}

impl ProbeInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.format.sample_rate as f64
    }
}

/// Read format and length of an audio file, from its header when possible
pub fn probe_file(path: &Path, name: &str) -> Result<ProbeInfo> {
    ensure_readable(path, name)?;

    if is_wav(path) {
        let reader = WavReader::open(path).map_err(|e| unsupported(name, e.to_string()))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(unsupported(name, "zero sample rate".to_string()));
        }
        return Ok(ProbeInfo {
            format: AudioFormat::new(spec.sample_rate, spec.channels),
            frames: reader.duration() as u64,
        });
    }

    let format = open_symphonia(path, name)?;
    let header = format.default_track().and_then(|track| {
        let params = &track.codec_params;
        Some(ProbeInfo {
            format: AudioFormat::new(params.sample_rate?, params.channels?.count() as u16),
            frames: params.n_frames?,
        })
    });

    match header {
        Some(info) if info.format.sample_rate > 0 => Ok(info),
        // No frame count in the header: decode to measure
        _ => {
            let decoded = decode_with_symphonia(path, name)?;
            Ok(ProbeInfo {
                format: decoded.format(),
                frames: decoded.frame_count() as u64,
            })
        }
    }
}

/// Duration of an audio file in seconds
pub fn probe_duration(path: &Path, name: &str) -> Result<f64> {
    Ok(probe_file(path, name)?.duration_secs())
}

/// Write a buffer as a 32-bit float WAV file at `path`
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| write_failure(path, e.to_string()))?;
    write_wav_to(buffer, BufWriter::new(file), path)
}

/// Write a buffer as a 32-bit float WAV stream
///
/// `path` is only used for error reporting.
pub fn write_wav_to<W: Write + Seek>(buffer: &AudioBuffer, writer: W, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.format().channels,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut wav = WavWriter::new(writer, spec).map_err(|e| write_failure(path, e.to_string()))?;
    for sample in buffer.to_interleaved() {
        wav.write_sample(sample)
            .map_err(|e| write_failure(path, e.to_string()))?;
    }
    wav.finalize().map_err(|e| write_failure(path, e.to_string()))?;

    Ok(())
}

/// Hex-encoded SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> Result<String> {
    let content = fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

/// Whether the path has an extension this engine can decode
pub fn is_supported_extension(path: &Path) -> bool {
    matches!(
        extension(path).as_deref(),
        Some("wav" | "wave" | "mp3" | "aif" | "aiff" | "flac" | "ogg" | "m4a" | "caf")
    )
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn ensure_readable(path: &Path, name: &str) -> Result<()> {
    if !path.is_file() {
        return Err(PadtrackError::SourceNotFound {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn is_wav(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("wav" | "wave"))
}

fn unsupported(name: &str, reason: String) -> PadtrackError {
    PadtrackError::UnsupportedFormat {
        name: name.to_string(),
        reason,
    }
}

fn write_failure(path: &Path, reason: String) -> PadtrackError {
    PadtrackError::WriteFailure {
        path: path.to_path_buf(),
        reason,
    }
}

fn decode_wav(path: &Path, name: &str) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) if io.kind() == ErrorKind::NotFound => {
            PadtrackError::SourceNotFound {
                name: name.to_string(),
                path: path.to_path_buf(),
            }
        }
        other => unsupported(name, format!("Failed to open WAV file: {}", other)),
    })?;

    let spec = reader.spec();
    let format = AudioFormat::new(spec.sample_rate, spec.channels);
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|reason| unsupported(name, reason))?;

    debug!(
        "Decoded WAV {} ({}, {} samples)",
        path.display(),
        format,
        interleaved.len()
    );

    AudioBuffer::from_interleaved(&interleaved, format)
        .map_err(|e| unsupported(name, e.to_string()))
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, String> {
    let collected: std::result::Result<Vec<f32>, hound::Error> = match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader.samples::<f32>().collect(),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect(),
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect(),
        (SampleFormat::Int, bits) => return Err(format!("{}-bit integer audio", bits)),
    };

    collected.map_err(|e| format!("Failed to read samples: {}", e))
}

fn open_symphonia(path: &Path, name: &str) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path).map_err(|_| PadtrackError::SourceNotFound {
        name: name.to_string(),
        path: path.to_path_buf(),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension(path) {
        hint.with_extension(&ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unsupported(name, format!("Failed to probe format: {}", e)))?;

    Ok(probed.format)
}

fn decode_with_symphonia(path: &Path, name: &str) -> Result<AudioBuffer> {
    let mut format = open_symphonia(path, name)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unsupported(name, "No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported(name, format!("Failed to create decoder: {}", e)))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count() as u16);
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unsupported(name, format!("Error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(samples.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(unsupported(name, format!("Decode error: {}", e))),
        }
    }

    let (Some(sample_rate), Some(channels)) = (sample_rate, channels) else {
        return Err(unsupported(
            name,
            "Sample rate or channel count not found".to_string(),
        ));
    };

    debug!(
        "Decoded {} via symphonia ({}Hz/{}ch, {} samples)",
        path.display(),
        sample_rate,
        channels,
        interleaved.len()
    );

    AudioBuffer::from_interleaved(&interleaved, AudioFormat::new(sample_rate, channels))
        .map_err(|e| unsupported(name, e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
