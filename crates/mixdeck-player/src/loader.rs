//! Audio file loading for the console
//!
//! Decodes a file with Symphonia into interleaved `f32` PCM and builds the
//! [`Track`] record the mixer expects. Title, artist and BPM come from the
//! file's tags when present, otherwise the title falls back to the file stem.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use mixdeck_core::audio_file::PcmData;
use mixdeck_core::{Track, TrackId};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;

const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A decoded file ready for [`MixerState::load_track`](mixdeck_core::MixerState::load_track)
pub struct LoadedFile {
    pub track: Track,
    pub pcm: PcmData,
}

#[derive(Debug, Default)]
struct FileTags {
    title: Option<String>,
    artist: Option<String>,
    bpm: Option<f64>,
}

impl FileTags {
    fn absorb(&mut self, tags: &[Tag]) {
        for tag in tags {
            let value = tag.value.to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => self.title = Some(value.to_string()),
                Some(StandardTagKey::Artist) => self.artist = Some(value.to_string()),
                Some(StandardTagKey::Bpm) => {
                    self.bpm = value.parse::<f64>().ok().filter(|b| b.is_finite() && *b > 0.0)
                }
                _ => {}
            }
        }
    }
}

/// Decode `path` and describe it as track `id`
pub fn load_file(path: &Path, id: TrackId) -> Result<LoadedFile> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported audio format: {:?}", path))?;

    let mut tags = FileTags::default();
    if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        tags.absorb(revision.tags());
    }
    let mut format = probed.format;
    if let Some(revision) = format.metadata().current() {
        tags.absorb(revision.tags());
    }

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("No audio track in {:?}", path))?;
    let stream_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate in {:?}", path))?;
    let channels = track.codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("No decoder for {:?}", path))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                log::warn!("Error reading packet from {:?}: {}", path, e);
                break;
            }
        };
        if packet.track_id() != stream_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet from {:?}: {}", path, e);
                continue;
            }
        };

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let frames = samples.len() / channels.max(1) as usize;
    let duration_seconds = frames as f64 / sample_rate as f64;
    log::info!(
        "Decoded {:?}: {} frames, {} Hz, {} ch ({:.1}s)",
        path,
        frames,
        sample_rate,
        channels,
        duration_seconds
    );

    let title = tags.title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });

    Ok(LoadedFile {
        track: Track {
            id,
            title,
            artist: tags.artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            duration_seconds,
            bpm: tags.bpm,
            key: None,
            audio_source: path.display().to_string(),
        },
        pcm: PcmData::new(sample_rate, channels, samples),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize, value: i16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as usize {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_stereo_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Opening Set.wav");
        write_wav(&path, 2, 44_100, 44_100, 16_384);

        let loaded = load_file(&path, 7).unwrap();
        assert_eq!(loaded.track.id, 7);
        assert_eq!(loaded.track.title, "Opening Set");
        assert_eq!(loaded.track.artist, UNKNOWN_ARTIST);
        assert!((loaded.track.duration_seconds - 1.0).abs() < 1e-9);
        assert_eq!(loaded.track.audio_source, path.display().to_string());

        assert_eq!(loaded.pcm.sample_rate, 44_100);
        assert_eq!(loaded.pcm.channels, 2);
        assert_eq!(loaded.pcm.samples.len(), 88_200);
        assert!(loaded.pcm.samples.iter().all(|s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_load_mono_wav_decodes_for_mixer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 1, 48_000, 4_800, -8_192);

        let loaded = load_file(&path, 1).unwrap();
        assert_eq!(loaded.pcm.channels, 1);
        assert_eq!(loaded.pcm.samples.len(), 4_800);

        let buffer = mixdeck_core::audio_file::DecodedBuffer::decode(1, loaded.pcm).unwrap();
        assert_eq!(buffer.frames(), 4_800);
        assert!(buffer.check_format(48_000).is_ok());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = load_file(&dir.path().join("nope.wav"), 1).err().unwrap();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[test]
    fn test_garbage_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(load_file(&path, 1).is_err());
    }
}
