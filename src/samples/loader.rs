// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample decoding and in-memory buffers.
//!
//! Samples are decoded entirely into memory in the control context so the render
//! path only ever reads from finished buffers.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use super::error::DecodeError;

/// Audio decoded from a file, interleaved.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples.
    pub samples: Vec<f32>,
    /// Number of interleaved channels.
    pub channel_count: u16,
    /// Sample rate of the file. Zero means the rate is unknown.
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> DecodedAudio {
        DecodedAudio {
            samples,
            channel_count,
            sample_rate,
        }
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }
}

/// Decodes a file into memory. Format parsing lives behind this trait so the engine
/// can be driven by symphonia in production and by in-memory fixtures in tests.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError>;
}

/// A decoded sample held in planar form, ready for playback.
pub struct SampleBuffer {
    /// One Vec per channel, all of equal length.
    planes: Vec<Vec<f32>>,
    /// Frames per channel.
    frames: usize,
    /// Rate of the data held in `planes`.
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a planar buffer from interleaved samples. Trailing samples that don't
    /// form a full frame are dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> SampleBuffer {
        let channels = channel_count as usize;
        let frames = if channels > 0 {
            samples.len() / channels
        } else {
            0
        };

        let mut planes: Vec<Vec<f32>> = (0..channels)
            .map(|_| Vec::with_capacity(frames))
            .collect();
        for frame in samples.chunks_exact(channels.max(1)).take(frames) {
            for (plane, sample) in planes.iter_mut().zip(frame) {
                plane.push(*sample);
            }
        }

        SampleBuffer {
            planes,
            frames,
            sample_rate,
        }
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Returns the sample rate of the buffered data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the given frame down-mixed to mono. Out of range frames are silent.
    #[inline]
    pub fn mono_frame(&self, frame: usize) -> f32 {
        if self.planes.is_empty() {
            return 0.0;
        }
        let sum: f32 = self
            .planes
            .iter()
            .map(|plane| plane.get(frame).copied().unwrap_or(0.0))
            .sum();
        sum / self.planes.len() as f32
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.frames * self.planes.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channels", &self.planes.len())
            .field("frames", &self.frames)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// A successfully loaded sample along with the rate it was recorded at.
#[derive(Debug)]
pub struct LoadedSample {
    pub buffer: SampleBuffer,
    /// The rate reported by the decoder, before any conversion. Zero if unknown.
    pub source_rate: u32,
}

/// Decodes sample files and converts them to the output rate.
pub struct SampleLoader {
    decoder: Box<dyn Decoder>,
    /// Target sample rate for conversion (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(decoder: Box<dyn Decoder>, target_sample_rate: u32) -> Self {
        Self {
            decoder,
            target_sample_rate,
        }
    }

    /// Returns the output rate samples are converted to.
    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decodes the file into a playable buffer. Nothing is shared until this returns Ok.
    pub fn load(&self, path: &Path) -> Result<LoadedSample, DecodeError> {
        info!(path = ?path, "Loading sample into memory");

        let decoded = self.decoder.decode(path)?;
        if decoded.channel_count == 0 {
            return Err(DecodeError::new(path, "file has no audio channels"));
        }
        if decoded.frames() == 0 {
            return Err(DecodeError::new(path, "file contains no audio frames"));
        }

        let source_rate = decoded.sample_rate;
        let channel_count = decoded.channel_count;

        // An unknown source rate can't be converted, so it plays back as-is.
        let (samples, final_rate) = if source_rate > 0
            && self.target_sample_rate > 0
            && source_rate != self.target_sample_rate
        {
            debug!(
                source_rate,
                target_rate = self.target_sample_rate,
                "Converting sample rate"
            );
            (
                transcode_samples(
                    &decoded.samples,
                    channel_count,
                    source_rate,
                    self.target_sample_rate,
                ),
                self.target_sample_rate,
            )
        } else {
            (decoded.samples, source_rate)
        };

        let buffer = SampleBuffer::from_interleaved(&samples, channel_count, final_rate);

        info!(
            path = ?path,
            channels = channel_count,
            source_rate,
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );

        Ok(LoadedSample {
            buffer,
            source_rate,
        })
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("target_sample_rate", &self.target_sample_rate)
            .finish()
    }
}

/// Converts interleaved samples from one rate to another using linear interpolation.
/// Good enough for drum hits and one-shots.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemoryDecoder;

    #[test]
    fn test_transcode_samples() {
        let source_rate = 44100;
        let target_rate = 48000;
        let source_samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = transcode_samples(&source_samples, 1, source_rate, target_rate);

        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
    }

    #[test]
    fn test_transcode_stereo() {
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

        let result = transcode_samples(&source_samples, 2, 44100, 48000);

        assert!(result.len() >= 8);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }

    #[test]
    fn test_buffer_is_planar_and_downmixes() {
        let buffer = SampleBuffer::from_interleaved(&[0.2, 0.4, 1.0, 0.0, 0.5], 2, 48000);

        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel_count(), 2);
        assert!((buffer.mono_frame(0) - 0.3).abs() < f32::EPSILON);
        assert!((buffer.mono_frame(1) - 0.5).abs() < f32::EPSILON);
        assert_eq!(buffer.mono_frame(2), 0.0);
    }

    #[test]
    fn test_planes_are_sized_up_front() {
        let interleaved: Vec<f32> = (0..300).map(|i| i as f32).collect();
        let buffer = SampleBuffer::from_interleaved(&interleaved, 3, 44100);
        assert_eq!(buffer.frames(), 100);
        for plane in buffer.planes.iter() {
            assert_eq!(plane.len(), 100);
            assert_eq!(plane.capacity(), 100);
        }
    }

    #[test]
    fn test_load_converts_to_target_rate() {
        let decoder = MemoryDecoder::new().with_file(
            "/samples/kick.wav",
            DecodedAudio::new(vec![0.5; 44100], 1, 44100),
        );
        let loader = SampleLoader::new(Box::new(decoder), 48000);

        let loaded = loader.load(Path::new("/samples/kick.wav")).unwrap();
        assert_eq!(loaded.source_rate, 44100);
        assert_eq!(loaded.buffer.sample_rate(), 48000);
        assert!(loaded.buffer.frames().abs_diff(48000) <= 1);
    }

    #[test]
    fn test_load_keeps_unknown_rate() {
        let decoder = MemoryDecoder::new()
            .with_file("/samples/odd.raw", DecodedAudio::new(vec![0.5; 16], 2, 0));
        let loader = SampleLoader::new(Box::new(decoder), 48000);

        let loaded = loader.load(Path::new("/samples/odd.raw")).unwrap();
        assert_eq!(loaded.source_rate, 0);
        assert_eq!(loaded.buffer.frames(), 8);
    }

    #[test]
    fn test_load_rejects_empty_audio() {
        let decoder = MemoryDecoder::new()
            .with_file("/samples/empty.wav", DecodedAudio::new(vec![], 1, 44100))
            .with_file("/samples/nochan.wav", DecodedAudio::new(vec![0.1], 0, 44100));
        let loader = SampleLoader::new(Box::new(decoder), 44100);

        let err = loader.load(Path::new("/samples/empty.wav")).unwrap_err();
        assert_eq!(err.reason, "file contains no audio frames");
        let err = loader.load(Path::new("/samples/nochan.wav")).unwrap_err();
        assert_eq!(err.reason, "file has no audio channels");
        assert!(loader.load(Path::new("/samples/missing.wav")).is_err());
    }
}
