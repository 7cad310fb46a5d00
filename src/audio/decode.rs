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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use crate::samples::{DecodeError, DecodedAudio, Decoder};

/// Decodes WAV, FLAC, MP3, Ogg and the other formats symphonia supports.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> SymphoniaDecoder {
        SymphoniaDecoder
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedAudio, DecodeError> {
        let fail = |reason: String| DecodeError::new(path, reason);

        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| fail(e.to_string()))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| fail("no audio track found".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs()
            .make(&params, &decoder_opts)
            .map_err(|e| fail(e.to_string()))?;

        // Zero means unknown. The channel count is taken from the first decoded
        // packet when the container doesn't report it.
        let sample_rate = params.sample_rate.unwrap_or(0);
        let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let mut samples = Vec::with_capacity(
            params.n_frames.unwrap_or(0) as usize * channels.max(1) as usize,
        );

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => return Err(fail(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let decoded_channels = append_interleaved(decoded, &mut samples);
                    if channels == 0 {
                        channels = decoded_channels as u16;
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // A corrupt packet is skipped rather than failing the whole sample.
                    warn!(path = ?path, err = e, "Skipping undecodable packet");
                }
                Err(SymphoniaError::ResetRequired) => decoder.reset(),
                Err(e) => return Err(fail(e.to_string())),
            }
        }

        debug!(
            path = ?path,
            channels,
            sample_rate,
            samples = samples.len(),
            "Decoded sample file"
        );

        Ok(DecodedAudio::new(samples, channels, sample_rate))
    }
}

/// Appends the decoded buffer to `out` as interleaved f32 and returns its channel count.
fn append_interleaved(decoded: AudioBufferRef, out: &mut Vec<f32>) -> usize {
    match decoded {
        AudioBufferRef::F32(buf) => append_planar(&buf, out, |sample| sample),
        AudioBufferRef::F64(buf) => append_planar(&buf, out, |sample| sample as f32),
        AudioBufferRef::S8(buf) => append_planar(&buf, out, scale_s8),
        AudioBufferRef::S16(buf) => append_planar(&buf, out, scale_s16),
        AudioBufferRef::S24(buf) => append_planar(&buf, out, |sample| scale_s24(sample.inner())),
        AudioBufferRef::S32(buf) => append_planar(&buf, out, scale_s32),
        AudioBufferRef::U8(buf) => append_planar(&buf, out, scale_u8),
        AudioBufferRef::U16(buf) => append_planar(&buf, out, scale_u16),
        AudioBufferRef::U24(buf) => append_planar(&buf, out, |sample| scale_u24(sample.inner())),
        AudioBufferRef::U32(buf) => append_planar(&buf, out, scale_u32),
    }
}

/// Interleaves a planar buffer into `out`, converting each sample.
fn append_planar<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, convert: F) -> usize
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    let planes = planes.planes();
    out.reserve(frames * channels);
    for frame in 0..frames {
        for plane in planes.iter() {
            out.push(convert(plane[frame]));
        }
    }
    channels
}

// Scaling helpers for the integer formats.

#[inline]
fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
