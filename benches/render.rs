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
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use padsampler::midi::MidiEvent;
use padsampler::samples::{
    DecodeError, DecodedAudio, Decoder, SampleLoader, Sampler, SamplerOptions, SlotKey,
};

const BLOCK_FRAMES: usize = 256;

/// Decodes every path to a few seconds of a stereo tone.
struct ToneDecoder {
    sample_rate: u32,
}

impl Decoder for ToneDecoder {
    fn decode(&self, _path: &Path) -> Result<DecodedAudio, DecodeError> {
        let frames = self.sample_rate as usize * 4;
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / self.sample_rate as f32;
            let sample = 0.3 * (2.0 * std::f32::consts::PI * 220.0 * t).sin();
            samples.push(sample);
            samples.push(-sample);
        }
        Ok(DecodedAudio::new(samples, 2, self.sample_rate))
    }
}

fn benchmark_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for voices in [1usize, 8, 16, 32] {
        let options = SamplerOptions {
            voices,
            ..SamplerOptions::default()
        };
        let (sampler, mut renderer) = Sampler::new(
            Box::new(ToneDecoder {
                sample_rate: options.sample_rate,
            }),
            &options,
        );
        for note in 0..voices as u8 {
            sampler
                .load_sample(SlotKey::Note(36 + note), Path::new("tone.wav"))
                .unwrap();
        }
        let mut output = vec![0.0f32; BLOCK_FRAMES * 2];

        group.bench_with_input(BenchmarkId::new("voices", voices), &voices, |b, &voices| {
            b.iter(|| {
                sampler.stop_all();
                for note in 0..voices as u8 {
                    sampler
                        .handle_midi_event(MidiEvent::note_on(36 + note, 0.8))
                        .unwrap();
                }
                renderer.render(black_box(&mut output), 2);
                sampler.collect_garbage();
            })
        });
    }

    group.finish();
}

fn benchmark_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    let test_cases = vec![
        ("44.1kHz_native", 44100, 44100),
        ("48kHz_to_44.1kHz", 48000, 44100),
        ("96kHz_to_48kHz", 96000, 48000),
    ];

    for (name, source_rate, target_rate) in test_cases {
        let loader = SampleLoader::new(
            Box::new(ToneDecoder {
                sample_rate: source_rate,
            }),
            target_rate,
        );

        group.bench_function(name, |b| {
            b.iter(|| black_box(loader.load(Path::new("tone.wav")).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_render, benchmark_load);
criterion_main!(benches);
