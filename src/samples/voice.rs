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

//! Voice allocation and rendering for polyphonic sample playback.
//!
//! The pool is owned by the render context. Voices are allocated from a fixed set
//! created up front; nothing here allocates once the pool is built.

use std::sync::Arc;

use crossbeam_channel::Sender;

use super::error::SamplerError;
use super::store::{SampleSlot, SampleStore};

/// Returns the playback rate for a note relative to the sample's root note, in equal
/// temperament. A sample with an unknown source rate always plays unshifted.
pub fn pitch_ratio(note: u8, root_note: u8, source_rate: u32) -> f64 {
    if source_rate == 0 {
        return 1.0;
    }
    let semitones = note as f64 - root_note as f64;
    2.0_f64.powf(semitones / 12.0)
}

/// The state of a single voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Playing,
}

/// The result of a note-on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A voice started playing. Holds the voice's index in the pool.
    Started { voice: usize },
    /// No sample is loaded for the note, so nothing plays.
    NoSample,
    /// Every voice is busy. The trigger was dropped.
    Exhausted,
}

impl TriggerOutcome {
    /// Returns whether a voice started, or an error if the pool was exhausted.
    pub fn check(self, note: u8) -> Result<bool, SamplerError> {
        match self {
            TriggerOutcome::Started { .. } => Ok(true),
            TriggerOutcome::NoSample => Ok(false),
            TriggerOutcome::Exhausted => Err(SamplerError::VoicePoolExhausted { note }),
        }
    }
}

/// One instance of in-progress sample playback.
#[derive(Debug)]
pub struct Voice {
    note: u8,
    velocity: f32,
    /// Fractional read position in source frames.
    position: f64,
    pitch_ratio: f64,
    /// The sample being read. Present only while playing.
    slot: Option<Arc<SampleSlot>>,
}

impl Voice {
    fn idle() -> Voice {
        Voice {
            note: 0,
            velocity: 0.0,
            position: 0.0,
            pitch_ratio: 1.0,
            slot: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        if self.slot.is_some() {
            VoiceState::Playing
        } else {
            VoiceState::Idle
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn pitch_ratio(&self) -> f64 {
        self.pitch_ratio
    }

    /// Renders into the interleaved output, additively. Returns false once the voice
    /// has reached the end of its sample.
    #[inline]
    fn render(&mut self, output: &mut [f32], channels: usize) -> bool {
        let Some(slot) = self.slot.as_ref() else {
            return false;
        };
        let buffer = slot.buffer();
        let frames = buffer.frames();

        for out_frame in output.chunks_exact_mut(channels) {
            let index = self.position as usize;
            // Check the end before reading so the last frame is never followed by a
            // wrapped read of the first.
            if index >= frames {
                return false;
            }
            let sample = buffer.mono_frame(index) * self.velocity;
            for out in out_frame.iter_mut() {
                *out += sample;
            }
            self.position += self.pitch_ratio;
        }

        (self.position as usize) < frames
    }
}

/// A fixed set of voices. Owned by the render context.
pub struct VoicePool {
    voices: Vec<Voice>,
    /// Receives slots released by retiring voices so the last reference, and the
    /// buffer free that comes with it, happens off the render thread.
    reclaimer: Option<Sender<Arc<SampleSlot>>>,
}

impl VoicePool {
    /// Creates a pool with the given number of voices.
    pub fn new(size: usize) -> VoicePool {
        VoicePool {
            voices: (0..size).map(|_| Voice::idle()).collect(),
            reclaimer: None,
        }
    }

    /// Sends released slots to the given channel instead of dropping them in place.
    pub fn with_reclaimer(mut self, reclaimer: Sender<Arc<SampleSlot>>) -> VoicePool {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// Starts a voice for the note using the first idle voice in pool order. Voices are
    /// never stolen.
    pub fn note_on(&mut self, note: u8, velocity: f32, store: &SampleStore) -> TriggerOutcome {
        let idle = self.voices.iter().position(|voice| voice.slot.is_none());
        let Some(slot) = store.note_slot(note) else {
            return TriggerOutcome::NoSample;
        };
        let Some(index) = idle else {
            // The slot may have been replaced since it was read, so this could be the
            // last reference.
            self.reclaim(slot);
            return TriggerOutcome::Exhausted;
        };

        let voice = &mut self.voices[index];
        voice.note = note;
        voice.velocity = velocity.clamp(0.0, 1.0);
        voice.position = 0.0;
        voice.pitch_ratio = pitch_ratio(note, slot.root_note(), slot.source_rate());
        voice.slot = Some(slot);

        TriggerOutcome::Started { voice: index }
    }

    /// Hard-stops the first voice playing the note. In one-shot mode this does nothing.
    /// Returns true if a voice was stopped.
    pub fn note_off(&mut self, note: u8, one_shot: bool) -> bool {
        if one_shot {
            return false;
        }
        let Some(index) = self
            .voices
            .iter()
            .position(|voice| voice.slot.is_some() && voice.note == note)
        else {
            return false;
        };
        self.retire(index);
        true
    }

    /// Stops every playing voice. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for index in 0..self.voices.len() {
            if self.voices[index].slot.is_some() {
                self.retire(index);
                stopped += 1;
            }
        }
        stopped
    }

    /// Mixes every playing voice into the interleaved output. The output is not cleared
    /// first and nothing is clipped.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for index in 0..self.voices.len() {
            if self.voices[index].slot.is_none() {
                continue;
            }
            if !self.voices[index].render(output, channels) {
                self.retire(index);
            }
        }
    }

    fn retire(&mut self, index: usize) {
        if let Some(slot) = self.voices[index].slot.take() {
            self.reclaim(slot);
        }
    }

    fn reclaim(&self, slot: Arc<SampleSlot>) {
        if let Some(reclaimer) = &self.reclaimer {
            // A full or closed channel drops the reference here instead.
            let _ = reclaimer.try_send(slot);
        }
    }

    /// Returns the voice at the given index.
    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn size(&self) -> usize {
        self.voices.len()
    }

    /// Returns the number of playing voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.slot.is_some()).count()
    }

    /// Returns the number of idle voices.
    pub fn free_count(&self) -> usize {
        self.voices.len() - self.active_count()
    }

    /// Returns true if any voice is playing the note.
    pub fn is_playing(&self, note: u8) -> bool {
        self.voices
            .iter()
            .any(|v| v.slot.is_some() && v.note == note)
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.active_count())
            .field("size", &self.voices.len())
            .finish()
    }
}
