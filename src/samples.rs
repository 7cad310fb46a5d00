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

//! MIDI-triggered sample playback.
//!
//! This module provides:
//! - Sample decoding into shared in-memory buffers, indexed by MIDI note and by pad
//! - Pad to note bindings
//! - A fixed voice pool rendered from the audio callback
//! - The MIDI Learn / Sample Learn assignment protocol
//! - Export and import of the full mapping as a JSON document

use std::fmt;
use std::str::FromStr;

mod document;
mod engine;
mod error;
mod learn;
mod loader;
mod notemap;
mod store;
mod voice;

pub use document::{ButtonEntry, Document, ImportReport, NoteEntry, DOCUMENT_VERSION};
pub use engine::{PadPress, Routed, Renderer, Sampler, SamplerOptions};
pub use error::{DecodeError, SamplerError};
pub use learn::{AssignmentController, LearnAction, LearnSession, PadSelection, Routing};
pub use loader::{DecodedAudio, Decoder, LoadedSample, SampleBuffer, SampleLoader};
pub use notemap::NoteMap;
pub use store::{SampleSlot, SampleStore};
pub use voice::{pitch_ratio, TriggerOutcome, Voice, VoicePool, VoiceState};

/// Number of UI pads.
pub const PAD_COUNT: usize = 16;

/// Number of addressable MIDI notes.
pub const NOTE_COUNT: usize = 128;

/// The note pad 0 is bound to by default (C2). Pad i is bound to this plus i.
pub const DEFAULT_BASE_NOTE: u8 = 36;

/// Identifies a sample slot, either in the note table or the pad table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Note(u8),
    Pad(u8),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Note(note) => write!(f, "note {} ({})", note, note_name(*note)),
            SlotKey::Pad(pad) => write!(f, "pad {}", pad),
        }
    }
}

impl FromStr for SlotKey {
    type Err = String;

    /// Parses `36` as a note and `p3` (or `pad3`) as a pad.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (digits, is_pad) = match s.strip_prefix("pad").or_else(|| s.strip_prefix('p')) {
            Some(rest) => (rest, true),
            None => (s.as_str(), false),
        };
        let index: u8 = digits
            .parse()
            .map_err(|_| format!("'{}' is not a note number or p<pad>", s))?;
        Ok(if is_pad {
            SlotKey::Pad(index)
        } else {
            SlotKey::Note(index)
        })
    }
}

/// Returns the name of the given note, with middle C (60) as C4.
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NAMES[note as usize % 12], octave)
}
