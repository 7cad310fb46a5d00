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
use std::{error::Error, fmt, sync::Arc};

use midly::live::LiveEvent;
use midly::MidiMessage;
use tokio::sync::mpsc::Sender;

mod midir;
mod mock;

/// Whether a note event starts or ends a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// A note event from the MIDI input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MidiEvent {
    pub kind: NoteKind,
    /// MIDI note number, 0-127.
    pub note: u8,
    /// Normalized velocity, 0.0-1.0.
    pub velocity: f32,
    /// Device timestamp in microseconds. Zero for events created locally.
    pub timestamp: u64,
}

impl MidiEvent {
    pub fn note_on(note: u8, velocity: f32) -> MidiEvent {
        MidiEvent {
            kind: NoteKind::NoteOn,
            note,
            velocity,
            timestamp: 0,
        }
    }

    pub fn note_off(note: u8) -> MidiEvent {
        MidiEvent {
            kind: NoteKind::NoteOff,
            note,
            velocity: 0.0,
            timestamp: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> MidiEvent {
        self.timestamp = timestamp;
        self
    }

    /// Returns true if this event starts a note. A note-on with zero velocity ends one.
    pub fn is_note_on(&self) -> bool {
        self.kind == NoteKind::NoteOn && self.velocity > 0.0
    }

    /// Parses a raw MIDI message. Anything other than a note-on or note-off, on any
    /// channel, returns None.
    pub fn parse(raw: &[u8], timestamp: u64) -> Option<MidiEvent> {
        let LiveEvent::Midi { message, .. } = LiveEvent::parse(raw).ok()? else {
            return None;
        };
        let event = match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                MidiEvent::note_on(key.as_int(), vel.as_int() as f32 / 127.0)
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                MidiEvent::note_off(key.as_int())
            }
            _ => return None,
        };
        Some(event.with_timestamp(timestamp))
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let note = crate::samples::note_name(self.note);
        if self.is_note_on() {
            write!(f, "note on {} ({}) vel {:.2}", self.note, note, self.velocity)
        } else {
            write!(f, "note off {} ({})", self.note, note)
        }
    }
}

/// A MIDI input device.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Watches MIDI input for note events and sends them to the given sender.
    fn watch_events(&self, sender: Sender<MidiEvent>) -> Result<(), Box<dyn Error>>;

    /// Stops watching events.
    fn stop_watch_events(&self);
}

/// Lists input devices known to midir.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    midir::list()
}

/// Gets a device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(midir::get(name)?))
}

#[cfg(test)]
pub mod test {
    pub use super::mock::Device;
}
