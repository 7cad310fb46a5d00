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
//! Pad to note bindings.

use super::error::SamplerError;
use super::{note_name, DEFAULT_BASE_NOTE, NOTE_COUNT, PAD_COUNT};

/// Maps each of the pads to a MIDI note. Every pad is always bound to exactly one note,
/// but several pads may share a note and most notes have no pad.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteMap {
    notes: [u8; PAD_COUNT],
}

impl NoteMap {
    /// Creates the default map, pad i bound to note 36 + i.
    pub fn new() -> NoteMap {
        let mut notes = [0u8; PAD_COUNT];
        for (pad, note) in notes.iter_mut().enumerate() {
            *note = DEFAULT_BASE_NOTE + pad as u8;
        }
        NoteMap { notes }
    }

    /// Binds the pad to the note. Voices already playing are bound to notes, not pads,
    /// so they're unaffected.
    pub fn bind(&mut self, pad: usize, note: u8) -> Result<(), SamplerError> {
        if note as usize >= NOTE_COUNT {
            return Err(SamplerError::invalid_note(note));
        }
        let slot = self
            .notes
            .get_mut(pad)
            .ok_or_else(|| SamplerError::invalid_pad(pad as i64))?;
        *slot = note;
        Ok(())
    }

    /// Returns the note the pad is bound to.
    pub fn resolve(&self, pad: usize) -> Result<u8, SamplerError> {
        self.notes
            .get(pad)
            .copied()
            .ok_or_else(|| SamplerError::invalid_pad(pad as i64))
    }

    /// Returns every pad bound to the note.
    pub fn pads_for_note(&self, note: u8) -> Vec<usize> {
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, bound)| **bound == note)
            .map(|(pad, _)| pad)
            .collect()
    }

    /// Returns all bindings in pad order.
    pub fn bindings(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.notes.iter().copied().enumerate()
    }
}

impl Default for NoteMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NoteMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (pad, note) in self.bindings() {
            if pad > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", pad, note_name(note))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let map = NoteMap::new();
        assert_eq!(map.resolve(0).unwrap(), 36);
        assert_eq!(map.resolve(15).unwrap(), 51);
        assert_eq!(map.bindings().count(), PAD_COUNT);
    }

    #[test]
    fn test_bind() {
        let mut map = NoteMap::new();
        map.bind(5, 72).unwrap();
        assert_eq!(map.resolve(5).unwrap(), 72);

        // Not injective.
        map.bind(6, 72).unwrap();
        assert_eq!(map.pads_for_note(72), vec![5, 6]);
        assert!(map.pads_for_note(41).is_empty());
    }

    #[test]
    fn test_out_of_range() {
        let mut map = NoteMap::new();
        assert!(matches!(
            map.bind(16, 60),
            Err(SamplerError::InvalidIndex { kind: "pad", index: 16, .. })
        ));
        assert!(matches!(
            map.bind(0, 128),
            Err(SamplerError::InvalidIndex { kind: "note", index: 128, .. })
        ));
        assert!(map.resolve(99).is_err());
        assert_eq!(map, NoteMap::new());
    }

    #[test]
    fn test_display() {
        let mut map = NoteMap::new();
        map.bind(0, 60).unwrap();
        assert!(map.to_string().starts_with("0:C4 1:C#2"));
    }
}
