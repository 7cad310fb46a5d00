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

//! Loaded samples indexed by MIDI note and by pad.
//!
//! Each slot is an `ArcSwapOption`, so the control context publishes a fully built
//! slot with a single pointer swap and the render context never sees a partial one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::debug;

use super::error::SamplerError;
use super::loader::{SampleBuffer, SampleLoader};
use super::{SlotKey, NOTE_COUNT, PAD_COUNT};

/// A loaded sample. Slots are immutable once published; reloading replaces the slot.
#[derive(Debug)]
pub struct SampleSlot {
    buffer: SampleBuffer,
    /// Rate reported by the decoder. Zero if unknown.
    source_rate: u32,
    /// The note the sample plays back unshifted at.
    root_note: u8,
    /// The file the sample was decoded from.
    path: PathBuf,
}

impl SampleSlot {
    pub fn new(buffer: SampleBuffer, source_rate: u32, root_note: u8, path: PathBuf) -> SampleSlot {
        SampleSlot {
            buffer,
            source_rate,
            root_note,
            path,
        }
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file name for display.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Owns every loaded sample. Shared between the control and render contexts.
pub struct SampleStore {
    notes: Vec<ArcSwapOption<SampleSlot>>,
    pads: Vec<ArcSwapOption<SampleSlot>>,
}

impl SampleStore {
    /// Creates an empty store.
    pub fn new() -> SampleStore {
        SampleStore {
            notes: (0..NOTE_COUNT).map(|_| ArcSwapOption::empty()).collect(),
            pads: (0..PAD_COUNT).map(|_| ArcSwapOption::empty()).collect(),
        }
    }

    fn cell(&self, key: SlotKey) -> Result<&ArcSwapOption<SampleSlot>, SamplerError> {
        match key {
            SlotKey::Note(note) => self
                .notes
                .get(note as usize)
                .ok_or_else(|| SamplerError::invalid_note(note)),
            SlotKey::Pad(pad) => self
                .pads
                .get(pad as usize)
                .ok_or_else(|| SamplerError::invalid_pad(pad)),
        }
    }

    /// Decodes the file and publishes it at the given slot. The file is decoded before
    /// anything is swapped, so a failure leaves the previous slot in place.
    pub fn load(
        &self,
        loader: &SampleLoader,
        key: SlotKey,
        path: &Path,
        root_note: u8,
    ) -> Result<Arc<SampleSlot>, SamplerError> {
        // Validate before decoding so a bad index doesn't cost a decode.
        let cell = self.cell(key)?;
        if root_note as usize >= NOTE_COUNT {
            return Err(SamplerError::invalid_note(root_note));
        }

        let loaded = loader.load(path)?;
        let slot = Arc::new(SampleSlot::new(
            loaded.buffer,
            loaded.source_rate,
            root_note,
            path.to_path_buf(),
        ));
        cell.store(Some(slot.clone()));

        debug!(slot = %key, path = ?path, "Sample slot replaced");
        Ok(slot)
    }

    /// Publishes an already loaded slot. Returns the slot that was replaced.
    pub fn install(
        &self,
        key: SlotKey,
        slot: Option<Arc<SampleSlot>>,
    ) -> Result<Option<Arc<SampleSlot>>, SamplerError> {
        Ok(self.cell(key)?.swap(slot))
    }

    /// Empties the slot. Voices still reading the old buffer keep it alive until
    /// they finish. Returns the slot that was removed.
    pub fn clear(&self, key: SlotKey) -> Result<Option<Arc<SampleSlot>>, SamplerError> {
        let previous = self.cell(key)?.swap(None);
        if previous.is_some() {
            debug!(slot = %key, "Sample slot cleared");
        }
        Ok(previous)
    }

    /// Returns the slot at the given key, if loaded.
    pub fn get(&self, key: SlotKey) -> Result<Option<Arc<SampleSlot>>, SamplerError> {
        Ok(self.cell(key)?.load_full())
    }

    /// Returns the playback slot for a note. Lock-free; out of range notes have no slot.
    #[inline]
    pub fn note_slot(&self, note: u8) -> Option<Arc<SampleSlot>> {
        self.notes.get(note as usize).and_then(|cell| cell.load_full())
    }

    /// Returns true if a sample is loaded for the given note.
    pub fn is_loaded(&self, note: u8) -> bool {
        self.notes
            .get(note as usize)
            .is_some_and(|cell| cell.load().is_some())
    }

    /// Returns every note that has a sample loaded, in ascending order.
    pub fn loaded_notes(&self) -> Vec<u8> {
        (0..NOTE_COUNT as u8)
            .filter(|note| self.is_loaded(*note))
            .collect()
    }

    /// Returns the memory used by note samples. Pad slots share their buffers with
    /// the note table, so they aren't counted.
    pub fn memory_usage(&self) -> usize {
        self.notes
            .iter()
            .filter_map(|cell| cell.load_full())
            .map(|slot| slot.buffer().memory_size())
            .sum()
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("loaded_notes", &self.loaded_notes().len())
            .field("memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}
