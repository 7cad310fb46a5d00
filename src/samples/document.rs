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

//! The exported mapping document.
//!
//! Holds the one-shot flag, every pad binding and the source path of every loaded note.
//! Sample data is never embedded; it's decoded again from the stored paths on import.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::SamplerError;
use super::notemap::NoteMap;
use super::store::SampleStore;
use super::{SlotKey, NOTE_COUNT, PAD_COUNT};

/// The document version written on export.
pub const DOCUMENT_VERSION: &str = "1.0";

/// A pad entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonEntry {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub midi_note: Option<i64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// A note entry. An empty path means the note has no sample. The root note is only
/// written when it differs from the entry's note.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    #[serde(default)]
    pub midi_note: Option<i64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_note: Option<i64>,
}

/// The full mapping document. Every field is optional on import.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_shot_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ButtonEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi_notes: Option<Vec<NoteEntry>>,
}

impl Document {
    /// Captures the current state. Always holds every pad and every note, in index order.
    pub fn capture(one_shot: bool, note_map: &NoteMap, store: &SampleStore) -> Document {
        let path_of = |key: SlotKey| {
            store
                .get(key)
                .ok()
                .flatten()
                .map(|slot| slot.path().to_string_lossy().to_string())
                .unwrap_or_default()
        };

        let buttons = note_map
            .bindings()
            .map(|(pad, note)| ButtonEntry {
                index: Some(pad as i64),
                midi_note: Some(note as i64),
                file_path: Some(path_of(SlotKey::Pad(pad as u8))),
            })
            .collect();

        let midi_notes = (0..NOTE_COUNT as u8)
            .map(|note| NoteEntry {
                midi_note: Some(note as i64),
                file_path: Some(path_of(SlotKey::Note(note))),
                root_note: store
                    .note_slot(note)
                    .map(|slot| slot.root_note())
                    .filter(|root| *root != note)
                    .map(i64::from),
            })
            .collect();

        Document {
            version: Some(DOCUMENT_VERSION.to_string()),
            one_shot_mode: Some(one_shot),
            buttons: Some(buttons),
            midi_notes: Some(midi_notes),
        }
    }

    /// Parses a document.
    pub fn from_json(json: &str) -> Result<Document, SamplerError> {
        let document: Document = serde_json::from_str(json)?;
        if let Some(version) = document.version.as_deref() {
            if version != DOCUMENT_VERSION {
                warn!(version, "Unrecognized document version, importing anyway");
            }
        }
        Ok(document)
    }

    /// Serializes the document as pretty printed JSON.
    pub fn to_json(&self) -> Result<String, SamplerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a document from disk.
    pub fn read_from(path: &Path) -> Result<Document, SamplerError> {
        let json = fs::read_to_string(path)?;
        Document::from_json(&json)
    }

    /// Writes the document to disk. The file is written next to the destination and
    /// renamed into place, so a crash never leaves a truncated document behind.
    pub fn write_to(&self, path: &Path) -> Result<(), SamplerError> {
        let json = self.to_json()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;

        debug!(path = ?path, "Document written");
        Ok(())
    }

    /// Returns the pad bindings in the document that are in range. Entries that aren't
    /// are counted as skipped.
    pub(crate) fn valid_bindings(&self, report: &mut ImportReport) -> Vec<(usize, u8)> {
        let Some(buttons) = self.buttons.as_ref() else {
            return Vec::new();
        };

        buttons
            .iter()
            .filter_map(|entry| {
                let binding = match (entry.index, entry.midi_note) {
                    (Some(index), Some(note))
                        if (0..PAD_COUNT as i64).contains(&index)
                            && (0..NOTE_COUNT as i64).contains(&note) =>
                    {
                        Some((index as usize, note as u8))
                    }
                    _ => None,
                };
                if binding.is_none() {
                    debug!(?entry, "Skipping invalid button entry");
                    report.skipped += 1;
                }
                binding
            })
            .collect()
    }

    /// Returns the note entries in the document that are in range, with the path and
    /// root note to load or None to clear. A missing root note is the entry's own note.
    /// Entries without a path leave the note untouched and aren't returned.
    pub(crate) fn valid_samples(
        &self,
        report: &mut ImportReport,
    ) -> Vec<(u8, Option<(PathBuf, u8)>)> {
        let Some(midi_notes) = self.midi_notes.as_ref() else {
            return Vec::new();
        };
        let in_range = |value: i64| (0..NOTE_COUNT as i64).contains(&value);

        midi_notes
            .iter()
            .filter_map(|entry| {
                match (entry.midi_note, entry.root_note, entry.file_path.as_deref()) {
                    (Some(note), root, file_path)
                        if in_range(note) && root.map_or(true, in_range) =>
                    {
                        let root = root.unwrap_or(note) as u8;
                        file_path.map(|path| {
                            let load = (!path.is_empty()).then(|| (PathBuf::from(path), root));
                            (note as u8, load)
                        })
                    }
                    _ => {
                        debug!(?entry, "Skipping invalid note entry");
                        report.skipped += 1;
                        None
                    }
                }
            })
            .collect()
    }
}

/// The outcome of an import.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Notes whose sample loaded.
    pub loaded: usize,
    /// Notes cleared by an empty path.
    pub cleared: usize,
    /// Notes whose sample failed to load. Their previous sample is kept.
    pub failed: usize,
    /// Pad bindings applied.
    pub bindings: usize,
    /// Entries ignored because they were out of range or incomplete.
    pub skipped: usize,
}

impl ImportReport {
    /// Returns the number of samples the import tried to load.
    pub fn attempted(&self) -> usize {
        self.loaded + self.failed
    }

    /// Returns an error if any sample failed to load. Everything else was still applied.
    pub fn check(&self) -> Result<(), SamplerError> {
        if self.failed > 0 {
            return Err(SamplerError::ImportPartialFailure {
                failed: self.failed,
                attempted: self.attempted(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loaded, {} cleared, {} failed, {} bindings, {} skipped",
            self.loaded, self.cleared, self.failed, self.bindings, self.skipped
        )
    }
}
