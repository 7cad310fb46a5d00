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
use std::path::PathBuf;

/// Raised when a sample file can't be turned into a playable buffer.
#[derive(Debug, thiserror::Error)]
#[error("unable to decode {}: {reason}", path.display())]
pub struct DecodeError {
    /// The file that failed to decode.
    pub path: PathBuf,
    /// Why decoding failed.
    pub reason: String,
}

impl DecodeError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> DecodeError {
        DecodeError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by the sampler's control surface.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("{kind} index {index} is out of range (0..{limit})")]
    InvalidIndex {
        kind: &'static str,
        index: i64,
        limit: usize,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no free voice for note {note}, trigger dropped")]
    VoicePoolExhausted { note: u8 },

    #[error("{failed} of {attempted} samples failed to load during import")]
    ImportPartialFailure { failed: usize, attempted: usize },

    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SamplerError {
    pub(crate) fn invalid_pad(index: impl Into<i64>) -> SamplerError {
        SamplerError::InvalidIndex {
            kind: "pad",
            index: index.into(),
            limit: super::PAD_COUNT,
        }
    }

    pub(crate) fn invalid_note(index: impl Into<i64>) -> SamplerError {
        SamplerError::InvalidIndex {
            kind: "note",
            index: index.into(),
            limit: super::NOTE_COUNT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SamplerError::invalid_pad(16);
        assert_eq!(err.to_string(), "pad index 16 is out of range (0..16)");

        let err = SamplerError::invalid_note(-1);
        assert_eq!(err.to_string(), "note index -1 is out of range (0..128)");

        let err: SamplerError = DecodeError::new("/tmp/kick.wav", "no audio track").into();
        assert_eq!(err.to_string(), "unable to decode /tmp/kick.wav: no audio track");
    }
}
