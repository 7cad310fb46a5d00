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
use std::{path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use super::{Audio, ConfigError, Midi};

const DEFAULT_VOICES: usize = 16;
const DEFAULT_EVENT_QUEUE: usize = 256;

/// The top level configuration file.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// The audio output.
    #[serde(default)]
    audio: Audio,

    /// The MIDI input. No MIDI input is opened if unset.
    midi: Option<Midi>,

    /// Size of the voice pool.
    voices: Option<usize>,

    /// Initial one-shot mode.
    one_shot: Option<bool>,

    /// Capacity of the control to render event queue.
    event_queue: Option<usize>,

    /// How long to preview a sample assigned by Sample Learn, e.g. `300ms`.
    audition: Option<String>,

    /// A project document imported at startup and saved after every change.
    project: Option<PathBuf>,
}

impl Settings {
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    /// Returns the voice pool size (default: 16, at least 1)
    pub fn voices(&self) -> usize {
        self.voices.unwrap_or(DEFAULT_VOICES).max(1)
    }

    /// Returns the initial one-shot mode (default: on)
    pub fn one_shot(&self) -> bool {
        self.one_shot.unwrap_or(true)
    }

    /// Returns the event queue capacity (default: 256, at least 1)
    pub fn event_queue(&self) -> usize {
        self.event_queue.unwrap_or(DEFAULT_EVENT_QUEUE).max(1)
    }

    /// Returns the audition duration, if set.
    pub fn audition(&self) -> Result<Option<Duration>, ConfigError> {
        self.audition
            .as_deref()
            .map(super::parse_duration)
            .transpose()
    }

    pub fn project(&self) -> Option<&Path> {
        self.project.as_deref()
    }
}
