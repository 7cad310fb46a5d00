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

//! The MIDI Learn and Sample Learn capture protocol.
//!
//! Both modes are two step handshakes that consume the next note-on instead of letting
//! it sound. Only one mode can be armed at a time; arming either replaces the other.

use tracing::{debug, info};

use super::error::SamplerError;
use super::PAD_COUNT;
use crate::midi::MidiEvent;

/// The single, process-wide learn state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LearnSession {
    /// Nothing is armed. Every event passes through.
    #[default]
    None,
    /// MIDI Learn is armed and waiting for a pad to be chosen.
    AwaitingPadSelection,
    /// MIDI Learn will bind the next note-on to this pad.
    AwaitingMidiForPad(usize),
    /// Sample Learn will capture the next note-on as the target for a sample.
    AwaitingMidiForSample,
}

impl LearnSession {
    /// Returns true if any learn mode is armed.
    pub fn is_active(&self) -> bool {
        *self != LearnSession::None
    }
}

impl std::fmt::Display for LearnSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LearnSession::None => write!(f, "idle"),
            LearnSession::AwaitingPadSelection => write!(f, "MIDI learn: select a pad"),
            LearnSession::AwaitingMidiForPad(pad) => {
                write!(f, "MIDI learn: play a note for pad {}", pad)
            }
            LearnSession::AwaitingMidiForSample => {
                write!(f, "sample learn: play a note to assign")
            }
        }
    }
}

/// What a consumed note-on should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LearnAction {
    /// Bind the pad to the note.
    BindPad { pad: usize, note: u8 },
    /// The note is the target for a sample the caller supplies.
    AssignSample { note: u8 },
}

/// Where an incoming event goes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Routing {
    /// On to the voice pool, unchanged.
    Forward(MidiEvent),
    /// Captured by the learn session. Nothing sounds.
    Consumed(LearnAction),
}

/// The result of choosing a pad while learning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadSelection {
    /// MIDI Learn now waits for a note to bind to the pad.
    MidiLearnTarget,
    /// Sample Learn captured the pad. The session is over and the caller resolves the
    /// pad's note as the sample target.
    SampleLearnTarget,
    /// Nothing is waiting for a pad.
    NotLearning,
}

/// Drives the learn state machine. Lives in the control context only.
#[derive(Debug, Default)]
pub struct AssignmentController {
    session: LearnSession,
}

impl AssignmentController {
    pub fn new() -> AssignmentController {
        AssignmentController::default()
    }

    /// Returns the current session.
    pub fn session(&self) -> LearnSession {
        self.session
    }

    /// Arms MIDI Learn. Cancels Sample Learn, and a pad chosen by an earlier MIDI Learn
    /// that hadn't received its note yet.
    pub fn arm_midi_learn(&mut self) {
        self.transition(LearnSession::AwaitingPadSelection);
    }

    /// Arms Sample Learn. Cancels MIDI Learn.
    pub fn arm_sample_learn(&mut self) {
        self.transition(LearnSession::AwaitingMidiForSample);
    }

    /// Cancels whatever is armed without changing any mapping. Returns the session that
    /// was cancelled.
    pub fn cancel(&mut self) -> LearnSession {
        let previous = self.session;
        self.transition(LearnSession::None);
        previous
    }

    /// Chooses a pad for the armed session.
    pub fn select_pad(&mut self, pad: usize) -> Result<PadSelection, SamplerError> {
        if pad >= PAD_COUNT {
            return Err(SamplerError::invalid_pad(pad as i64));
        }

        Ok(match self.session {
            LearnSession::AwaitingPadSelection | LearnSession::AwaitingMidiForPad(_) => {
                self.transition(LearnSession::AwaitingMidiForPad(pad));
                PadSelection::MidiLearnTarget
            }
            LearnSession::AwaitingMidiForSample => {
                self.transition(LearnSession::None);
                PadSelection::SampleLearnTarget
            }
            LearnSession::None => PadSelection::NotLearning,
        })
    }

    /// Routes an incoming event. Only a note-on arriving while a note is awaited is
    /// consumed; the session then returns to None.
    pub fn route(&mut self, event: MidiEvent) -> Routing {
        if !event.is_note_on() {
            return Routing::Forward(event);
        }

        let action = match self.session {
            LearnSession::AwaitingMidiForPad(pad) => LearnAction::BindPad {
                pad,
                note: event.note,
            },
            LearnSession::AwaitingMidiForSample => LearnAction::AssignSample { note: event.note },
            LearnSession::None | LearnSession::AwaitingPadSelection => {
                return Routing::Forward(event)
            }
        };

        debug!(note = event.note, ?action, "Learn captured note");
        self.transition(LearnSession::None);
        Routing::Consumed(action)
    }

    fn transition(&mut self, next: LearnSession) {
        if self.session != next {
            info!(from = %self.session, to = %next, "Learn session changed");
        }
        self.session = next;
    }
}
