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
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Level};

use crate::midi::MidiEvent;
use crate::samples::{note_name, PadPress, Routed, Sampler, SlotKey};

pub mod keyboard;
pub mod midi;

/// How often samples released by the renderer are dropped.
const COLLECT_INTERVAL: Duration = Duration::from_millis(50);

/// Velocity of pad presses and auditions, out of 127.
const DEFAULT_VELOCITY: f32 = 100.0 / 127.0;

/// Controller events that will trigger behavior in the sampler.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A note event from a MIDI input.
    Midi(MidiEvent),

    /// Arms MIDI Learn.
    ArmMidiLearn,

    /// Arms Sample Learn.
    ArmSampleLearn,

    /// Cancels any armed learn mode.
    CancelLearn,

    /// Presses a pad, as a click on it would.
    PressPad(usize),

    /// Releases a pad.
    ReleasePad(usize),

    /// Loads a sample into a note or pad.
    Load { target: SlotKey, path: PathBuf },

    /// Clears a note or pad.
    Clear(SlotKey),

    /// Binds a pad to a note.
    Bind { pad: usize, note: u8 },

    /// Turns one-shot mode on or off.
    OneShot(bool),

    /// Supplies the sample for the note captured by Sample Learn.
    SupplySample(PathBuf),

    /// Writes the mapping document to a file.
    Export(PathBuf),

    /// Imports a mapping document from a file.
    Import(PathBuf),

    /// Stops every voice.
    StopAll,

    /// Reports the sampler's state.
    Status,

    /// Shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    /// Starts sending events to the given sender.
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;

    /// Stops monitoring. Called when the controller shuts down.
    fn stop(&self) {}
}

/// Options for the controller.
#[derive(Clone, Debug, Default)]
pub struct ControllerOptions {
    /// How long to preview a sample assigned by Sample Learn.
    pub audition: Option<Duration>,
    /// A document saved after every change.
    pub project: Option<PathBuf>,
}

/// Drives a sampler from a set of drivers.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given drivers.
    pub fn new(
        sampler: Arc<Sampler>,
        drivers: Vec<Arc<dyn Driver>>,
        options: ControllerOptions,
    ) -> Controller {
        Controller {
            handle: tokio::spawn(async move {
                Controller::trigger_events(Dispatcher::new(sampler, options), drivers).await
            }),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Dispatches events from the drivers until one of them quits or they all close.
    async fn trigger_events(mut dispatcher: Dispatcher, drivers: Vec<Arc<dyn Driver>>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(64);
        let join_handles: Vec<_> = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();
        drop(events_tx);

        let mut collect = tokio::time::interval(COLLECT_INTERVAL);

        info!(drivers = drivers.len(), "Controller started.");

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    let Some(event) = event else {
                        info!("All drivers closed.");
                        break;
                    };
                    if event == Event::Quit {
                        info!("Controller closing.");
                        break;
                    }
                    dispatcher.dispatch(event);
                }
                _ = collect.tick() => {
                    dispatcher.sampler.collect_garbage();
                }
            }
        }

        for driver in drivers.iter() {
            driver.stop();
        }
        for join_handle in join_handles {
            join_handle.abort();
            match join_handle.await {
                Ok(Err(e)) => error!("Error from event monitor: {}", e),
                Err(e) if !e.is_cancelled() => {
                    error!("Error waiting for event monitor to stop: {}", e)
                }
                _ => {}
            }
        }
    }
}

/// Applies events to the sampler and keeps the state that spans events: the note
/// captured by Sample Learn while it waits for a file.
pub(crate) struct Dispatcher {
    sampler: Arc<Sampler>,
    options: ControllerOptions,
    pending_sample_target: Option<u8>,
}

impl Dispatcher {
    pub(crate) fn new(sampler: Arc<Sampler>, options: ControllerOptions) -> Dispatcher {
        Dispatcher {
            sampler,
            options,
            pending_sample_target: None,
        }
    }

    /// Handles an event, logging any failure, and saves the project after changes.
    pub(crate) fn dispatch(&mut self, event: Event) {
        let description = format!("{:?}", event);
        match self.handle(event) {
            Ok(true) => self.autosave(),
            Ok(false) => {}
            Err(e) => error!(event = description, "Event failed: {}", e),
        }
    }

    /// Handles an event. Returns true if the mapping changed.
    pub(crate) fn handle(&mut self, event: Event) -> Result<bool, Box<dyn Error>> {
        let sampler = &self.sampler;
        match event {
            Event::Midi(event) => match sampler.handle_midi_event(event)? {
                Routed::Forwarded => Ok(false),
                Routed::PadBound { pad, note } => {
                    info!(pad, note = note_name(note), "MIDI learn bound pad");
                    Ok(true)
                }
                Routed::SampleTargetCaptured { note } => {
                    self.capture_sample_target(note);
                    Ok(false)
                }
            },
            Event::ArmMidiLearn => {
                self.pending_sample_target = None;
                sampler.arm_midi_learn();
                Ok(false)
            }
            Event::ArmSampleLearn => {
                self.pending_sample_target = None;
                sampler.arm_sample_learn();
                Ok(false)
            }
            Event::CancelLearn => {
                self.pending_sample_target = None;
                sampler.cancel_learn();
                Ok(false)
            }
            Event::PressPad(pad) => {
                match sampler.press_pad(pad, DEFAULT_VELOCITY)? {
                    PadPress::Triggered(_) => {}
                    PadPress::LearnTarget(pad) => {
                        info!(pad, "MIDI learn waiting for a note");
                    }
                    PadPress::SampleTarget(note) => self.capture_sample_target(note),
                }
                Ok(false)
            }
            Event::ReleasePad(pad) => {
                sampler.release_pad(pad)?;
                Ok(false)
            }
            Event::Load { target, path } => {
                sampler.load_sample(target, &path)?;
                Ok(true)
            }
            Event::Clear(target) => Ok(sampler.clear_sample(target)?),
            Event::Bind { pad, note } => {
                sampler.bind_pad(pad, note)?;
                Ok(true)
            }
            Event::OneShot(one_shot) => {
                let changed = sampler.one_shot() != one_shot;
                sampler.set_one_shot(one_shot);
                Ok(changed)
            }
            Event::SupplySample(path) => {
                let Some(note) = self.pending_sample_target.take() else {
                    warn!("No sample learn target has been captured");
                    return Ok(false);
                };
                sampler.load_sample(SlotKey::Note(note), &path)?;
                self.audition(note);
                Ok(true)
            }
            Event::Export(path) => {
                sampler.save_document(&path)?;
                Ok(false)
            }
            Event::Import(path) => {
                let report = sampler.open_document(&path)?;
                if let Err(e) = report.check() {
                    warn!(report = %report, "{}", e);
                }
                Ok(true)
            }
            Event::StopAll => {
                sampler.stop_all();
                Ok(false)
            }
            Event::Status => {
                self.report_status();
                Ok(false)
            }
            Event::Quit => Ok(false),
        }
    }

    fn capture_sample_target(&mut self, note: u8) {
        info!(
            note,
            name = note_name(note),
            "Sample learn captured note, supply a file for it"
        );
        self.pending_sample_target = Some(note);
    }

    /// Plays the note briefly so the new assignment can be heard.
    fn audition(&self, note: u8) {
        let Some(duration) = self.options.audition else {
            return;
        };
        if let Err(e) = self
            .sampler
            .handle_midi_event(MidiEvent::note_on(note, DEFAULT_VELOCITY))
        {
            warn!(note, "Unable to audition sample: {}", e);
            return;
        }

        let sampler = self.sampler.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Err(e) = sampler.handle_midi_event(MidiEvent::note_off(note)) {
                warn!(note, "Unable to end audition: {}", e);
            }
        });
    }

    fn autosave(&self) {
        let Some(project) = self.options.project.as_ref() else {
            return;
        };
        if let Err(e) = self.sampler.save_document(project) {
            error!(path = ?project, "Unable to save project: {}", e);
        }
    }

    fn report_status(&self) {
        let sampler = &self.sampler;
        let loaded = sampler
            .loaded_notes()
            .iter()
            .map(|note| note_name(*note))
            .collect::<Vec<String>>()
            .join(" ");
        info!(
            learn = %sampler.learn_session(),
            pending_sample_target = ?self.pending_sample_target,
            one_shot = sampler.one_shot(),
            voices = format!("{}/{}", sampler.active_voices(), sampler.voice_count()),
            dropped_triggers = sampler.dropped_triggers(),
            memory_kb = sampler.memory_usage() / 1024,
            "Status"
        );
        info!(pads = %sampler.note_map(), "Pad bindings");
        info!(notes = loaded, "Loaded samples");
    }
}
