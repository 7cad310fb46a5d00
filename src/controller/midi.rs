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
use std::{io, sync::Arc};

use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{debug, error, info, span, Level};

use super::Event;
use crate::midi::{Device, MidiEvent};

/// A controller that forwards note events from a MIDI input.
pub struct Driver {
    /// The MIDI device.
    midi_device: Arc<dyn Device>,
}

impl Driver {
    pub fn new(midi_device: Arc<dyn Device>) -> Arc<Self> {
        Arc::new(Driver { midi_device })
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<MidiEvent>(64);
        let device = self.midi_device.clone();

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "MIDI driver");
            let _enter = span.enter();

            info!(device = device.name(), "MIDI driver started.");

            if let Err(e) = device
                .watch_events(midi_events_tx)
                .map_err(|e| io::Error::other(e.to_string()))
            {
                error!(err = e.to_string(), "Error watching MIDI events");
            }
        });

        let device = self.midi_device.clone();
        tokio::spawn(async move {
            loop {
                let Some(event) = midi_events_rx.recv().await else {
                    info!("MIDI watcher closed.");
                    device.stop_watch_events();
                    return Ok(());
                };

                debug!(event = %event, "MIDI event");
                if events_tx.send(Event::Midi(event)).await.is_err() {
                    device.stop_watch_events();
                    return Ok(());
                }
            }
        })
    }

    fn stop(&self) {
        self.midi_device.stop_watch_events();
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc};

    use tokio::sync::mpsc;

    use crate::{
        controller::{Driver as _, Event},
        midi::{self, MidiEvent},
        testutil::eventually_async,
    };

    #[tokio::test(flavor = "multi_thread")]
    async fn test_midi_driver_forwards_notes() -> Result<(), Box<dyn Error>> {
        let device = Arc::new(midi::test::Device::get("mock-midi-device"));
        let driver = super::Driver::new(device.clone());

        let (events_tx, mut events_rx) = mpsc::channel::<Event>(8);
        let handle = driver.monitor_events(events_tx);

        // The watcher registers on a blocking thread, so retry until it's listening.
        let watched = device.clone();
        eventually_async(
            move || {
                let watched = watched.clone();
                async move { watched.mock_event(&[0x90, 60, 127]) }
            },
            "MIDI device was never watched",
        )
        .await;
        assert_eq!(
            Some(Event::Midi(MidiEvent::note_on(60, 1.0))),
            events_rx.recv().await
        );

        // Program changes are ignored by the device, note-offs come through.
        assert!(!device.mock_event(&[0xC0, 12]));
        assert!(device.mock_event(&[0x80, 60, 0]));
        assert_eq!(
            Some(Event::Midi(MidiEvent::note_off(60))),
            events_rx.recv().await
        );

        driver.stop();
        handle.await??;
        Ok(())
    }
}
