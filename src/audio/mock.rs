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
use std::{error::Error, fmt, thread, time::Duration};

use crossbeam_channel::RecvTimeoutError;
use tracing::{info, span, Level};

use super::OutputHandle;
use crate::config;
use crate::samples::Renderer;

const BLOCK_FRAMES: usize = 256;

/// A mock device. Renders blocks in real time and throws the audio away.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    channels: u16,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(config: &config::Audio) -> Device {
        Device {
            name: config.device().to_string(),
            sample_rate: config.sample_rate(),
            channels: config.channels(),
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn start(&self, mut renderer: Renderer) -> Result<OutputHandle, Box<dyn Error>> {
        let span = span!(Level::INFO, "output (mock)");
        let _enter = span.enter();

        let channels = self.channels as usize;
        let period =
            Duration::from_secs_f64(BLOCK_FRAMES as f64 / self.sample_rate.max(1) as f64);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        info!(device = self.name, "Starting mock output.");
        let thread = thread::spawn(move || {
            let mut block = vec![0.0f32; BLOCK_FRAMES * channels];
            loop {
                renderer.render(&mut block, channels);
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => return,
                }
            }
        });

        Ok(OutputHandle::new(stop_tx, thread))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channels={}) (Mock)", self.name, self.channels)
    }
}
