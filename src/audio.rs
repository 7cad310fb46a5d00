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
use std::{error::Error, fmt, sync::Arc, thread};

use crossbeam_channel::Sender;
use tracing::debug;

use crate::config;
use crate::samples::Renderer;

pub mod cpal;
pub mod decode;
pub mod mock;

pub use decode::SymphoniaDecoder;

/// An audio output that a sampler renders into.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the name of the device.
    fn name(&self) -> String;

    /// Starts rendering into the device. Output runs until the returned handle is
    /// dropped.
    fn start(&self, renderer: Renderer) -> Result<OutputHandle, Box<dyn Error>>;
}

/// Keeps an output stream alive. Dropping it stops the stream and joins its thread.
pub struct OutputHandle {
    stop: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl OutputHandle {
    pub(crate) fn new(stop: Sender<()>, thread: thread::JoinHandle<()>) -> OutputHandle {
        OutputHandle {
            stop: Some(stop),
            thread: Some(thread),
        }
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the output thread.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("Output thread panicked");
            }
        }
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets the device named by the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(config)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
