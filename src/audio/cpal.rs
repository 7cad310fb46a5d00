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
use std::{error::Error, fmt, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::OutputHandle;
use crate::config;
use crate::samples::Renderer;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Audio configuration for the output stream.
    audio_config: config::Audio,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// f32 callback: render directly into the cpal buffer.
fn create_f32_callback(
    mut renderer: Renderer,
    channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        renderer.render(data, channels);
    }
}

/// Integer callback: render into a scratch buffer and convert. Blocks larger than the
/// scratch buffer are rendered in pieces.
fn create_converting_callback<T: cpal::SizedSample + cpal::FromSample<f32>>(
    mut renderer: Renderer,
    channels: usize,
    initial_frames: usize,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut scratch = vec![0.0f32; initial_frames.max(1) * channels.max(1)];
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        render_converted(&mut renderer, &mut scratch, data, channels);
    }
}

/// Renders into `data` through `scratch` without growing it. The scratch length must be
/// a whole number of frames.
fn render_converted<T: cpal::SizedSample + cpal::FromSample<f32>>(
    renderer: &mut Renderer,
    scratch: &mut [f32],
    data: &mut [T],
    channels: usize,
) {
    for chunk in data.chunks_mut(scratch.len()) {
        let block = &mut scratch[..chunk.len()];
        renderer.render(block, channels);
        for (dst, &src) in chunk.iter_mut().zip(block.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    renderer: Renderer,
) -> Result<cpal::Stream, Box<dyn Error>> {
    let channels = config.channels as usize;
    let initial_frames = match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => frames as usize,
        cpal::BufferSize::Default => 1024,
    };
    let on_error = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            config,
            create_f32_callback(renderer, channels),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_output_stream(
            config,
            create_converting_callback::<i16>(renderer, channels, initial_frames),
            on_error,
            None,
        )?,
        cpal::SampleFormat::I32 => device.build_output_stream(
            config,
            create_converting_callback::<i32>(renderer, channels, initial_frames),
            on_error,
            None,
        )?,
        cpal::SampleFormat::U16 => device.build_output_stream(
            config,
            create_converting_callback::<u16>(renderer, channels, initial_frames),
            on_error,
            None,
        )?,
        format => return Err(format!("unsupported sample format {}", format).into()),
    };
    Ok(stream)
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal output devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                        audio_config: config::Audio::default(),
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. `default` is the default host's default output.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            let max_channels = device
                .supported_output_configs()?
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);
            return Ok(Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
                audio_config: config.clone(),
            });
        }

        match Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
        {
            Some(mut device) => {
                device.audio_config = config.clone();
                Ok(device)
            }
            None => Err(format!("no device found with name {}", name).into()),
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn start(&self, renderer: Renderer) -> Result<OutputHandle, Box<dyn Error>> {
        let span = span!(Level::INFO, "output (cpal)");
        let _enter = span.enter();

        let channels = self.audio_config.channels();
        if channels > self.max_channels {
            return Err(format!(
                "device {} supports {} channels, {} requested",
                self.name, self.max_channels, channels
            )
            .into());
        }

        let sample_format = self.device.default_output_config()?.sample_format();
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(self.audio_config.sample_rate()),
            buffer_size: match self.audio_config.buffer_size() {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        info!(
            device = self.name,
            channels,
            sample_rate = self.audio_config.sample_rate(),
            format = sample_format.to_string(),
            "Starting output stream."
        );

        // Streams aren't Send on every platform, so the stream is created and dropped on
        // its own thread.
        let device = self.device.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let thread = thread::spawn(move || {
            let stream = match build_stream(&device, &stream_config, sample_format, renderer)
                .and_then(|stream| {
                    stream.play()?;
                    Ok(stream)
                }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Returns once the handle is dropped.
            let _ = stop_rx.recv();
            drop(stream);
            info!("Output stream stopped.");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OutputHandle::new(stop_tx, thread)),
            Ok(Err(e)) => Err(format!("unable to start output stream: {}", e).into()),
            Err(_) => Err("output thread exited before the stream started".into()),
        }
    }
}
