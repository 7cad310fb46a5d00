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
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use padsampler::audio::{self, SymphoniaDecoder};
use padsampler::controller::{self, Controller, ControllerOptions, Driver};
use padsampler::midi;
use padsampler::samples::{Sampler, SamplerOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI-triggered 16-pad sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input devices.
    MidiDevices {},
    /// Loads every sample in a mapping document and reports any that fail.
    Verify {
        /// The path to the mapping document.
        document_path: String,
    },
    /// Start will start the sampler, controlled from the keyboard and MIDI input.
    Start {
        /// The path to the sampler config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { document_path } => {
            let (sampler, _renderer) = Sampler::new(
                Box::new(SymphoniaDecoder::new()),
                &SamplerOptions::default(),
            );
            let report = sampler.open_document(&PathBuf::from(&document_path))?;

            println!("{}", report);
            println!("Memory: {} KB", sampler.memory_usage() / 1024);
            report.check()?;
        }
        Commands::Start { config_path } => start(Path::new(&config_path)).await?,
    }

    Ok(())
}

/// Runs the sampler until the keyboard input closes.
async fn start(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let settings = padsampler::config::load(config_path)?;
    let options = padsampler::config::sampler_options(&settings);

    let (sampler, renderer) = Sampler::new(Box::new(SymphoniaDecoder::new()), &options);
    let sampler = Arc::new(sampler);

    let project = settings.project().map(Path::to_path_buf);
    if let Some(project) = project.as_ref() {
        if project.exists() {
            let report = sampler.open_document(project)?;
            info!(path = ?project, report = %report, "Opened project");
            if let Err(e) = report.check() {
                warn!("{}", e);
            }
        }
    }

    let device = audio::get_device(settings.audio())?;
    let _output = device.start(renderer)?;
    info!(device = device.name(), voices = options.voices, "Audio output started");

    let mut drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(controller::keyboard::Driver::new())];
    if let Some(midi) = settings.midi() {
        let midi_device = midi::get_device(midi.device())?;
        drivers.push(controller::midi::Driver::new(midi_device));
    }

    let mut controller = Controller::new(
        sampler,
        drivers,
        ControllerOptions {
            audition: settings.audition()?,
            project,
        },
    );
    controller.join().await?;

    Ok(())
}
