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
use std::io;
use std::path::PathBuf;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::samples::SlotKey;

const HELP: &str = "learn midi|sample, cancel, pad <n>, release <n>, load <target> <path>, \
clear <target>, bind <pad> <note>, oneshot on|off, file <path>, export <path>, import <path>, \
stop, status, quit";

/// A controller that drives the sampler from commands typed on the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and sends a single command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "Command ({}): ", HELP)?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(io::Error::other)?;
            return Ok(false);
        }

        match parse_command(&input) {
            Ok(Some(event)) => events_tx.blocking_send(event).map_err(io::Error::other)?,
            Ok(None) => {}
            Err(reason) => warn!(input = input.trim(), "Unrecognized input: {}", reason),
        }
        Ok(true)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

/// Parses a command line into an event. Blank lines produce nothing.
pub fn parse_command(input: &str) -> Result<Option<Event>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let (command, rest) = match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    };

    let event = match command.to_lowercase().as_str() {
        "learn" => match rest.to_lowercase().as_str() {
            "midi" => Event::ArmMidiLearn,
            "sample" => Event::ArmSampleLearn,
            _ => return Err("expected learn midi or learn sample".to_string()),
        },
        "cancel" => Event::CancelLearn,
        "pad" => Event::PressPad(parse_number(rest, "pad")?),
        "release" => Event::ReleasePad(parse_number(rest, "pad")?),
        "load" => {
            let (target, path) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "expected load <target> <path>".to_string())?;
            Event::Load {
                target: parse_target(target)?,
                path: parse_path(path)?,
            }
        }
        "clear" => Event::Clear(parse_target(rest)?),
        "bind" => {
            let (pad, note) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "expected bind <pad> <note>".to_string())?;
            Event::Bind {
                pad: parse_number(pad, "pad")?,
                note: parse_number(note.trim(), "note")?,
            }
        }
        "oneshot" => match rest.to_lowercase().as_str() {
            "on" => Event::OneShot(true),
            "off" => Event::OneShot(false),
            _ => return Err("expected oneshot on or oneshot off".to_string()),
        },
        "file" => Event::SupplySample(parse_path(rest)?),
        "export" => Event::Export(parse_path(rest)?),
        "import" => Event::Import(parse_path(rest)?),
        "stop" => Event::StopAll,
        "status" => Event::Status,
        "quit" | "exit" => Event::Quit,
        _ => return Err(format!("unknown command {}", command)),
    };
    Ok(Some(event))
}

fn parse_number<T: std::str::FromStr>(value: &str, kind: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("{} must be a number, got {:?}", kind, value))
}

fn parse_target(value: &str) -> Result<SlotKey, String> {
    value.parse::<SlotKey>().map_err(|e| e.to_string())
}

fn parse_path(value: &str) -> Result<PathBuf, String> {
    if value.is_empty() {
        return Err("expected a path".to_string());
    }
    Ok(PathBuf::from(value))
}
