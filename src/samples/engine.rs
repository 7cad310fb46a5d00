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

//! The sampler engine, split between the control and render contexts.
//!
//! `Sampler` is the control surface. It owns decoding, the pad bindings and the learn
//! session, and is shared between drivers. `Renderer` is moved into the audio callback
//! and owns the voice pool. The two only meet through the sample store's atomic slots,
//! a bounded command queue and a few atomics.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::document::{Document, ImportReport};
use super::error::SamplerError;
use super::learn::{AssignmentController, LearnAction, LearnSession, PadSelection, Routing};
use super::loader::{Decoder, SampleLoader};
use super::notemap::NoteMap;
use super::store::{SampleSlot, SampleStore};
use super::voice::VoicePool;
use super::{note_name, SlotKey, NOTE_COUNT, PAD_COUNT};
use crate::midi::MidiEvent;

/// Capacity of the queue that carries released slots back from the render context.
const RECLAIM_QUEUE_SIZE: usize = 1024;

/// State visible to both contexts.
struct Shared {
    store: SampleStore,
    one_shot: AtomicBool,
    active_voices: AtomicUsize,
    dropped_triggers: AtomicU64,
    silent_triggers: AtomicU64,
}

/// Commands applied by the renderer at the start of a block.
#[derive(Clone, Copy, Debug, PartialEq)]
enum RenderCommand {
    Midi(MidiEvent),
    StopAll,
}

/// Options for building a sampler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerOptions {
    /// Number of voices in the pool.
    pub voices: usize,
    /// Output sample rate. Samples are converted to this rate when loaded.
    pub sample_rate: u32,
    /// Capacity of the command queue between the contexts.
    pub event_queue: usize,
    /// Initial one-shot mode.
    pub one_shot: bool,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        SamplerOptions {
            voices: 16,
            sample_rate: 44100,
            event_queue: 256,
            one_shot: true,
        }
    }
}

/// What happened to an incoming MIDI event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Routed {
    /// Sent on to the voice pool.
    Forwarded,
    /// Consumed by MIDI Learn, which bound the pad to the note.
    PadBound { pad: usize, note: u8 },
    /// Consumed by Sample Learn. The caller supplies a sample for the note.
    SampleTargetCaptured { note: u8 },
}

/// What a pad press did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadPress {
    /// The pad's note was triggered.
    Triggered(u8),
    /// MIDI Learn selected the pad and now waits for a note.
    LearnTarget(usize),
    /// Sample Learn captured the pad's note as the target for a sample.
    SampleTarget(u8),
}

/// The render side of the sampler. Call `render` once per audio block.
pub struct Renderer {
    shared: Arc<Shared>,
    pool: VoicePool,
    commands: Receiver<RenderCommand>,
}

impl Renderer {
    /// Renders one block of interleaved audio, replacing the contents of `output`. Never
    /// blocks or allocates.
    pub fn render(&mut self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        self.apply_commands();
        self.pool.render(output, channels);
        self.shared
            .active_voices
            .store(self.pool.active_count(), Ordering::Relaxed);
    }

    /// Applies every queued command before anything renders.
    fn apply_commands(&mut self) {
        let one_shot = self.shared.one_shot.load(Ordering::Acquire);
        while let Ok(command) = self.commands.try_recv() {
            match command {
                RenderCommand::Midi(event) if event.is_note_on() => {
                    let outcome = self
                        .pool
                        .note_on(event.note, event.velocity, &self.shared.store);
                    match outcome.check(event.note) {
                        Ok(true) => {}
                        Ok(false) => {
                            self.shared.silent_triggers.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            self.shared.dropped_triggers.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                RenderCommand::Midi(event) => {
                    self.pool.note_off(event.note, one_shot);
                }
                RenderCommand::StopAll => {
                    self.pool.stop_all();
                }
            }
        }
    }

    /// Returns the voice pool.
    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("pool", &self.pool)
            .field("pending_commands", &self.commands.len())
            .finish()
    }
}

/// The control side of the sampler.
///
/// Buffers released by the renderer wait in a bounded queue until the control side
/// drops them. Loading and clearing drain the queue; anything else driving a sampler for
/// a long time should call [`Sampler::collect_garbage`] periodically.
pub struct Sampler {
    shared: Arc<Shared>,
    loader: SampleLoader,
    note_map: RwLock<NoteMap>,
    learn: Mutex<AssignmentController>,
    commands: Sender<RenderCommand>,
    reclaimed: Receiver<Arc<SampleSlot>>,
    voices: usize,
}

impl Sampler {
    /// Creates a sampler and the renderer that plays it.
    pub fn new(decoder: Box<dyn Decoder>, options: &SamplerOptions) -> (Sampler, Renderer) {
        let shared = Arc::new(Shared {
            store: SampleStore::new(),
            one_shot: AtomicBool::new(options.one_shot),
            active_voices: AtomicUsize::new(0),
            dropped_triggers: AtomicU64::new(0),
            silent_triggers: AtomicU64::new(0),
        });
        let (command_tx, command_rx) = crossbeam_channel::bounded(options.event_queue.max(1));
        let (reclaim_tx, reclaim_rx) = crossbeam_channel::bounded(RECLAIM_QUEUE_SIZE);

        info!(
            voices = options.voices,
            sample_rate = options.sample_rate,
            one_shot = options.one_shot,
            "Creating sampler"
        );

        let sampler = Sampler {
            shared: shared.clone(),
            loader: SampleLoader::new(decoder, options.sample_rate),
            note_map: RwLock::new(NoteMap::new()),
            learn: Mutex::new(AssignmentController::new()),
            commands: command_tx,
            reclaimed: reclaim_rx,
            voices: options.voices,
        };
        let renderer = Renderer {
            shared,
            pool: VoicePool::new(options.voices).with_reclaimer(reclaim_tx),
            commands: command_rx,
        };
        (sampler, renderer)
    }

    /// Loads a sample. A pad target loads into the note the pad is bound to. The sample
    /// plays unshifted at that note.
    pub fn load_sample(&self, target: SlotKey, path: &Path) -> Result<Arc<SampleSlot>, SamplerError> {
        let note = self.target_note(target)?;
        self.load_sample_with_root(target, path, note)
    }

    /// Loads a sample that plays unshifted at `root_note`, so the target note plays it
    /// pitch-shifted. On failure the previous sample stays loaded.
    pub fn load_sample_with_root(
        &self,
        target: SlotKey,
        path: &Path,
        root_note: u8,
    ) -> Result<Arc<SampleSlot>, SamplerError> {
        let note = self.target_note(target)?;
        self.collect_garbage();
        let slot = self
            .shared
            .store
            .load(&self.loader, SlotKey::Note(note), path, root_note)?;
        self.refresh_pads_for(note)?;

        info!(
            target = %target,
            note,
            root_note,
            file = slot.file_name(),
            "Sample assigned"
        );
        Ok(slot)
    }

    /// Clears a sample. A pad target clears the note the pad is bound to. Voices playing
    /// the sample finish with it. Returns true if a sample was removed.
    pub fn clear_sample(&self, target: SlotKey) -> Result<bool, SamplerError> {
        let note = self.target_note(target)?;
        self.collect_garbage();
        let removed = self.shared.store.clear(SlotKey::Note(note))?;
        self.refresh_pads_for(note)?;

        if removed.is_some() {
            info!(target = %target, note, "Sample cleared");
        }
        Ok(removed.is_some())
    }

    /// Binds a pad to a note. Voices already playing keep their note.
    pub fn bind_pad(&self, pad: usize, note: u8) -> Result<(), SamplerError> {
        self.note_map.write().bind(pad, note)?;
        self.refresh_pad(pad, note)?;
        info!(pad, note, name = note_name(note), "Pad bound");
        Ok(())
    }

    /// Returns the note the pad is bound to.
    pub fn resolve_pad(&self, pad: usize) -> Result<u8, SamplerError> {
        self.note_map.read().resolve(pad)
    }

    /// Returns a copy of the pad bindings.
    pub fn note_map(&self) -> NoteMap {
        self.note_map.read().clone()
    }

    pub fn arm_midi_learn(&self) {
        self.learn.lock().arm_midi_learn();
    }

    pub fn arm_sample_learn(&self) {
        self.learn.lock().arm_sample_learn();
    }

    /// Cancels any armed learn mode. Returns the session that was cancelled.
    pub fn cancel_learn(&self) -> LearnSession {
        self.learn.lock().cancel()
    }

    /// Chooses the pad for an armed learn mode.
    pub fn select_pad_for_learn(&self, pad: usize) -> Result<PadSelection, SamplerError> {
        self.learn.lock().select_pad(pad)
    }

    pub fn learn_session(&self) -> LearnSession {
        self.learn.lock().session()
    }

    /// Handles an incoming MIDI event. A note-on captured by a learn mode never sounds.
    pub fn handle_midi_event(&self, event: MidiEvent) -> Result<Routed, SamplerError> {
        if event.note as usize >= NOTE_COUNT {
            return Err(SamplerError::invalid_note(event.note));
        }

        // The learn lock is released before acting on the result.
        let routing = self.learn.lock().route(event);
        match routing {
            Routing::Forward(event) => {
                self.send(RenderCommand::Midi(event));
                Ok(Routed::Forwarded)
            }
            Routing::Consumed(LearnAction::BindPad { pad, note }) => {
                self.bind_pad(pad, note)?;
                Ok(Routed::PadBound { pad, note })
            }
            Routing::Consumed(LearnAction::AssignSample { note }) => {
                info!(note, name = note_name(note), "Sample learn target captured");
                Ok(Routed::SampleTargetCaptured { note })
            }
        }
    }

    /// Presses a pad. While a learn mode is armed, the press feeds the learn session
    /// instead of sounding.
    pub fn press_pad(&self, pad: usize, velocity: f32) -> Result<PadPress, SamplerError> {
        let selection = self.learn.lock().select_pad(pad)?;
        match selection {
            PadSelection::MidiLearnTarget => Ok(PadPress::LearnTarget(pad)),
            PadSelection::SampleLearnTarget => Ok(PadPress::SampleTarget(self.resolve_pad(pad)?)),
            PadSelection::NotLearning => {
                let note = self.resolve_pad(pad)?;
                self.send(RenderCommand::Midi(MidiEvent::note_on(note, velocity)));
                Ok(PadPress::Triggered(note))
            }
        }
    }

    /// Releases a pad, sending a note-off for its current note. Returns the note.
    pub fn release_pad(&self, pad: usize) -> Result<u8, SamplerError> {
        let note = self.resolve_pad(pad)?;
        self.send(RenderCommand::Midi(MidiEvent::note_off(note)));
        Ok(note)
    }

    pub fn set_one_shot(&self, one_shot: bool) {
        self.shared.one_shot.store(one_shot, Ordering::Release);
        info!(one_shot, "One-shot mode changed");
    }

    pub fn one_shot(&self) -> bool {
        self.shared.one_shot.load(Ordering::Acquire)
    }

    /// Hard-stops every voice at the start of the next block.
    pub fn stop_all(&self) {
        info!("Stopping all voices");
        self.send(RenderCommand::StopAll);
    }

    /// Captures the full mapping as a document.
    pub fn export_document(&self) -> Document {
        let note_map = self.note_map.read();
        Document::capture(self.one_shot(), &note_map, &self.shared.store)
    }

    /// Applies a document. Bindings are applied before samples, then each pad's display
    /// slot is refreshed from the note it's bound to. A sample that fails to load is
    /// counted and keeps the note's previous sample; the rest of the import still applies.
    pub fn import_document(&self, document: &Document) -> ImportReport {
        let mut report = ImportReport::default();

        if let Some(one_shot) = document.one_shot_mode {
            self.set_one_shot(one_shot);
        }

        let bindings = document.valid_bindings(&mut report);
        {
            let mut note_map = self.note_map.write();
            for (pad, note) in bindings {
                // Both indexes were checked by the document.
                if note_map.bind(pad, note).is_ok() {
                    report.bindings += 1;
                }
            }
        }

        for (note, load) in document.valid_samples(&mut report) {
            match load {
                Some((path, root_note)) => {
                    match self
                        .shared
                        .store
                        .load(&self.loader, SlotKey::Note(note), &path, root_note)
                    {
                        Ok(_) => report.loaded += 1,
                        Err(e) => {
                            warn!(note, err = %e, "Unable to load sample during import");
                            report.failed += 1;
                        }
                    }
                }
                None => {
                    if matches!(self.shared.store.clear(SlotKey::Note(note)), Ok(Some(_))) {
                        report.cleared += 1;
                    }
                }
            }
        }

        for (pad, note) in self.note_map().bindings() {
            if let Err(e) = self.refresh_pad(pad, note) {
                warn!(pad, err = %e, "Unable to refresh pad");
            }
        }

        info!(report = %report, "Document imported");
        report
    }

    /// Writes the current mapping to a file.
    pub fn save_document(&self, path: &Path) -> Result<(), SamplerError> {
        self.export_document().write_to(path)?;
        info!(path = ?path, "Document saved");
        Ok(())
    }

    /// Reads a document from a file and imports it.
    pub fn open_document(&self, path: &Path) -> Result<ImportReport, SamplerError> {
        let document = Document::read_from(path)?;
        info!(path = ?path, "Opening document");
        Ok(self.import_document(&document))
    }

    /// Drops slots released by the renderer. Buffers whose last holder was a voice are
    /// freed here, off the audio thread. Returns how many references were released.
    pub fn collect_garbage(&self) -> usize {
        let released = self.reclaimed.try_iter().count();
        if released > 0 {
            debug!(released, "Released retired voice references");
        }
        released
    }

    /// Returns the slot at the key, if loaded.
    pub fn slot(&self, key: SlotKey) -> Result<Option<Arc<SampleSlot>>, SamplerError> {
        self.shared.store.get(key)
    }

    pub fn is_loaded(&self, note: u8) -> bool {
        self.shared.store.is_loaded(note)
    }

    /// Returns every note with a sample, ascending.
    pub fn loaded_notes(&self) -> Vec<u8> {
        self.shared.store.loaded_notes()
    }

    /// Returns the memory used by loaded samples in bytes.
    pub fn memory_usage(&self) -> usize {
        self.shared.store.memory_usage()
    }

    /// Returns the number of playing voices as of the last rendered block.
    pub fn active_voices(&self) -> usize {
        self.shared.active_voices.load(Ordering::Relaxed)
    }

    /// Returns the size of the voice pool.
    pub fn voice_count(&self) -> usize {
        self.voices
    }

    /// Returns the number of note-ons dropped because every voice was busy or the
    /// command queue was full.
    pub fn dropped_triggers(&self) -> u64 {
        self.shared.dropped_triggers.load(Ordering::Relaxed)
    }

    /// Returns the number of note-ons for notes without a sample.
    pub fn silent_triggers(&self) -> u64 {
        self.shared.silent_triggers.load(Ordering::Relaxed)
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.loader.target_sample_rate()
    }

    fn target_note(&self, target: SlotKey) -> Result<u8, SamplerError> {
        match target {
            SlotKey::Note(note) if (note as usize) < NOTE_COUNT => Ok(note),
            SlotKey::Note(note) => Err(SamplerError::invalid_note(note)),
            SlotKey::Pad(pad) => self.resolve_pad(pad as usize),
        }
    }

    /// Mirrors the note's slot into the display slot of every pad bound to it.
    fn refresh_pads_for(&self, note: u8) -> Result<(), SamplerError> {
        let pads = self.note_map.read().pads_for_note(note);
        for pad in pads {
            self.refresh_pad(pad, note)?;
        }
        Ok(())
    }

    fn refresh_pad(&self, pad: usize, note: u8) -> Result<(), SamplerError> {
        if pad >= PAD_COUNT {
            return Err(SamplerError::invalid_pad(pad as i64));
        }
        let slot = self.shared.store.note_slot(note);
        self.shared.store.install(SlotKey::Pad(pad as u8), slot)?;
        Ok(())
    }

    fn send(&self, command: RenderCommand) {
        match self.commands.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                if matches!(command, RenderCommand::Midi(event) if event.is_note_on()) {
                    self.shared.dropped_triggers.fetch_add(1, Ordering::Relaxed);
                }
                warn!(?command, "Render queue is full, dropping command");
            }
            Err(TrySendError::Disconnected(command)) => {
                warn!(?command, "Renderer is gone, dropping command");
            }
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("store", &self.shared.store)
            .field("note_map", &*self.note_map.read())
            .field("learn", &self.learn_session())
            .field("one_shot", &self.one_shot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::samples::loader::DecodedAudio;
    use crate::samples::VoiceState;
    use crate::testutil::MemoryDecoder;

    const BLOCK: usize = 64;

    fn decoder() -> MemoryDecoder {
        MemoryDecoder::new()
            .with_file("/s/kick.wav", DecodedAudio::new(vec![0.5; 4096], 1, 44100))
            .with_file("/s/snare.wav", DecodedAudio::new(vec![0.25; 4096], 2, 44100))
            .with_file("/s/short.wav", DecodedAudio::new(vec![1.0; 8], 1, 44100))
    }

    fn sampler(voices: usize, one_shot: bool) -> (Sampler, Renderer) {
        let options = SamplerOptions {
            voices,
            one_shot,
            ..Default::default()
        };
        Sampler::new(Box::new(decoder()), &options)
    }

    fn render(renderer: &mut Renderer) -> Vec<f32> {
        let mut output = vec![1.0; BLOCK * 2];
        renderer.render(&mut output, 2);
        output
    }

    #[test]
    fn test_two_triggers_with_three_voices() {
        let (sampler, mut renderer) = sampler(3, true);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/kick.wav"))
            .unwrap();

        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        let output = render(&mut renderer);

        assert_eq!(renderer.pool().active_count(), 2);
        assert_eq!(renderer.pool().free_count(), 1);
        assert_eq!(sampler.active_voices(), 2);
        assert_eq!(output[0], 1.0);
    }

    #[test]
    fn test_midi_learn_binds_without_sound() {
        let (sampler, mut renderer) = sampler(4, true);
        sampler
            .load_sample(SlotKey::Note(72), Path::new("/s/kick.wav"))
            .unwrap();

        sampler.arm_midi_learn();
        assert_eq!(
            sampler.select_pad_for_learn(5).unwrap(),
            PadSelection::MidiLearnTarget
        );
        assert_eq!(
            sampler.handle_midi_event(MidiEvent::note_on(72, 1.0)).unwrap(),
            Routed::PadBound { pad: 5, note: 72 }
        );
        assert_eq!(sampler.resolve_pad(5).unwrap(), 72);
        assert_eq!(sampler.learn_session(), LearnSession::None);

        let output = render(&mut renderer);
        assert_eq!(renderer.pool().active_count(), 0);
        assert!(output.iter().all(|s| *s == 0.0));

        // The pad's display slot follows the new binding.
        assert!(sampler.slot(SlotKey::Pad(5)).unwrap().is_some());
    }

    #[test]
    fn test_sample_learn_captures_target() {
        let (sampler, mut renderer) = sampler(4, true);
        sampler.arm_sample_learn();
        assert_eq!(
            sampler.handle_midi_event(MidiEvent::note_on(50, 1.0)).unwrap(),
            Routed::SampleTargetCaptured { note: 50 }
        );
        assert!(!sampler.learn_session().is_active());

        sampler
            .load_sample(SlotKey::Note(50), Path::new("/s/snare.wav"))
            .unwrap();
        assert!(sampler.is_loaded(50));
        render(&mut renderer);
        assert_eq!(renderer.pool().active_count(), 0);
    }

    #[test]
    fn test_press_pad() {
        let (sampler, mut renderer) = sampler(4, true);
        sampler
            .load_sample(SlotKey::Pad(0), Path::new("/s/kick.wav"))
            .unwrap();

        assert_eq!(sampler.press_pad(0, 1.0).unwrap(), PadPress::Triggered(36));
        render(&mut renderer);
        assert!(renderer.pool().is_playing(36));

        sampler.arm_midi_learn();
        assert_eq!(sampler.press_pad(3, 1.0).unwrap(), PadPress::LearnTarget(3));
        sampler.cancel_learn();

        sampler.arm_sample_learn();
        assert_eq!(sampler.press_pad(2, 1.0).unwrap(), PadPress::SampleTarget(38));
        assert_eq!(sampler.learn_session(), LearnSession::None);

        assert!(matches!(
            sampler.press_pad(16, 1.0),
            Err(SamplerError::InvalidIndex { kind: "pad", .. })
        ));
    }

    #[test]
    fn test_rebind_keeps_playing_voice() {
        let (sampler, mut renderer) = sampler(4, false);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/kick.wav"))
            .unwrap();
        sampler
            .load_sample(SlotKey::Note(60), Path::new("/s/snare.wav"))
            .unwrap();

        sampler.press_pad(0, 1.0).unwrap();
        render(&mut renderer);
        assert!(renderer.pool().is_playing(36));

        sampler.bind_pad(0, 60).unwrap();
        assert_eq!(sampler.release_pad(0).unwrap(), 60);
        render(&mut renderer);
        assert!(renderer.pool().is_playing(36));

        sampler.handle_midi_event(MidiEvent::note_off(36)).unwrap();
        render(&mut renderer);
        assert!(!renderer.pool().is_playing(36));
    }

    #[test]
    fn test_one_shot_ignores_note_off() {
        let (sampler, mut renderer) = sampler(2, false);
        sampler
            .load_sample(SlotKey::Note(40), Path::new("/s/kick.wav"))
            .unwrap();
        sampler.set_one_shot(true);

        sampler.handle_midi_event(MidiEvent::note_on(40, 1.0)).unwrap();
        sampler.handle_midi_event(MidiEvent::note_off(40)).unwrap();
        render(&mut renderer);
        assert!(renderer.pool().is_playing(40));

        // Zero velocity note-on is a note-off too.
        sampler.set_one_shot(false);
        sampler.handle_midi_event(MidiEvent::note_on(40, 0.0)).unwrap();
        render(&mut renderer);
        assert!(!renderer.pool().is_playing(40));
    }

    #[test]
    fn test_pad_targets() {
        let (sampler, _renderer) = sampler(2, true);
        sampler.bind_pad(2, 40).unwrap();
        sampler.bind_pad(3, 40).unwrap();

        let slot = sampler
            .load_sample(SlotKey::Pad(2), Path::new("/s/kick.wav"))
            .unwrap();
        assert_eq!(slot.root_note(), 40);
        assert!(sampler.is_loaded(40));
        assert!(sampler.slot(SlotKey::Pad(2)).unwrap().is_some());
        assert!(sampler.slot(SlotKey::Pad(3)).unwrap().is_some());

        assert!(sampler.clear_sample(SlotKey::Pad(3)).unwrap());
        assert!(!sampler.is_loaded(40));
        assert!(sampler.slot(SlotKey::Pad(2)).unwrap().is_none());
        assert!(!sampler.clear_sample(SlotKey::Pad(3)).unwrap());
    }

    #[test]
    fn test_load_with_root() {
        let (sampler, mut renderer) = sampler(2, true);
        sampler
            .load_sample_with_root(SlotKey::Note(72), Path::new("/s/kick.wav"), 60)
            .unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(72, 1.0)).unwrap();
        render(&mut renderer);
        let voice = renderer.pool().voice(0).unwrap();
        assert_eq!(voice.state(), VoiceState::Playing);
        assert!((voice.pitch_ratio() - 2.0).abs() < 1e-12);
        assert!((voice.position() - (BLOCK * 2) as f64).abs() < 1e-6);
    }

    #[test]
    fn test_failed_load_keeps_previous() {
        let (sampler, _renderer) = sampler(2, true);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/kick.wav"))
            .unwrap();
        assert!(matches!(
            sampler.load_sample(SlotKey::Note(36), Path::new("/s/missing.wav")),
            Err(SamplerError::Decode(_))
        ));
        let slot = sampler.slot(SlotKey::Note(36)).unwrap().unwrap();
        assert_eq!(slot.file_name(), "kick.wav");

        assert!(matches!(
            sampler.load_sample(SlotKey::Note(128), Path::new("/s/kick.wav")),
            Err(SamplerError::InvalidIndex { .. })
        ));
        assert!(matches!(
            sampler.handle_midi_event(MidiEvent::note_on(200, 1.0)),
            Err(SamplerError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_counters() {
        let (sampler, mut renderer) = sampler(1, true);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/kick.wav"))
            .unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(37, 1.0)).unwrap();
        render(&mut renderer);

        assert_eq!(sampler.dropped_triggers(), 1);
        assert_eq!(sampler.silent_triggers(), 1);
        assert_eq!(sampler.active_voices(), 1);
    }

    #[test]
    fn test_full_queue_drops_trigger() {
        let options = SamplerOptions {
            voices: 4,
            event_queue: 1,
            ..Default::default()
        };
        let (sampler, _renderer) = Sampler::new(Box::new(decoder()), &options);
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        assert_eq!(sampler.dropped_triggers(), 1);
    }

    #[test]
    fn test_clear_while_playing() {
        let (sampler, mut renderer) = sampler(2, true);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/short.wav"))
            .unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();

        // The note-on is applied at the start of the next block, before the voice reads.
        sampler.clear_sample(SlotKey::Note(36)).unwrap();
        render(&mut renderer);
        assert_eq!(renderer.pool().active_count(), 0);
        assert_eq!(sampler.silent_triggers(), 1);

        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/short.wav"))
            .unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        let mut output = vec![0.0; 4];
        renderer.render(&mut output, 1);
        sampler.clear_sample(SlotKey::Note(36)).unwrap();

        // The voice still holds the buffer and plays to the end.
        let output = render(&mut renderer);
        assert_eq!(&output[..8], &[1.0; 8]);
        assert_eq!(output[8], 0.0);
        assert_eq!(renderer.pool().active_count(), 0);
        assert_eq!(sampler.collect_garbage(), 1);
        assert_eq!(sampler.collect_garbage(), 0);
    }

    #[test]
    fn test_stop_all() {
        let (sampler, mut renderer) = sampler(4, true);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/kick.wav"))
            .unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        render(&mut renderer);
        assert_eq!(sampler.active_voices(), 2);

        sampler.stop_all();
        render(&mut renderer);
        assert_eq!(sampler.active_voices(), 0);
        assert_eq!(sampler.collect_garbage(), 2);
    }

    #[test]
    fn test_loading_collects_released_buffers() {
        let (sampler, mut renderer) = sampler(2, true);
        sampler
            .load_sample(SlotKey::Note(36), Path::new("/s/short.wav"))
            .unwrap();
        sampler.handle_midi_event(MidiEvent::note_on(36, 1.0)).unwrap();
        render(&mut renderer);
        assert_eq!(renderer.pool().active_count(), 0);

        sampler
            .load_sample(SlotKey::Note(37), Path::new("/s/kick.wav"))
            .unwrap();
        assert_eq!(sampler.collect_garbage(), 0);
    }

    #[test]
    fn test_render_while_reloading() {
        let (sampler, mut renderer) = sampler(8, false);
        let done = Arc::new(AtomicBool::new(false));

        // Every sample is a constant, so any mix of voices at full velocity is a
        // multiple of 0.25 and the same on both channels.
        let render_thread = {
            let done = done.clone();
            std::thread::spawn(move || {
                let mut output = vec![0.0f32; BLOCK * 2];
                let mut bad = 0usize;
                let mut blocks = 0usize;
                loop {
                    renderer.render(&mut output, 2);
                    blocks += 1;
                    for frame in output.chunks_exact(2) {
                        let value = frame[0];
                        let valid = value == frame[1]
                            && (0.0..=8.0).contains(&value)
                            && (value * 4.0).fract() == 0.0;
                        if !valid {
                            bad += 1;
                        }
                    }
                    if done.load(Ordering::Acquire) {
                        return (bad, blocks);
                    }
                }
            })
        };

        let files = ["/s/kick.wav", "/s/snare.wav", "/s/short.wav"];
        for i in 0..2000usize {
            let note = 36 + (i % 4) as u8;
            match i % 5 {
                0 | 1 => {
                    sampler
                        .load_sample(SlotKey::Note(note), Path::new(files[i % 3]))
                        .unwrap();
                }
                2 => {
                    sampler.clear_sample(SlotKey::Note(note)).unwrap();
                }
                _ => {}
            }
            sampler.handle_midi_event(MidiEvent::note_on(note, 1.0)).unwrap();
            if i % 3 == 0 {
                sampler.handle_midi_event(MidiEvent::note_off(note)).unwrap();
            }
            sampler.collect_garbage();
        }
        done.store(true, Ordering::Release);

        let (bad, blocks) = render_thread.join().unwrap();
        assert_eq!(bad, 0);
        assert!(blocks > 0);
    }

    #[test]
    fn test_export_import_keeps_root_note() {
        let (source, _renderer) = sampler(2, true);
        source
            .load_sample_with_root(SlotKey::Note(72), Path::new("/s/kick.wav"), 60)
            .unwrap();
        let document = source.export_document();

        let (target, mut renderer) = sampler(2, true);
        let report = target.import_document(&document);
        assert_eq!(report.loaded, 1);
        let slot = target.slot(SlotKey::Note(72)).unwrap().unwrap();
        assert_eq!(slot.root_note(), 60);

        target.handle_midi_event(MidiEvent::note_on(72, 1.0)).unwrap();
        render(&mut renderer);
        let voice = renderer.pool().voice(0).unwrap();
        assert!((voice.pitch_ratio() - 2.0).abs() < 1e-12);
        assert_eq!(target.export_document(), document);
    }

    #[test]
    fn test_export_import_round_trip() {
        let (source, _renderer) = sampler(2, false);
        source
            .load_sample(SlotKey::Note(36), Path::new("/s/kick.wav"))
            .unwrap();
        source
            .load_sample(SlotKey::Note(100), Path::new("/s/snare.wav"))
            .unwrap();
        source.bind_pad(4, 100).unwrap();
        source.bind_pad(9, 0).unwrap();
        let document = source.export_document();

        let (target, _renderer) = sampler(2, true);
        target
            .load_sample(SlotKey::Note(50), Path::new("/s/short.wav"))
            .unwrap();
        let report = target.import_document(&document);

        assert!(report.check().is_ok());
        assert_eq!(report.loaded, 2);
        assert_eq!(report.cleared, 1);
        assert_eq!(target.note_map(), source.note_map());
        assert_eq!(target.loaded_notes(), source.loaded_notes());
        assert!(!target.one_shot());
        assert!(target.slot(SlotKey::Pad(4)).unwrap().is_some());
        assert_eq!(target.export_document(), document);
    }

    #[test]
    fn test_import_with_missing_file() {
        let (sampler, _renderer) = sampler(2, true);
        let document = Document::from_json(
            r#"{
                "midiNotes": [
                    {"midiNote": 40, "filePath": "/s/gone.wav"},
                    {"midiNote": 41, "filePath": "/s/kick.wav"}
                ]
            }"#,
        )
        .unwrap();

        let report = sampler.import_document(&document);
        assert_eq!(report.failed, 1);
        assert_eq!(report.loaded, 1);
        assert!(sampler.is_loaded(41));
        assert!(!sampler.is_loaded(40));
        assert!(matches!(
            report.check(),
            Err(SamplerError::ImportPartialFailure {
                failed: 1,
                attempted: 2
            })
        ));

        // Missing sections and flags leave the current state alone.
        assert!(sampler.one_shot());
        assert_eq!(sampler.note_map(), NoteMap::new());
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("project.json");

        let (source, _renderer) = sampler(2, true);
        source
            .load_sample(SlotKey::Pad(1), Path::new("/s/snare.wav"))
            .unwrap();
        source.save_document(&path).unwrap();

        let (target, _renderer) = sampler(2, true);
        let report = target.open_document(&path).unwrap();
        assert_eq!(report.loaded, 1);
        assert!(target.is_loaded(37));
        assert!(matches!(
            target.open_document(&dir.path().join("nope.json")),
            Err(SamplerError::Io(_))
        ));
    }
}
