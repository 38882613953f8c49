//! Polyphonic granular sample playback engine.

use std::sync::{Arc, Mutex};

use basedrop::{Collector, Owned, Shared, SharedCell};
use crossbeam_queue::ArrayQueue;
use four_cc::FourCC;

use crate::{
    parameter::ParameterValueUpdate,
    source::AudioSource,
    utils::adsr::AdsrParameters,
    Error,
};

// -------------------------------------------------------------------------------------------------

mod handle;
mod modulation;
mod parameters;
mod position;
mod scheduler;
mod tone;
mod voice;

pub use handle::GranularEngineHandle;
pub use parameters::{GrainShape, GranularParameters, LfoParameters, LfoTarget, LoopMode};
pub use scheduler::{
    INITIAL_GRAINS, MAX_ACTIVE_GRAINS, QUIET_GRAIN_THRESHOLD, SPAWN_GRAIN_LIMIT, SPAWN_RATE_SCALE,
};
pub use voice::VOICE_GAIN;

use voice::GranularVoice;

// -------------------------------------------------------------------------------------------------

/// Default number of voices in an engine's voice pool.
pub const VOICE_COUNT: usize = 8;

// -------------------------------------------------------------------------------------------------

/// Options to configure a [`GranularEngine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// By default 8: number of simultaneously playing notes.
    pub voice_count: usize,
    /// By default None: when set, all voices use a deterministic random seed, derived from
    /// the given one. Else a random seed is picked.
    pub seed: Option<u64>,
    /// By default 256: maximum number of pending messages from [`GranularEngineHandle`]s.
    pub message_queue_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            voice_count: VOICE_COUNT,
            seed: None,
            message_queue_size: 256,
        }
    }
}

impl EngineOptions {
    pub const MAX_VOICE_COUNT: usize = 32;

    pub fn voice_count(mut self, voice_count: usize) -> Self {
        self.voice_count = voice_count;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn message_queue_size(mut self, size: usize) -> Self {
        self.message_queue_size = size;
        self
    }

    /// Validate all options. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=Self::MAX_VOICE_COUNT).contains(&self.voice_count) {
            return Err(Error::ParameterError(format!(
                "engine options 'voice_count' value is '{}', must be in range [1, {}]",
                self.voice_count,
                Self::MAX_VOICE_COUNT
            )));
        }
        if self.message_queue_size == 0 {
            return Err(Error::ParameterError(
                "engine options 'message_queue_size' must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Messages sent from [`GranularEngineHandle`]s to the engine.
pub(crate) enum EngineMessage {
    NoteOn {
        note: u8,
        velocity: f32,
    },
    NoteOff {
        note: u8,
        allow_tail_off: bool,
    },
    AllNotesOff {
        allow_tail_off: bool,
    },
    SetParameters(GranularParameters),
    SetParameter {
        id: FourCC,
        value: Owned<ParameterValueUpdate>,
    },
}

// -------------------------------------------------------------------------------------------------

/// A polyphonic granular synthesizer, which plays grains from a shared [`AudioSource`].
///
/// The engine itself is meant to be owned by the audio thread: call [`Self::prepare`] once,
/// then [`Self::render`] for each audio block. Use [`Self::handle`] to control the engine from
/// other threads. Messages sent via handles are applied at the start of the next block.
pub struct GranularEngine {
    options: EngineOptions,
    sample_rate: u32,
    voices: Vec<GranularVoice>,
    parameters: GranularParameters,
    envelope_parameters: Option<AdsrParameters>,
    note_counter: u64,
    message_queue: Arc<ArrayQueue<EngineMessage>>,
    source_cell: Arc<SharedCell<AudioSource>>,
    current_source: Shared<AudioSource>,
    collector: Arc<Mutex<Collector>>,
    collector_handle: basedrop::Handle,
}

impl GranularEngine {
    /// Create a new engine with the given options. The engine must be prepared before it can
    /// render anything.
    pub fn new(options: EngineOptions) -> Result<Self, Error> {
        options.validate()?;
        let collector = Collector::new();
        let collector_handle = collector.handle();
        let current_source = Shared::new(&collector_handle, AudioSource::empty());
        let source_cell = Arc::new(SharedCell::new(Shared::clone(&current_source)));
        let message_queue = Arc::new(ArrayQueue::new(options.message_queue_size));
        Ok(Self {
            options,
            sample_rate: 0,
            voices: Vec::new(),
            parameters: GranularParameters::default(),
            envelope_parameters: None,
            note_counter: 0,
            message_queue,
            source_cell,
            current_source,
            collector: Arc::new(Mutex::new(collector)),
            collector_handle,
        })
    }

    /// Options the engine got created with.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Is the engine prepared for rendering?
    pub fn is_prepared(&self) -> bool {
        !self.voices.is_empty()
    }

    /// Sample rate the engine got prepared with, or 0 when it's not prepared.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Currently applied parameter snapshot.
    pub fn parameters(&self) -> &GranularParameters {
        &self.parameters
    }

    /// Allocate voices for the given output sample rate and maximum number of frames that get
    /// rendered in a single [`Self::render`] call. Stops all playing notes.
    pub fn prepare(&mut self, sample_rate: u32, max_block_size: usize) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError("Invalid sample rate: must be > 0".to_string()));
        }
        if max_block_size == 0 {
            return Err(Error::ParameterError("Invalid max block size: must be > 0".to_string()));
        }
        let envelope_parameters = Self::create_envelope_parameters(sample_rate, &self.parameters)?;

        let seed = self.options.seed.unwrap_or_else(|| {
            let seed = rand::random::<u64>();
            log::debug!("Using random engine seed: {seed}");
            seed
        });
        log::debug!(
            "Preparing granular engine: {} voices @ {} Hz, {} max frames",
            self.options.voice_count,
            sample_rate,
            max_block_size
        );
        self.voices = (0..self.options.voice_count)
            .map(|index| {
                let mut voice = GranularVoice::new(sample_rate, seed.wrapping_add(index as u64));
                voice.update(&self.parameters);
                voice
            })
            .collect();
        self.sample_rate = sample_rate;
        self.envelope_parameters = Some(envelope_parameters);
        self.note_counter = 0;
        Ok(())
    }

    /// Publish a new audio source. Playing grains continue with the new source, starting
    /// with the next rendered block. Notes started afterwards spawn their grains from it.
    pub fn set_audio_source(&mut self, source: AudioSource) {
        self.handle().set_audio_source(source);
        self.update_source();
    }

    /// Free replaced audio sources and parameter updates. See
    /// [`GranularEngineHandle::collect_garbage`].
    pub fn collect_garbage(&self) {
        match self.collector.lock() {
            Ok(mut collector) => collector.collect(),
            Err(err) => log::warn!("Failed to lock garbage collector: {err}"),
        }
    }

    /// Replace the active parameter snapshot. Values out of range get clamped. Changes apply to
    /// grains that get spawned afterwards.
    pub fn set_parameters(&mut self, parameters: GranularParameters) {
        self.parameters = parameters.clamped();
        if let Some(envelope_parameters) = &mut self.envelope_parameters {
            if let Err(err) = envelope_parameters.setup(
                self.parameters.attack_time(),
                self.parameters.decay_time(),
                self.parameters.sustain,
                self.parameters.release_time(),
            ) {
                Self::permit_alloc(|| log::warn!("Failed to apply envelope parameters: {err}"));
            }
        }
        for voice in &mut self.voices {
            voice.update(&self.parameters);
        }
    }

    /// Set a single parameter by its descriptor id.
    pub fn set_parameter(&mut self, id: FourCC, value: &ParameterValueUpdate) -> Result<(), Error> {
        let mut parameters = self.parameters;
        parameters.set_parameter(id, value)?;
        self.set_parameters(parameters);
        Ok(())
    }

    /// Start playing a new note with a velocity in range `[0, 1]`. Voices which still play the
    /// same note get released. When all voices are busy, a voice gets stolen.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        // initial grains read from the latest published source
        self.update_source();
        let Some(envelope_parameters) = &self.envelope_parameters else {
            return;
        };
        self.note_counter += 1;
        let order = self.note_counter;
        for voice in &mut self.voices {
            if voice.note() == Some(note) {
                voice.stop(true, order, envelope_parameters);
            }
        }
        let voice_index = self.next_free_voice_index();
        self.voices[voice_index].start(
            note,
            velocity,
            order,
            &self.parameters,
            envelope_parameters,
            &self.current_source,
        );
    }

    /// Stop all voices playing the given note.
    pub fn note_off(&mut self, note: u8, allow_tail_off: bool) {
        let Some(envelope_parameters) = &self.envelope_parameters else {
            return;
        };
        self.note_counter += 1;
        let order = self.note_counter;
        for voice in &mut self.voices {
            if voice.note() == Some(note) {
                voice.stop(allow_tail_off, order, envelope_parameters);
            }
        }
    }

    /// Stop all playing voices.
    pub fn all_notes_off(&mut self, allow_tail_off: bool) {
        let Some(envelope_parameters) = &self.envelope_parameters else {
            return;
        };
        self.note_counter += 1;
        let order = self.note_counter;
        for voice in &mut self.voices {
            voice.stop(allow_tail_off, order, envelope_parameters);
        }
    }

    /// Render all playing voices and add their output to the given interleaved buffer. Only the
    /// first two channels get written: mono buffers receive the left channel only.
    ///
    /// Returns the number of processed frames, which is 0 when the engine is not prepared.
    pub fn render(&mut self, output: &mut [f32], channel_count: usize) -> usize {
        if !self.is_prepared() || channel_count == 0 {
            return 0;
        }
        let frame_count = output.len() / channel_count;
        Self::assert_no_alloc(|| {
            self.update_source();
            self.process_messages();
            self.process_voices(output, channel_count);
        });
        frame_count
    }

    /// LFO 1 value of the first playing voice, else 0.
    pub fn current_lfo_value(&self) -> f32 {
        self.voices
            .iter()
            .find(|voice| voice.is_active())
            .map_or(0.0, |voice| voice.lfo_value())
    }

    /// Average normalized play position of all playing voices. When no voice is playing, the
    /// position parameter.
    pub fn playhead_position(&self) -> f32 {
        let (sum, count) = self
            .voices
            .iter()
            .filter(|voice| voice.is_active())
            .fold((0.0, 0), |(sum, count), voice| {
                (sum + voice.tracked_position(), count + 1)
            });
        if count > 0 {
            sum / count as f32
        } else {
            self.parameters.position
        }
    }

    /// Number of currently playing voices.
    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    /// Number of currently playing grains in all voices.
    pub fn active_grain_count(&self) -> usize {
        self.voices.iter().map(|voice| voice.grain_count()).sum()
    }

    /// Create a new handle to control this engine from other threads.
    pub fn handle(&self) -> GranularEngineHandle {
        GranularEngineHandle::new(
            Arc::clone(&self.message_queue),
            Arc::clone(&self.source_cell),
            Arc::clone(&self.collector),
            self.collector_handle.clone(),
        )
    }

    fn create_envelope_parameters(
        sample_rate: u32,
        parameters: &GranularParameters,
    ) -> Result<AdsrParameters, Error> {
        AdsrParameters::new(
            sample_rate,
            parameters.attack_time(),
            parameters.decay_time(),
            parameters.sustain,
            parameters.release_time(),
        )
    }

    fn process_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            match message {
                EngineMessage::NoteOn { note, velocity } => self.note_on(note, velocity),
                EngineMessage::NoteOff {
                    note,
                    allow_tail_off,
                } => self.note_off(note, allow_tail_off),
                EngineMessage::AllNotesOff { allow_tail_off } => {
                    self.all_notes_off(allow_tail_off)
                }
                EngineMessage::SetParameters(parameters) => self.set_parameters(parameters),
                EngineMessage::SetParameter { id, value } => {
                    // errors allocate their messages
                    Self::permit_alloc(|| {
                        if let Err(err) = self.set_parameter(id, &value) {
                            log::warn!("Failed to apply parameter update for '{id}': {err}");
                        }
                    });
                }
            }
        }
    }

    fn update_source(&mut self) {
        let latest = self.source_cell.get();
        if std::ptr::eq(&*latest, &*self.current_source) {
            return;
        }
        self.current_source = latest;
        for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
            voice.source_changed(&self.current_source);
        }
        Self::permit_alloc(|| {
            log::debug!(
                "Engine switched to new audio source with {} frames",
                self.current_source.frame_count()
            )
        });
    }

    fn process_voices(&mut self, output: &mut [f32], channel_count: usize) {
        let Some(envelope_parameters) = &self.envelope_parameters else {
            return;
        };
        let source: &AudioSource = &self.current_source;
        for voice in self.voices.iter_mut().filter(|voice| voice.is_active()) {
            voice.process(
                output,
                channel_count,
                &self.parameters,
                envelope_parameters,
                source,
            );
        }
    }

    fn next_free_voice_index(&self) -> usize {
        // Try to find a completely free voice first
        if let Some(index) = self.voices.iter().position(|v| !v.is_active()) {
            return index;
        }
        // If all voices are active, steal the longest releasing voice, else the oldest one
        let mut candidate_index = 0;
        let mut earliest_release_order: Option<u64> = None;
        let mut oldest_start_order: Option<u64> = None;
        for (index, voice) in self.voices.iter().enumerate() {
            if let Some(release_order) = voice.release_order() {
                if earliest_release_order.is_none_or(|earliest| release_order < earliest) {
                    earliest_release_order = Some(release_order);
                    candidate_index = index;
                }
            } else if earliest_release_order.is_none()
                && oldest_start_order.is_none_or(|oldest| voice.start_order() < oldest)
            {
                oldest_start_order = Some(voice.start_order());
                candidate_index = index;
            }
        }
        candidate_index
    }

    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }

    #[inline]
    fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::permit_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::parameter::Parameter;

    const SAMPLE_RATE: u32 = 44100;
    const BLOCK_SIZE: usize = 512;

    fn sine_source(frame_count: usize) -> AudioSource {
        let samples = (0..frame_count)
            .map(|i| (2.0 * PI * 220.0 * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        AudioSource::from_planar(vec![samples], SAMPLE_RATE).unwrap()
    }

    fn prepared_engine(
        options: EngineOptions,
    ) -> Result<GranularEngine, Box<dyn std::error::Error>> {
        let mut engine = GranularEngine::new(options)?;
        engine.prepare(SAMPLE_RATE, BLOCK_SIZE)?;
        engine.set_audio_source(sine_source(SAMPLE_RATE as usize));
        Ok(engine)
    }

    fn render_blocks(engine: &mut GranularEngine, block_count: usize) -> Vec<f32> {
        let mut rendered = Vec::with_capacity(block_count * BLOCK_SIZE * 2);
        let mut buffer = vec![0.0; BLOCK_SIZE * 2];
        for _ in 0..block_count {
            buffer.fill(0.0);
            assert_eq!(engine.render(&mut buffer, 2), BLOCK_SIZE);
            rendered.extend_from_slice(&buffer);
        }
        rendered
    }

    fn playing_notes(engine: &GranularEngine) -> Vec<u8> {
        let mut notes = engine
            .voices
            .iter()
            .filter_map(|voice| voice.note())
            .collect::<Vec<_>>();
        notes.sort();
        notes
    }

    #[test]
    fn options() {
        assert!(EngineOptions::default().validate().is_ok());
        assert!(EngineOptions::default().voice_count(0).validate().is_err());
        assert!(EngineOptions::default().voice_count(33).validate().is_err());
        assert!(EngineOptions::default()
            .message_queue_size(0)
            .validate()
            .is_err());
        assert!(GranularEngine::new(EngineOptions::default().voice_count(0)).is_err());
    }

    #[test]
    fn prepare() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = GranularEngine::new(EngineOptions::default())?;
        assert!(!engine.is_prepared());
        assert!(engine.prepare(0, BLOCK_SIZE).is_err());
        assert!(engine.prepare(SAMPLE_RATE, 0).is_err());
        assert!(!engine.is_prepared());

        engine.prepare(SAMPLE_RATE, BLOCK_SIZE)?;
        engine.prepare(SAMPLE_RATE, BLOCK_SIZE)?;
        assert!(engine.is_prepared());
        assert_eq!(engine.sample_rate(), SAMPLE_RATE);
        assert_eq!(engine.voices.len(), VOICE_COUNT);
        assert_eq!(engine.active_voice_count(), 0);
        Ok(())
    }

    #[test]
    fn render_before_prepare_is_silent() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = GranularEngine::new(EngineOptions::default())?;
        engine.set_audio_source(sine_source(1000));
        engine.note_on(60, 1.0);
        let mut buffer = vec![0.0; BLOCK_SIZE * 2];
        assert_eq!(engine.render(&mut buffer, 2), 0);
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert_eq!(engine.active_voice_count(), 0);
        Ok(())
    }

    #[test]
    fn note_on_is_audible() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default().seed(1))?;
        let mut parameters = GranularParameters {
            density: 0.5,
            pitch: 0.0,
            position: 0.5,
            jitter: 0.0,
            reverse: 0.0,
            ..GranularParameters::default()
        };
        parameters.set_grain_size_ms(100.0);
        engine.set_parameters(parameters);
        engine.note_on(60, 1.0);
        assert_eq!(engine.active_voice_count(), 1);
        assert_eq!(engine.active_grain_count(), INITIAL_GRAINS);

        // audible within 50 ms
        let output = render_blocks(&mut engine, 5);
        let first_50ms = &output[..(SAMPLE_RATE as usize / 20) * 2];
        assert!(first_50ms.iter().any(|s| s.abs() > 1e-4));

        // one second without NaNs or infinite values
        let output = render_blocks(&mut engine, SAMPLE_RATE as usize / BLOCK_SIZE);
        assert!(output.iter().all(|s| s.is_finite()));
        assert!(output.iter().any(|s| *s != 0.0));
        Ok(())
    }

    #[test]
    fn render_mixes_additively() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default().seed(5))?;
        let mut reference = prepared_engine(EngineOptions::default().seed(5))?;
        engine.note_on(60, 1.0);
        reference.note_on(60, 1.0);

        let mut buffer = vec![1.0; BLOCK_SIZE * 2];
        engine.render(&mut buffer, 2);
        let mut expected = vec![0.0; BLOCK_SIZE * 2];
        reference.render(&mut expected, 2);
        for (output, expected) in buffer.iter().zip(expected) {
            assert!((output - (expected + 1.0)).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn seeded_engines_are_deterministic() -> Result<(), Box<dyn std::error::Error>> {
        let parameters = GranularParameters {
            spray: 0.8,
            jitter: 0.5,
            pitch_jitter: 0.5,
            reverse: 0.5,
            ..GranularParameters::default()
        };
        let mut outputs = Vec::new();
        for _ in 0..2 {
            let mut engine = prepared_engine(EngineOptions::default().seed(42))?;
            engine.set_parameters(parameters);
            engine.note_on(60, 1.0);
            engine.note_on(67, 0.5);
            outputs.push(render_blocks(&mut engine, 20));
        }
        assert_eq!(outputs[0], outputs[1]);
        Ok(())
    }

    #[test]
    fn hard_note_off_in_same_block() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        let handle = engine.handle();
        handle.note_on(60, 1.0)?;
        handle.note_off(60, false)?;
        let output = render_blocks(&mut engine, 1);
        assert_eq!(engine.active_voice_count(), 0);
        assert_eq!(engine.active_grain_count(), 0);
        assert!(output.iter().all(|s| *s == 0.0));
        let output = render_blocks(&mut engine, 1);
        assert!(output.iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn tail_off_releases_voice() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.set_parameters(GranularParameters {
            release_ms: 20.0,
            ..GranularParameters::default()
        });
        engine.note_on(60, 1.0);
        render_blocks(&mut engine, 4);
        engine.note_off(60, true);
        assert_eq!(engine.active_voice_count(), 1);
        let output = render_blocks(&mut engine, 1);
        assert!(output.iter().any(|s| *s != 0.0));
        // release and longest grain finished after a second
        render_blocks(&mut engine, SAMPLE_RATE as usize / BLOCK_SIZE + 1);
        assert_eq!(engine.active_voice_count(), 0);
        Ok(())
    }

    #[test]
    fn all_notes_off() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        for note in [60, 64, 67] {
            engine.note_on(note, 1.0);
        }
        assert_eq!(engine.active_voice_count(), 3);
        render_blocks(&mut engine, 2);
        engine.all_notes_off(true);
        assert!(engine.voices.iter().all(|v| !v.is_active() || v.in_release_stage()));
        engine.all_notes_off(false);
        assert_eq!(engine.active_voice_count(), 0);
        Ok(())
    }

    #[test]
    fn same_note_retrigger_releases_previous_voice() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.note_on(60, 1.0);
        render_blocks(&mut engine, 2);
        engine.note_on(60, 0.8);
        assert_eq!(playing_notes(&engine), vec![60, 60]);
        let releasing = engine
            .voices
            .iter()
            .filter(|voice| voice.in_release_stage())
            .count();
        assert_eq!(releasing, 1);
        Ok(())
    }

    #[test]
    fn voice_stealing() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default().voice_count(2))?;
        // oldest note gets stolen
        engine.note_on(60, 1.0);
        engine.note_on(62, 1.0);
        engine.note_on(64, 1.0);
        assert_eq!(playing_notes(&engine), vec![62, 64]);

        // releasing voices get stolen first
        engine.note_off(64, true);
        engine.note_on(65, 1.0);
        assert_eq!(playing_notes(&engine), vec![62, 65]);
        assert_eq!(engine.active_voice_count(), 2);
        Ok(())
    }

    #[test]
    fn frozen_playhead() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        let mut parameters = GranularParameters {
            freeze: 1.0,
            position: 0.2,
            texture: 0.0,
            spray: 0.0,
            ..GranularParameters::default()
        };
        engine.set_parameters(parameters);
        engine.note_on(60, 1.0);
        for position in [0.4, 0.6, 0.9] {
            parameters.position = position;
            engine.set_parameters(parameters);
            render_blocks(&mut engine, 4);
            assert!((engine.playhead_position() - 0.2).abs() < 1e-4);
        }
        engine.all_notes_off(false);
        assert_eq!(engine.playhead_position(), 0.9);
        Ok(())
    }

    #[test]
    fn lfo_value() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        assert_eq!(engine.current_lfo_value(), 0.0);
        engine.note_on(60, 1.0);
        render_blocks(&mut engine, 10);
        let value = engine.current_lfo_value();
        assert!(value != 0.0 && (-1.0..=1.0).contains(&value));
        Ok(())
    }

    #[test]
    fn handle_messages() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        let handle = engine.handle();
        std::thread::spawn({
            let handle = handle.clone();
            move || handle.note_on(60, 1.0)
        })
        .join()
        .unwrap()?;
        handle.set_parameter(GranularParameters::LEVEL.id(), 0.5_f32)?;
        handle.set_parameter_normalized(GranularParameters::DENSITY.id(), 1.0)?;
        handle.set_parameter(GranularParameters::LOOP_MODE.id(), LoopMode::PingPong)?;
        // applied with the next block
        assert_eq!(engine.active_voice_count(), 0);
        render_blocks(&mut engine, 1);
        assert_eq!(engine.active_voice_count(), 1);
        assert_eq!(engine.parameters().level, 0.5);
        assert_eq!(engine.parameters().density, 1.0);
        assert_eq!(engine.parameters().loop_mode, LoopMode::PingPong);

        handle.set_parameters(GranularParameters {
            unison_voices: 100,
            ..GranularParameters::default()
        })?;
        // invalid updates are ignored
        handle.set_parameter(GranularParameters::LEVEL.id(), "loud")?;
        render_blocks(&mut engine, 1);
        assert_eq!(engine.parameters().unison_voices, 8);
        assert_eq!(engine.parameters().level, GranularParameters::default().level);
        handle.collect_garbage();
        Ok(())
    }

    #[test]
    fn set_parameter_by_id() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.set_parameter(
            GranularParameters::ATTACK.id(),
            &ParameterValueUpdate::Raw(Box::new(100.0_f32)),
        )?;
        assert_eq!(engine.parameters().attack_ms, 100.0);
        assert!(engine
            .set_parameter(FourCC(*b"XXXX"), &ParameterValueUpdate::Normalized(0.5))
            .is_err());
        Ok(())
    }

    #[test]
    fn full_message_queue() -> Result<(), Box<dyn std::error::Error>> {
        let engine = prepared_engine(EngineOptions::default().message_queue_size(2))?;
        let handle = engine.handle();
        handle.note_on(60, 1.0)?;
        handle.note_on(61, 1.0)?;
        assert!(matches!(handle.note_on(62, 1.0), Err(Error::SendError(_))));
        // note offs are always delivered
        assert!(handle.note_off(60, false).is_ok());
        Ok(())
    }

    #[test]
    fn source_swap() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.set_parameters(GranularParameters {
            position: 1.0,
            ..GranularParameters::default()
        });
        engine.note_on(60, 1.0);
        render_blocks(&mut engine, 2);

        engine.handle().set_audio_source(sine_source(100));
        // still playing the previous source until the next block
        assert_eq!(engine.current_source.frame_count(), SAMPLE_RATE as usize);
        let output = render_blocks(&mut engine, 20);
        assert_eq!(engine.current_source.frame_count(), 100);
        assert!(output.iter().all(|s| s.is_finite()));
        assert_eq!(engine.active_voice_count(), 1);

        // empty sources render silence
        engine.set_audio_source(AudioSource::empty());
        engine.all_notes_off(false);
        engine.note_on(60, 1.0);
        let output = render_blocks(&mut engine, 4);
        assert!(output.iter().all(|s| *s == 0.0));
        engine.collect_garbage();
        Ok(())
    }

    #[test]
    fn published_source_applies_before_queued_notes() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = GranularEngine::new(EngineOptions::default().seed(3))?;
        engine.prepare(SAMPLE_RATE, BLOCK_SIZE)?;
        engine.set_parameters(GranularParameters {
            density: 0.0,
            ..GranularParameters::default()
        });

        // source and note sent within the same block
        let handle = engine.handle();
        handle.set_audio_source(sine_source(SAMPLE_RATE as usize));
        handle.note_on(60, 1.0)?;
        let output = render_blocks(&mut engine, 1);
        assert_eq!(engine.active_voice_count(), 1);
        assert_eq!(engine.active_grain_count(), INITIAL_GRAINS);
        assert!(output.iter().any(|s| *s != 0.0));

        // source set directly on the engine
        let mut engine = GranularEngine::new(EngineOptions::default().seed(3))?;
        engine.prepare(SAMPLE_RATE, BLOCK_SIZE)?;
        engine.set_audio_source(sine_source(SAMPLE_RATE as usize));
        engine.note_on(60, 1.0);
        assert_eq!(engine.active_grain_count(), INITIAL_GRAINS);
        Ok(())
    }

    #[test]
    fn non_finite_velocity() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.note_on(60, f32::NAN);
        engine.note_on(62, 1.0);
        let output = render_blocks(&mut engine, 4);
        assert!(output.iter().all(|s| s.is_finite()));
        assert!(output.iter().any(|s| *s != 0.0));
        Ok(())
    }

    #[test]
    fn oversized_blocks() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.note_on(60, 1.0);
        let mut buffer = vec![0.0; 4 * BLOCK_SIZE * 2];
        assert_eq!(engine.render(&mut buffer, 2), 4 * BLOCK_SIZE);
        assert!(buffer.iter().all(|s| s.is_finite()));
        Ok(())
    }

    #[test]
    fn mono_output() -> Result<(), Box<dyn std::error::Error>> {
        let mut engine = prepared_engine(EngineOptions::default())?;
        engine.note_on(60, 1.0);
        let mut buffer = vec![0.0; BLOCK_SIZE];
        assert_eq!(engine.render(&mut buffer, 1), BLOCK_SIZE);
        assert!(buffer.iter().any(|s| *s != 0.0));
        // 0 channels are ignored
        assert_eq!(engine.render(&mut buffer, 0), 0);
        Ok(())
    }
}
