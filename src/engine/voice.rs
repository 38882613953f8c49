use crate::{
    engine::{
        modulation::VoiceModulation,
        parameters::GranularParameters,
        position::PositionEngine,
        scheduler::{GrainScheduler, GrainSpawnContext, INITIAL_GRAINS},
        tone::ToneShaping,
    },
    source::AudioSource,
    utils::{
        adsr::{AdsrEnvelope, AdsrParameters},
        buffer::InterleavedBufferMut,
        random::RandomSource,
    },
};

// -------------------------------------------------------------------------------------------------

/// Fixed gain applied to each voice's grain mix, before the master level.
pub const VOICE_GAIN: f32 = 0.3;

// -------------------------------------------------------------------------------------------------

/// A single polyphonic slot of a [`GranularEngine`](crate::GranularEngine), playing one note.
#[derive(Debug, Clone)]
pub(crate) struct GranularVoice {
    note: Option<u8>,
    velocity: f32,
    /// Note-on order, used to find the oldest voice when stealing.
    start_order: u64,
    /// Note-off order, when the voice is releasing.
    release_order: Option<u64>,
    envelope: AdsrEnvelope,
    scheduler: GrainScheduler,
    modulation: VoiceModulation,
    position: PositionEngine,
    tone: ToneShaping,
    random: RandomSource,
    sample_rate: u32,
}

impl GranularVoice {
    pub fn new(sample_rate: u32, seed: u64) -> Self {
        Self {
            note: None,
            velocity: 0.0,
            start_order: 0,
            release_order: None,
            envelope: AdsrEnvelope::new(),
            scheduler: GrainScheduler::new(),
            modulation: VoiceModulation::new(sample_rate),
            position: PositionEngine::new(sample_rate),
            tone: ToneShaping::new(sample_rate),
            random: RandomSource::new(seed),
            sample_rate,
        }
    }

    #[inline]
    /// The playing note. None, when stopped.
    pub fn note(&self) -> Option<u8> {
        self.note
    }

    #[inline]
    /// Is this voice currently playing something?
    pub fn is_active(&self) -> bool {
        self.note.is_some()
    }

    /// Is this voice playing and in its envelope's release stage?
    #[cfg(test)]
    pub fn in_release_stage(&self) -> bool {
        self.is_active() && self.envelope.stage() == crate::utils::adsr::AdsrStage::Release
    }

    #[inline]
    pub fn start_order(&self) -> u64 {
        self.start_order
    }

    #[inline]
    pub fn release_order(&self) -> Option<u64> {
        self.release_order
    }

    /// Number of currently playing grains.
    pub fn grain_count(&self) -> usize {
        self.scheduler.grain_count()
    }

    /// Current value of the voice's first LFO.
    pub fn lfo_value(&self) -> f32 {
        self.modulation.lfo_value(0)
    }

    /// Normalized, glided play position.
    pub fn tracked_position(&self) -> f32 {
        self.position.tracked_position()
    }

    /// Apply rate, filter and chorus changes from a new parameter snapshot.
    pub fn update(&mut self, parameters: &GranularParameters) {
        self.modulation.update(parameters);
        self.tone.update(parameters);
    }

    /// Keep playing grains within the bounds of a new audio source.
    pub fn source_changed(&mut self, source: &AudioSource) {
        self.scheduler.clamp_positions(source.frame_count());
    }

    /// Start playing a new note: restarts the envelope and spawns the initial grains.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        note: u8,
        velocity: f32,
        order: u64,
        parameters: &GranularParameters,
        envelope_parameters: &AdsrParameters,
        source: &AudioSource,
    ) {
        self.reset();
        self.note = Some(note);
        self.velocity = if velocity.is_finite() {
            velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.start_order = order;

        self.tone.reset();
        self.modulation.reset();
        self.update(parameters);
        self.position.reset(parameters);

        self.envelope.note_on(envelope_parameters);
        for _ in 0..INITIAL_GRAINS {
            self.spawn_grain(parameters, source);
        }
    }

    /// Stop the voice: either start the envelope's release stage or stop immediately.
    pub fn stop(&mut self, allow_tail_off: bool, order: u64, envelope_parameters: &AdsrParameters) {
        if !self.is_active() {
            return;
        }
        if allow_tail_off {
            if self.release_order.is_none() {
                self.release_order = Some(order);
                self.envelope.note_off(envelope_parameters);
            }
        } else {
            self.reset();
        }
    }

    /// Stop & reset the voice to finish actual and prepare new playback.
    pub fn reset(&mut self) {
        self.note = None;
        self.release_order = None;
        self.envelope.reset();
        self.scheduler.reset();
    }

    /// Render and add the voice's output into the given interleaved buffer. Only the first two
    /// channels get written. Voices stop on their own when the envelope and all grains finished.
    pub fn process(
        &mut self,
        output: &mut [f32],
        channel_count: usize,
        parameters: &GranularParameters,
        envelope_parameters: &AdsrParameters,
        source: &AudioSource,
    ) {
        if !self.is_active() {
            return;
        }
        let gain = self.velocity * VOICE_GAIN * parameters.level;
        for frame in output.frames_mut(channel_count) {
            self.position.advance_scan(parameters);
            let due = self.scheduler.due_grains(
                parameters,
                self.sample_rate,
                self.envelope.is_active(),
                &mut self.random,
            );
            for _ in 0..due {
                self.spawn_grain(parameters, source);
            }

            let [left, right] = self.scheduler.process(source, parameters.loop_mode);
            let envelope_gain = self.envelope.run(envelope_parameters) * gain;
            let [left, right] = self.tone.process([left * envelope_gain, right * envelope_gain]);
            frame[0] += left;
            if let Some(sample) = frame.get_mut(1) {
                *sample += right;
            }
            self.modulation.advance();

            if !self.envelope.is_active() && self.scheduler.is_empty() {
                self.reset();
                break;
            }
        }
    }

    fn spawn_grain(&mut self, parameters: &GranularParameters, source: &AudioSource) {
        let Some(note) = self.note else {
            return;
        };
        let modulation = self.modulation.evaluate(parameters, &mut self.random);
        let position = self.position.next_position(
            parameters,
            source.frame_count(),
            modulation.position,
            &mut self.random,
        );
        let context = GrainSpawnContext {
            parameters,
            source,
            sample_rate: self.sample_rate,
            note,
            modulation,
            position,
        };
        self.scheduler.spawn(&context, &mut self.random);
    }
}

// -------------------------------------------------------------------------------------------------
