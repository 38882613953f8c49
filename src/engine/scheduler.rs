//! Grain spawning, playback and retirement.

use std::f32::consts::PI;

use crate::{
    engine::{
        modulation::ModulationValues,
        parameters::{GrainShape, GranularParameters, LoopMode},
    },
    source::{AudioSource, SampleInterpolator},
    utils::random::RandomSource,
};

// -------------------------------------------------------------------------------------------------

/// Hard limit of concurrently playing grains per voice. The oldest grain gets evicted when a
/// new grain exceeds the limit.
pub const MAX_ACTIVE_GRAINS: usize = 20;
/// No new grains get spawned while a voice plays this many grains.
pub const SPAWN_GRAIN_LIMIT: usize = 16;
/// Number of grains spawned right away on note-on.
pub const INITIAL_GRAINS: usize = 2;
/// Grains are silent while their window is below this level.
pub const QUIET_GRAIN_THRESHOLD: f32 = 0.02;
/// Grains per second at full density.
pub const SPAWN_RATE_SCALE: f32 = 50.0;

// -------------------------------------------------------------------------------------------------

impl GrainShape {
    /// Window amplitude at the given grain phase in range `[0, 1]`.
    #[inline]
    pub fn window(&self, phase: f32) -> f32 {
        match self {
            GrainShape::Hann => 0.5 - 0.5 * (2.0 * PI * phase).cos(),
            GrainShape::Triangle => {
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 * (1.0 - phase)
                }
            }
            GrainShape::Square => 1.0,
            GrainShape::Gaussian => {
                let x = (phase - 0.5) * 4.0;
                (-x * x).exp()
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A single, short windowed segment of the audio source.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct Grain {
    /// Read position in source frames.
    position: f32,
    /// Absolute position increment per output sample.
    increment: f32,
    /// Playback direction. Toggles when ping-pong grains hit a source boundary.
    reverse: bool,
    total_samples: usize,
    remaining_samples: usize,
    shape: GrainShape,
    pan_left: f32,
    pan_right: f32,
    amplitude: f32,
}

impl Grain {
    #[allow(clippy::too_many_arguments)]
    fn new(
        position: f32,
        increment: f32,
        reverse: bool,
        total_samples: usize,
        shape: GrainShape,
        stereo_position: f32,
        amplitude: f32,
    ) -> Self {
        debug_assert!(total_samples > 0, "Grains need at least one sample");
        Self {
            position,
            increment,
            reverse,
            total_samples,
            remaining_samples: total_samples,
            shape,
            pan_left: (0.5 - stereo_position * 0.5).clamp(0.0, 1.0),
            pan_right: (0.5 + stereo_position * 0.5).clamp(0.0, 1.0),
            amplitude,
        }
    }

    #[cfg(test)]
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Transpose in semitones, derived from the increment.
    #[cfg(test)]
    pub fn pitch(&self, rate_ratio: f32) -> f32 {
        (self.increment / rate_ratio).log2() * 12.0
    }

    pub fn is_finished(&self) -> bool {
        self.remaining_samples == 0
    }

    /// Grain progress in range `[0, 1]`.
    #[inline]
    fn phase(&self) -> f32 {
        1.0 - self.remaining_samples as f32 / self.total_samples as f32
    }

    /// Render a single stereo frame and move on by one sample.
    #[inline]
    fn process(
        &mut self,
        interpolator: &SampleInterpolator,
        loop_mode: LoopMode,
        max_position: f32,
    ) -> [f32; 2] {
        let window = self.shape.window(self.phase());
        if window < QUIET_GRAIN_THRESHOLD {
            // skip reading, but keep aging
            self.remaining_samples = self.remaining_samples.saturating_sub(1);
            return [0.0; 2];
        }
        let [left, right] = interpolator.frame(self.position);
        let gain = window * self.amplitude;
        let output = [left * gain * self.pan_left, right * gain * self.pan_right];

        self.advance(loop_mode, max_position);
        self.remaining_samples = self.remaining_samples.saturating_sub(1);
        output
    }

    /// Move the read position, wrapping or reflecting at the source bounds.
    #[inline]
    fn advance(&mut self, loop_mode: LoopMode, max_position: f32) {
        let mut position = if self.reverse {
            self.position - self.increment
        } else {
            self.position + self.increment
        };
        if max_position > 0.0 {
            match loop_mode {
                LoopMode::Forward | LoopMode::Backward => {
                    if !(0.0..=max_position).contains(&position) {
                        position = position.rem_euclid(max_position);
                    }
                }
                LoopMode::PingPong => {
                    if position > max_position {
                        position = 2.0 * max_position - position;
                        self.reverse = !self.reverse;
                    } else if position < 0.0 {
                        position = -position;
                        self.reverse = !self.reverse;
                    }
                }
            }
        }
        self.position = position.clamp(0.0, max_position.max(0.0));
    }
}

// -------------------------------------------------------------------------------------------------

/// Fixed capacity, age ordered grain storage. Never allocates.
#[derive(Debug, Clone)]
pub(crate) struct GrainSet {
    grains: [Grain; MAX_ACTIVE_GRAINS],
    len: usize,
}

impl Default for GrainSet {
    fn default() -> Self {
        Self {
            grains: [Grain::default(); MAX_ACTIVE_GRAINS],
            len: 0,
        }
    }
}

impl GrainSet {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Grain> {
        self.grains[..self.len].iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Grain> {
        self.grains[..self.len].iter_mut()
    }

    /// Append a grain, evicting the oldest one when the set is full.
    pub fn push(&mut self, grain: Grain) {
        if self.len == MAX_ACTIVE_GRAINS {
            self.grains.copy_within(1..MAX_ACTIVE_GRAINS, 0);
            self.len -= 1;
        }
        self.grains[self.len] = grain;
        self.len += 1;
    }

    /// Remove finished grains in place, preserving the age order of the remaining ones.
    pub fn remove_finished(&mut self) {
        let mut write_index = 0;
        for read_index in 0..self.len {
            if !self.grains[read_index].is_finished() {
                if write_index != read_index {
                    self.grains[write_index] = self.grains[read_index];
                }
                write_index += 1;
            }
        }
        self.len = write_index;
    }
}

// -------------------------------------------------------------------------------------------------

/// Everything needed to build new grains for a voice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrainSpawnContext<'a> {
    pub parameters: &'a GranularParameters,
    pub source: &'a AudioSource,
    /// Output sample rate.
    pub sample_rate: u32,
    pub note: u8,
    pub modulation: ModulationValues,
    /// Start frame from the voice's position engine.
    pub position: f32,
}

// -------------------------------------------------------------------------------------------------

/// Per-voice grain scheduler: decides when to spawn grains, builds them and mixes all active
/// grains of a voice.
#[derive(Debug, Clone, Default)]
pub(crate) struct GrainScheduler {
    grains: GrainSet,
    spawn_timer: f32,
}

impl GrainScheduler {
    const MIN_AMOUNT: f32 = 0.01;
    /// Random grain size variation at full jitter.
    const SIZE_JITTER: f32 = 0.3;
    /// Random spawn interval variation at full jitter.
    const TIMING_JITTER: f32 = 0.5;
    /// Unison detune spread in semitones (±5 cents).
    const UNISON_DETUNE: f32 = 0.1;
    /// Maximum random unison start offset relative to the source length.
    const UNISON_OFFSET: f32 = 0.01;

    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn grains(&self) -> &GrainSet {
        &self.grains
    }

    pub fn grain_count(&self) -> usize {
        self.grains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grains.is_empty()
    }

    /// Drop all grains and rewind the spawn timer.
    pub fn reset(&mut self) {
        self.grains.clear();
        self.spawn_timer = 0.0;
    }

    /// Advance the spawn timer by one sample and return how many grains are due.
    /// Nothing gets spawned unless `may_spawn` is set.
    #[inline]
    pub fn due_grains(
        &mut self,
        parameters: &GranularParameters,
        sample_rate: u32,
        may_spawn: bool,
        random: &mut RandomSource,
    ) -> usize {
        let count = self.grains.len();
        if count >= MAX_ACTIVE_GRAINS || count >= SPAWN_GRAIN_LIMIT || sample_rate == 0 {
            return 0;
        }
        self.spawn_timer += parameters.density * SPAWN_RATE_SCALE / sample_rate as f32;
        let mut due = 0;
        while self.spawn_timer >= 1.0 && may_spawn {
            let jitter_offset = if parameters.jitter > Self::MIN_AMOUNT {
                random.bipolar() * parameters.jitter * Self::TIMING_JITTER
            } else {
                0.0
            };
            self.spawn_timer -= 1.0 + jitter_offset;
            due += 1;
        }
        due
    }

    /// Build and add a new grain plus its unison copies. Returns the number of added grains.
    pub fn spawn(&mut self, context: &GrainSpawnContext, random: &mut RandomSource) -> usize {
        let parameters = context.parameters;
        let frame_count = context.source.frame_count();
        if context.source.is_empty() || context.sample_rate == 0 {
            return 0;
        }
        let length = frame_count as f32;
        let max_position = length - 1.0;

        let min_size = GranularParameters::MIN_GRAIN_SIZE_MS;
        let max_size = GranularParameters::MAX_GRAIN_SIZE_MS;
        let mut size_ms = parameters.grain_size_ms();
        if context.modulation.size != 0.0 {
            size_ms = (size_ms * (1.0 + context.modulation.size * 0.5)).clamp(min_size, max_size);
        }
        if parameters.jitter > Self::MIN_AMOUNT {
            let variation = 1.0 + random.bipolar() * parameters.jitter * Self::SIZE_JITTER;
            size_ms = (size_ms * variation).clamp(min_size, max_size);
        }
        let total_samples = (size_ms * context.sample_rate as f32 / 1000.0) as usize;
        if total_samples == 0 {
            return 0;
        }

        let mut pitch = parameters.pitch
            + parameters.grain_pitch
            + (context.note as f32 - 60.0)
            + context.modulation.pitch * 12.0;
        if parameters.pitch_jitter > Self::MIN_AMOUNT {
            pitch += random.bipolar() * parameters.pitch_jitter * 12.0;
        }
        let rate_ratio = context.source.sample_rate() as f32 / context.sample_rate as f32;
        let increment = Self::pitch_to_increment(pitch) * rate_ratio;

        let reverse = random.chance(parameters.reverse);
        let stereo_position = random.bipolar() * parameters.stereo_width;
        let amplitude = if parameters.grain_amp > Self::MIN_AMOUNT {
            1.0 - parameters.grain_amp * random.unipolar()
        } else {
            1.0
        };

        let position = context.position.clamp(0.0, max_position);
        self.grains.push(Grain::new(
            position,
            increment,
            reverse,
            total_samples,
            parameters.grain_shape,
            stereo_position,
            amplitude,
        ));

        let unison_voices = parameters.unison_voices.max(1) as usize;
        for index in 1..unison_voices {
            let spread = index as f32 / (unison_voices - 1) as f32 - 0.5;
            let detune = spread * Self::UNISON_DETUNE;
            let offset = random.bipolar() * Self::UNISON_OFFSET * length;
            self.grains.push(Grain::new(
                (position + offset).clamp(0.0, max_position),
                increment * Self::pitch_to_increment(detune),
                reverse,
                total_samples,
                parameters.grain_shape,
                spread * parameters.stereo_width,
                amplitude,
            ));
        }
        unison_voices
    }

    /// Mix one stereo frame of all grains and retire finished ones.
    #[inline]
    pub fn process(&mut self, source: &AudioSource, loop_mode: LoopMode) -> [f32; 2] {
        if self.grains.is_empty() {
            return [0.0; 2];
        }
        let interpolator = SampleInterpolator::new(source);
        let max_position = source.frame_count().saturating_sub(1) as f32;

        let mut output = [0.0; 2];
        for grain in self.grains.iter_mut() {
            let [left, right] = grain.process(&interpolator, loop_mode, max_position);
            output[0] += left;
            output[1] += right;
        }
        self.grains.remove_finished();
        output
    }

    /// Move all grains into the bounds of a source with the given frame count.
    pub fn clamp_positions(&mut self, frame_count: usize) {
        let max_position = frame_count.saturating_sub(1) as f32;
        for grain in self.grains.iter_mut() {
            grain.position = grain.position.clamp(0.0, max_position);
        }
    }

    #[inline]
    fn pitch_to_increment(semitones: f32) -> f32 {
        2.0_f32.powf(semitones / 12.0)
    }
}

// -------------------------------------------------------------------------------------------------
