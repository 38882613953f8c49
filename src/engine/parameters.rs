//! Parameter snapshot and parameter descriptors of the granular engine.

use std::time::Duration;

use four_cc::FourCC;
use strum::VariantNames;

use crate::{
    parameter::{
        EnumParameter, FloatParameter, IntegerParameter, Parameter, ParameterScaling,
        ParameterValueUpdate,
    },
    utils::{dsp::lfo::LfoWaveform, map_normalized},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Amplitude window applied over a grain's lifetime.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
    strum::EnumIter,
)]
#[repr(u8)]
pub enum GrainShape {
    #[default]
    Hann,
    Triangle,
    /// No windowing at all.
    Square,
    Gaussian,
}

/// How the scan sweep and grain playback treat the source boundaries.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
    strum::EnumIter,
)]
#[repr(u8)]
pub enum LoopMode {
    /// Wrap around at the end.
    #[default]
    Forward,
    /// Wrap around, with mirrored grain start positions.
    Backward,
    /// Bounce back at the boundaries.
    PingPong,
}

/// Modulation destination of an LFO.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
    strum::EnumIter,
)]
#[repr(u8)]
pub enum LfoTarget {
    #[default]
    Position,
    Pitch,
    Size,
}

// -------------------------------------------------------------------------------------------------

/// Settings of a single modulation LFO.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LfoParameters {
    /// Normalized rate, mapped to 0.1 - 20 Hz.
    pub rate: f32,
    /// Modulation depth (0.0 - 1.0). Amounts <= 0.01 disable the LFO.
    pub amount: f32,
    pub target: LfoTarget,
    pub shape: LfoWaveform,
}

impl LfoParameters {
    pub const MIN_RATE_HZ: f32 = 0.1;
    pub const MAX_RATE_HZ: f32 = 20.0;

    /// LFO rate in Hz.
    pub fn rate_hz(&self) -> f32 {
        map_normalized(self.rate, Self::MIN_RATE_HZ, Self::MAX_RATE_HZ)
    }

    /// Normalized rate value for the given rate in Hz.
    pub fn rate_from_hz(hz: f32) -> f32 {
        ((hz - Self::MIN_RATE_HZ) / (Self::MAX_RATE_HZ - Self::MIN_RATE_HZ)).clamp(0.0, 1.0)
    }
}

// -------------------------------------------------------------------------------------------------

/// Immutable per-block parameter snapshot, which controls all grains and voices of a
/// [`GranularEngine`](crate::GranularEngine).
///
/// Unless noted otherwise, all values are normalized in range `0.0..=1.0`. Out of range values
/// are clamped when the snapshot gets applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GranularParameters {
    /// Grain size, mapped to 10 - 2000 ms.
    pub grain_size: f32,
    /// Grain spawn rate: 1.0 spawns 50 grains per second.
    pub density: f32,
    /// Texture: random start position offset. The larger one of texture and spray applies.
    pub texture: f32,
    /// Spray: random start position offset. The larger one of texture and spray applies.
    pub spray: f32,
    /// Global transpose in semitones (-48 - 48).
    pub pitch: f32,
    /// Grain transpose in semitones (-24 - 24).
    pub grain_pitch: f32,
    /// Base read position in the source.
    pub position: f32,
    /// Probability of grains playing backwards.
    pub reverse: f32,
    /// Speed of the automatic position sweep.
    pub scan: f32,
    /// Random grain size and spawn timing variation.
    pub jitter: f32,
    /// Random grain pitch variation, up to ±12 semitones.
    pub pitch_jitter: f32,
    /// Random grain amplitude variation.
    pub grain_amp: f32,
    pub grain_shape: GrainShape,
    pub loop_mode: LoopMode,
    /// Smoothing of position changes.
    pub glide: f32,
    /// Random stereo spread of grains.
    pub stereo_width: f32,
    /// Blend from the live position towards a held position.
    pub freeze: f32,
    /// Lowpass cutoff, mapped to 80 Hz - 20 kHz. A value of 1.0 bypasses the filter.
    pub filter_cutoff: f32,
    /// Lowpass resonance, mapped to a Q of 0.5 - 10.
    pub filter_resonance: f32,
    /// Envelope attack time in milliseconds (1 - 2000).
    pub attack_ms: f32,
    /// Envelope decay time in milliseconds (1 - 2000).
    pub decay_ms: f32,
    /// Envelope sustain level.
    pub sustain: f32,
    /// Envelope release time in milliseconds (5 - 4000).
    pub release_ms: f32,
    pub lfo1: LfoParameters,
    pub lfo2: LfoParameters,
    /// Chorus wet amount: 1.0 mixes 50% wet signal.
    pub chorus_amount: f32,
    /// Number of grain copies spawned per grain (1 - 8).
    pub unison_voices: u8,
    /// Master output level.
    pub level: f32,
}

impl Default for GranularParameters {
    fn default() -> Self {
        Self {
            grain_size: Self::GRAIN_SIZE.default_value(),
            density: Self::DENSITY.default_value(),
            texture: Self::TEXTURE.default_value(),
            spray: Self::SPRAY.default_value(),
            pitch: Self::PITCH.default_value(),
            grain_pitch: Self::GRAIN_PITCH.default_value(),
            position: Self::POSITION.default_value(),
            reverse: Self::REVERSE.default_value(),
            scan: Self::SCAN.default_value(),
            jitter: Self::JITTER.default_value(),
            pitch_jitter: Self::PITCH_JITTER.default_value(),
            grain_amp: Self::GRAIN_AMP.default_value(),
            grain_shape: GrainShape::Hann,
            loop_mode: LoopMode::Forward,
            glide: Self::GLIDE.default_value(),
            stereo_width: Self::STEREO_WIDTH.default_value(),
            freeze: Self::FREEZE.default_value(),
            filter_cutoff: Self::FILTER_CUTOFF.default_value(),
            filter_resonance: Self::FILTER_RESONANCE.default_value(),
            attack_ms: Self::ATTACK.default_value(),
            decay_ms: Self::DECAY.default_value(),
            sustain: Self::SUSTAIN.default_value(),
            release_ms: Self::RELEASE.default_value(),
            lfo1: LfoParameters {
                rate: Self::LFO1_RATE.default_value(),
                amount: Self::LFO1_AMOUNT.default_value(),
                target: LfoTarget::Position,
                shape: LfoWaveform::Sine,
            },
            lfo2: LfoParameters {
                rate: Self::LFO2_RATE.default_value(),
                amount: Self::LFO2_AMOUNT.default_value(),
                target: LfoTarget::Pitch,
                shape: LfoWaveform::Sine,
            },
            chorus_amount: Self::CHORUS_AMOUNT.default_value(),
            unison_voices: Self::UNISON_VOICES.default_value() as u8,
            level: Self::LEVEL.default_value(),
        }
    }
}

impl GranularParameters {
    pub const MIN_GRAIN_SIZE_MS: f32 = 10.0;
    pub const MAX_GRAIN_SIZE_MS: f32 = 2000.0;
    pub const MIN_FILTER_CUTOFF_HZ: f32 = 80.0;
    pub const MAX_FILTER_CUTOFF_HZ: f32 = 20000.0;
    pub const MIN_FILTER_Q: f32 = 0.5;
    pub const MAX_FILTER_Q: f32 = 10.0;

    /// Grain size in milliseconds.
    pub fn grain_size_ms(&self) -> f32 {
        map_normalized(
            self.grain_size.clamp(0.0, 1.0),
            Self::MIN_GRAIN_SIZE_MS,
            Self::MAX_GRAIN_SIZE_MS,
        )
    }

    /// Set the normalized grain size from a size in milliseconds.
    pub fn set_grain_size_ms(&mut self, ms: f32) {
        self.grain_size = ((ms - Self::MIN_GRAIN_SIZE_MS)
            / (Self::MAX_GRAIN_SIZE_MS - Self::MIN_GRAIN_SIZE_MS))
            .clamp(0.0, 1.0);
    }

    /// True when the lowpass filter should be applied.
    pub fn filter_enabled(&self) -> bool {
        self.filter_cutoff < 1.0
    }

    /// Lowpass cutoff frequency in Hz.
    pub fn filter_cutoff_hz(&self) -> f32 {
        map_normalized(
            self.filter_cutoff.clamp(0.0, 1.0),
            Self::MIN_FILTER_CUTOFF_HZ,
            Self::MAX_FILTER_CUTOFF_HZ,
        )
    }

    /// Lowpass resonance as filter Q.
    pub fn filter_q(&self) -> f32 {
        map_normalized(
            self.filter_resonance.clamp(0.0, 1.0),
            Self::MIN_FILTER_Q,
            Self::MAX_FILTER_Q,
        )
    }

    pub fn attack_time(&self) -> Duration {
        Duration::from_secs_f32(self.attack_ms.max(0.0) / 1000.0)
    }

    pub fn decay_time(&self) -> Duration {
        Duration::from_secs_f32(self.decay_ms.max(0.0) / 1000.0)
    }

    pub fn release_time(&self) -> Duration {
        Duration::from_secs_f32(self.release_ms.max(0.0) / 1000.0)
    }

    /// Both LFO settings.
    pub fn lfos(&self) -> [LfoParameters; 2] {
        [self.lfo1, self.lfo2]
    }

    /// Copy of this snapshot with all values clamped into their valid ranges.
    /// NaN values are replaced with the parameter's default values.
    pub fn clamped(&self) -> Self {
        let clamp_lfo = |lfo: &LfoParameters, rate: &FloatParameter, amount: &FloatParameter| {
            LfoParameters {
                rate: rate.clamp_value(lfo.rate),
                amount: amount.clamp_value(lfo.amount),
                target: lfo.target,
                shape: lfo.shape,
            }
        };
        Self {
            grain_size: Self::GRAIN_SIZE.clamp_value(self.grain_size),
            density: Self::DENSITY.clamp_value(self.density),
            texture: Self::TEXTURE.clamp_value(self.texture),
            spray: Self::SPRAY.clamp_value(self.spray),
            pitch: Self::PITCH.clamp_value(self.pitch),
            grain_pitch: Self::GRAIN_PITCH.clamp_value(self.grain_pitch),
            position: Self::POSITION.clamp_value(self.position),
            reverse: Self::REVERSE.clamp_value(self.reverse),
            scan: Self::SCAN.clamp_value(self.scan),
            jitter: Self::JITTER.clamp_value(self.jitter),
            pitch_jitter: Self::PITCH_JITTER.clamp_value(self.pitch_jitter),
            grain_amp: Self::GRAIN_AMP.clamp_value(self.grain_amp),
            grain_shape: self.grain_shape,
            loop_mode: self.loop_mode,
            glide: Self::GLIDE.clamp_value(self.glide),
            stereo_width: Self::STEREO_WIDTH.clamp_value(self.stereo_width),
            freeze: Self::FREEZE.clamp_value(self.freeze),
            filter_cutoff: Self::FILTER_CUTOFF.clamp_value(self.filter_cutoff),
            filter_resonance: Self::FILTER_RESONANCE.clamp_value(self.filter_resonance),
            attack_ms: Self::ATTACK.clamp_value(self.attack_ms),
            decay_ms: Self::DECAY.clamp_value(self.decay_ms),
            sustain: Self::SUSTAIN.clamp_value(self.sustain),
            release_ms: Self::RELEASE.clamp_value(self.release_ms),
            lfo1: clamp_lfo(&self.lfo1, &Self::LFO1_RATE, &Self::LFO1_AMOUNT),
            lfo2: clamp_lfo(&self.lfo2, &Self::LFO2_RATE, &Self::LFO2_AMOUNT),
            chorus_amount: Self::CHORUS_AMOUNT.clamp_value(self.chorus_amount),
            unison_voices: Self::UNISON_VOICES.clamp_value(self.unison_voices as i32) as u8,
            level: Self::LEVEL.clamp_value(self.level),
        }
    }
}

// -------------------------------------------------------------------------------------------------

impl GranularParameters {
    pub const GRAIN_SIZE: FloatParameter =
        FloatParameter::new(FourCC(*b"GSIZ"), "Grain Size", 0.0..=1.0, 0.1);
    pub const DENSITY: FloatParameter =
        FloatParameter::new(FourCC(*b"GDEN"), "Density", 0.0..=1.0, 0.5);
    pub const TEXTURE: FloatParameter =
        FloatParameter::new(FourCC(*b"GTEX"), "Texture", 0.0..=1.0, 0.2);
    pub const SPRAY: FloatParameter =
        FloatParameter::new(FourCC(*b"GSPR"), "Spray", 0.0..=1.0, 0.1);
    pub const PITCH: FloatParameter =
        FloatParameter::new(FourCC(*b"PTCH"), "Pitch", -48.0..=48.0, 0.0).with_unit("st");
    pub const GRAIN_PITCH: FloatParameter =
        FloatParameter::new(FourCC(*b"GPIT"), "Grain Pitch", -24.0..=24.0, 0.0).with_unit("st");
    pub const POSITION: FloatParameter =
        FloatParameter::new(FourCC(*b"GPOS"), "Position", 0.0..=1.0, 0.5);
    pub const REVERSE: FloatParameter =
        FloatParameter::new(FourCC(*b"GREV"), "Reverse", 0.0..=1.0, 0.0);
    pub const SCAN: FloatParameter = FloatParameter::new(FourCC(*b"SCAN"), "Scan", 0.0..=1.0, 0.0);
    pub const JITTER: FloatParameter =
        FloatParameter::new(FourCC(*b"JITR"), "Jitter", 0.0..=1.0, 0.0);
    pub const PITCH_JITTER: FloatParameter =
        FloatParameter::new(FourCC(*b"PJIT"), "Pitch Jitter", 0.0..=1.0, 0.0);
    pub const GRAIN_AMP: FloatParameter =
        FloatParameter::new(FourCC(*b"GAMP"), "Grain Amp", 0.0..=1.0, 0.0);
    pub const GRAIN_SHAPE: EnumParameter = EnumParameter::new(
        FourCC(*b"GSHP"),
        "Grain Shape",
        GrainShape::VARIANTS,
        GrainShape::Hann as usize,
    );
    pub const LOOP_MODE: EnumParameter = EnumParameter::new(
        FourCC(*b"LOOP"),
        "Loop Mode",
        LoopMode::VARIANTS,
        LoopMode::Forward as usize,
    );
    pub const GLIDE: FloatParameter =
        FloatParameter::new(FourCC(*b"GLID"), "Glide", 0.0..=1.0, 0.0);
    pub const STEREO_WIDTH: FloatParameter =
        FloatParameter::new(FourCC(*b"WIDE"), "Stereo Width", 0.0..=1.0, 0.3);
    pub const FREEZE: FloatParameter =
        FloatParameter::new(FourCC(*b"FRZE"), "Freeze", 0.0..=1.0, 0.0);
    pub const FILTER_CUTOFF: FloatParameter =
        FloatParameter::new(FourCC(*b"FCUT"), "Filter Cutoff", 0.0..=1.0, 1.0);
    pub const FILTER_RESONANCE: FloatParameter =
        FloatParameter::new(FourCC(*b"FRES"), "Filter Resonance", 0.0..=1.0, 0.0);
    pub const ATTACK: FloatParameter =
        FloatParameter::new(FourCC(*b"AATK"), "Attack", 1.0..=2000.0, 10.0)
            .with_scaling(ParameterScaling::Exponential(3.0))
            .with_unit("ms");
    pub const DECAY: FloatParameter =
        FloatParameter::new(FourCC(*b"ADEC"), "Decay", 1.0..=2000.0, 50.0)
            .with_scaling(ParameterScaling::Exponential(3.0))
            .with_unit("ms");
    pub const SUSTAIN: FloatParameter =
        FloatParameter::new(FourCC(*b"ASUS"), "Sustain", 0.0..=1.0, 1.0);
    pub const RELEASE: FloatParameter =
        FloatParameter::new(FourCC(*b"AREL"), "Release", 5.0..=4000.0, 200.0)
            .with_scaling(ParameterScaling::Exponential(3.0))
            .with_unit("ms");
    pub const LFO1_RATE: FloatParameter =
        FloatParameter::new(FourCC(*b"L1RT"), "LFO 1 Rate", 0.0..=1.0, 0.045226);
    pub const LFO1_AMOUNT: FloatParameter =
        FloatParameter::new(FourCC(*b"L1AM"), "LFO 1 Amount", 0.0..=1.0, 0.0);
    pub const LFO1_TARGET: EnumParameter = EnumParameter::new(
        FourCC(*b"L1TG"),
        "LFO 1 Target",
        LfoTarget::VARIANTS,
        LfoTarget::Position as usize,
    );
    pub const LFO1_SHAPE: EnumParameter = EnumParameter::new(
        FourCC(*b"L1SH"),
        "LFO 1 Shape",
        LfoWaveform::VARIANTS,
        LfoWaveform::Sine as usize,
    );
    pub const LFO2_RATE: FloatParameter =
        FloatParameter::new(FourCC(*b"L2RT"), "LFO 2 Rate", 0.0..=1.0, 0.020101);
    pub const LFO2_AMOUNT: FloatParameter =
        FloatParameter::new(FourCC(*b"L2AM"), "LFO 2 Amount", 0.0..=1.0, 0.0);
    pub const LFO2_TARGET: EnumParameter = EnumParameter::new(
        FourCC(*b"L2TG"),
        "LFO 2 Target",
        LfoTarget::VARIANTS,
        LfoTarget::Pitch as usize,
    );
    pub const LFO2_SHAPE: EnumParameter = EnumParameter::new(
        FourCC(*b"L2SH"),
        "LFO 2 Shape",
        LfoWaveform::VARIANTS,
        LfoWaveform::Sine as usize,
    );
    pub const CHORUS_AMOUNT: FloatParameter =
        FloatParameter::new(FourCC(*b"CHRS"), "Chorus", 0.0..=1.0, 0.0);
    pub const UNISON_VOICES: IntegerParameter =
        IntegerParameter::new(FourCC(*b"UNIS"), "Unison Voices", 1..=8, 1);
    pub const LEVEL: FloatParameter =
        FloatParameter::new(FourCC(*b"LEVL"), "Level", 0.0..=1.0, 0.8);

    /// All parameter descriptors of the granular engine.
    pub fn descriptors() -> Vec<Box<dyn Parameter>> {
        vec![
            Self::GRAIN_SIZE.into_box(),
            Self::DENSITY.into_box(),
            Self::TEXTURE.into_box(),
            Self::SPRAY.into_box(),
            Self::PITCH.into_box(),
            Self::GRAIN_PITCH.into_box(),
            Self::POSITION.into_box(),
            Self::REVERSE.into_box(),
            Self::SCAN.into_box(),
            Self::JITTER.into_box(),
            Self::PITCH_JITTER.into_box(),
            Self::GRAIN_AMP.into_box(),
            Self::GRAIN_SHAPE.into_box(),
            Self::LOOP_MODE.into_box(),
            Self::GLIDE.into_box(),
            Self::STEREO_WIDTH.into_box(),
            Self::FREEZE.into_box(),
            Self::FILTER_CUTOFF.into_box(),
            Self::FILTER_RESONANCE.into_box(),
            Self::ATTACK.into_box(),
            Self::DECAY.into_box(),
            Self::SUSTAIN.into_box(),
            Self::RELEASE.into_box(),
            Self::LFO1_RATE.into_box(),
            Self::LFO1_AMOUNT.into_box(),
            Self::LFO1_TARGET.into_box(),
            Self::LFO1_SHAPE.into_box(),
            Self::LFO2_RATE.into_box(),
            Self::LFO2_AMOUNT.into_box(),
            Self::LFO2_TARGET.into_box(),
            Self::LFO2_SHAPE.into_box(),
            Self::CHORUS_AMOUNT.into_box(),
            Self::UNISON_VOICES.into_box(),
            Self::LEVEL.into_box(),
        ]
    }

    /// Apply a single [`ParameterValueUpdate`] to the parameter with the given id.
    pub fn set_parameter(&mut self, id: FourCC, value: &ParameterValueUpdate) -> Result<(), Error> {
        match id {
            _ if id == Self::GRAIN_SIZE.id() => {
                self.grain_size = Self::GRAIN_SIZE.value_from_update(value)?;
            }
            _ if id == Self::DENSITY.id() => {
                self.density = Self::DENSITY.value_from_update(value)?;
            }
            _ if id == Self::TEXTURE.id() => {
                self.texture = Self::TEXTURE.value_from_update(value)?;
            }
            _ if id == Self::SPRAY.id() => {
                self.spray = Self::SPRAY.value_from_update(value)?;
            }
            _ if id == Self::PITCH.id() => {
                self.pitch = Self::PITCH.value_from_update(value)?;
            }
            _ if id == Self::GRAIN_PITCH.id() => {
                self.grain_pitch = Self::GRAIN_PITCH.value_from_update(value)?;
            }
            _ if id == Self::POSITION.id() => {
                self.position = Self::POSITION.value_from_update(value)?;
            }
            _ if id == Self::REVERSE.id() => {
                self.reverse = Self::REVERSE.value_from_update(value)?;
            }
            _ if id == Self::SCAN.id() => {
                self.scan = Self::SCAN.value_from_update(value)?;
            }
            _ if id == Self::JITTER.id() => {
                self.jitter = Self::JITTER.value_from_update(value)?;
            }
            _ if id == Self::PITCH_JITTER.id() => {
                self.pitch_jitter = Self::PITCH_JITTER.value_from_update(value)?;
            }
            _ if id == Self::GRAIN_AMP.id() => {
                self.grain_amp = Self::GRAIN_AMP.value_from_update(value)?;
            }
            _ if id == Self::GRAIN_SHAPE.id() => {
                self.grain_shape = Self::GRAIN_SHAPE.value_from_update(value)?;
            }
            _ if id == Self::LOOP_MODE.id() => {
                self.loop_mode = Self::LOOP_MODE.value_from_update(value)?;
            }
            _ if id == Self::GLIDE.id() => {
                self.glide = Self::GLIDE.value_from_update(value)?;
            }
            _ if id == Self::STEREO_WIDTH.id() => {
                self.stereo_width = Self::STEREO_WIDTH.value_from_update(value)?;
            }
            _ if id == Self::FREEZE.id() => {
                self.freeze = Self::FREEZE.value_from_update(value)?;
            }
            _ if id == Self::FILTER_CUTOFF.id() => {
                self.filter_cutoff = Self::FILTER_CUTOFF.value_from_update(value)?;
            }
            _ if id == Self::FILTER_RESONANCE.id() => {
                self.filter_resonance = Self::FILTER_RESONANCE.value_from_update(value)?;
            }
            _ if id == Self::ATTACK.id() => {
                self.attack_ms = Self::ATTACK.value_from_update(value)?;
            }
            _ if id == Self::DECAY.id() => {
                self.decay_ms = Self::DECAY.value_from_update(value)?;
            }
            _ if id == Self::SUSTAIN.id() => {
                self.sustain = Self::SUSTAIN.value_from_update(value)?;
            }
            _ if id == Self::RELEASE.id() => {
                self.release_ms = Self::RELEASE.value_from_update(value)?;
            }
            _ if id == Self::LFO1_RATE.id() => {
                self.lfo1.rate = Self::LFO1_RATE.value_from_update(value)?;
            }
            _ if id == Self::LFO1_AMOUNT.id() => {
                self.lfo1.amount = Self::LFO1_AMOUNT.value_from_update(value)?;
            }
            _ if id == Self::LFO1_TARGET.id() => {
                self.lfo1.target = Self::LFO1_TARGET.value_from_update(value)?;
            }
            _ if id == Self::LFO1_SHAPE.id() => {
                self.lfo1.shape = Self::LFO1_SHAPE.value_from_update(value)?;
            }
            _ if id == Self::LFO2_RATE.id() => {
                self.lfo2.rate = Self::LFO2_RATE.value_from_update(value)?;
            }
            _ if id == Self::LFO2_AMOUNT.id() => {
                self.lfo2.amount = Self::LFO2_AMOUNT.value_from_update(value)?;
            }
            _ if id == Self::LFO2_TARGET.id() => {
                self.lfo2.target = Self::LFO2_TARGET.value_from_update(value)?;
            }
            _ if id == Self::LFO2_SHAPE.id() => {
                self.lfo2.shape = Self::LFO2_SHAPE.value_from_update(value)?;
            }
            _ if id == Self::CHORUS_AMOUNT.id() => {
                self.chorus_amount = Self::CHORUS_AMOUNT.value_from_update(value)?;
            }
            _ if id == Self::UNISON_VOICES.id() => {
                self.unison_voices = Self::UNISON_VOICES.value_from_update(value)? as u8;
            }
            _ if id == Self::LEVEL.id() => {
                self.level = Self::LEVEL.value_from_update(value)?;
            }
            _ => {
                return Err(Error::ParameterError(format!(
                    "Invalid/unknown granular parameter '{id}'"
                )))
            }
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn defaults() {
        let parameters = GranularParameters::default();
        assert_eq!(parameters, parameters.clamped());
        assert!((parameters.lfo1.rate_hz() - 1.0).abs() < 0.01);
        assert!((parameters.lfo2.rate_hz() - 0.5).abs() < 0.01);
        assert!(!parameters.filter_enabled());
        assert_eq!(parameters.unison_voices, 1);
    }

    #[test]
    fn unique_descriptor_ids() {
        let descriptors = GranularParameters::descriptors();
        let ids = descriptors.iter().map(|d| d.id()).collect::<HashSet<_>>();
        assert_eq!(ids.len(), descriptors.len());
    }

    #[test]
    fn clamping() {
        let parameters = GranularParameters {
            density: 4.0,
            pitch: -100.0,
            position: f32::NAN,
            attack_ms: 0.0,
            unison_voices: 0,
            lfo2: LfoParameters {
                amount: 2.0,
                ..GranularParameters::default().lfo2
            },
            ..GranularParameters::default()
        }
        .clamped();
        assert_eq!(parameters.density, 1.0);
        assert_eq!(parameters.pitch, -48.0);
        assert_eq!(parameters.position, 0.5);
        assert_eq!(parameters.attack_ms, 1.0);
        assert_eq!(parameters.unison_voices, 1);
        assert_eq!(parameters.lfo2.amount, 1.0);
    }

    #[test]
    fn derived_values() {
        let mut parameters = GranularParameters::default();
        parameters.set_grain_size_ms(100.0);
        assert!((parameters.grain_size_ms() - 100.0).abs() < 1e-3);

        parameters.filter_cutoff = 0.0;
        parameters.filter_resonance = 1.0;
        assert!(parameters.filter_enabled());
        assert_eq!(parameters.filter_cutoff_hz(), 80.0);
        assert_eq!(parameters.filter_q(), 10.0);

        assert_eq!(LfoParameters::rate_from_hz(20.0), 1.0);
        assert_eq!(LfoParameters::rate_from_hz(0.0), 0.0);
    }

    #[test]
    fn set_parameters() -> Result<(), Box<dyn std::error::Error>> {
        let mut parameters = GranularParameters::default();
        parameters.set_parameter(
            GranularParameters::DENSITY.id(),
            &ParameterValueUpdate::Raw(Box::new(0.25_f32)),
        )?;
        assert_eq!(parameters.density, 0.25);

        parameters.set_parameter(
            GranularParameters::GRAIN_SHAPE.id(),
            &ParameterValueUpdate::Raw(Box::new(GrainShape::Gaussian)),
        )?;
        assert_eq!(parameters.grain_shape, GrainShape::Gaussian);

        parameters.set_parameter(
            GranularParameters::LOOP_MODE.id(),
            &ParameterValueUpdate::Raw(Box::new("PingPong".to_string())),
        )?;
        assert_eq!(parameters.loop_mode, LoopMode::PingPong);

        parameters.set_parameter(
            GranularParameters::LFO2_SHAPE.id(),
            &ParameterValueUpdate::Normalized(1.0),
        )?;
        assert_eq!(parameters.lfo2.shape, LfoWaveform::Random);

        parameters.set_parameter(
            GranularParameters::UNISON_VOICES.id(),
            &ParameterValueUpdate::Raw(Box::new(12_i32)),
        )?;
        assert_eq!(parameters.unison_voices, 8);

        parameters.set_parameter(
            GranularParameters::RELEASE.id(),
            &ParameterValueUpdate::Normalized(0.0),
        )?;
        assert_eq!(parameters.release_ms, 5.0);

        assert!(parameters
            .set_parameter(FourCC(*b"NOPE"), &ParameterValueUpdate::Normalized(0.5))
            .is_err());
        assert!(parameters
            .set_parameter(
                GranularParameters::DENSITY.id(),
                &ParameterValueUpdate::Raw(Box::new(true))
            )
            .is_err());
        Ok(())
    }
}
