//! Oscillators for modulation.

use std::f64::consts::PI;

use crate::utils::random::RandomSource;

// -------------------------------------------------------------------------------------------------

/// Waveform types for LFO oscillators.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
    strum::EnumIter,
)]
#[repr(u8)]
pub enum LfoWaveform {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    /// A new random value on each evaluation.
    Random,
}

// -------------------------------------------------------------------------------------------------

/// Simple non bandlimited oscillator which can be used as LFO in voices and effects.
#[derive(Debug, Default, Clone)]
pub struct Lfo {
    phase: f64,
    phase_inc: f64,
    waveform: LfoWaveform,
    random_value: f64,
}

impl Lfo {
    pub fn new(sample_rate: u32, rate: f64, waveform: LfoWaveform) -> Self {
        let mut lfo = Self {
            waveform,
            ..Self::default()
        };
        lfo.set_rate(sample_rate, rate);
        lfo
    }

    /// Set a new rate in Hz with the given sampling rate.
    pub fn set_rate(&mut self, sample_rate: u32, rate: f64) {
        self.phase_inc = if sample_rate > 0 {
            2.0 * PI * rate / sample_rate as f64
        } else {
            0.0
        };
    }

    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// The LFO's phase in radians, in range `[0, 2π)`.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Set or reset the LFO's phase in radians.
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = phase.rem_euclid(2.0 * PI);
    }

    /// Current value at the current phase in range `[-1, 1]`, without advancing.
    /// The random waveform returns the last evaluated value.
    pub fn value(&self) -> f64 {
        match self.waveform {
            LfoWaveform::Sine => self.phase.sin(),
            LfoWaveform::Triangle => {
                let normalized_phase = self.phase / (2.0 * PI);
                if normalized_phase < 0.5 {
                    4.0 * normalized_phase - 1.0
                } else {
                    -4.0 * normalized_phase + 3.0
                }
            }
            LfoWaveform::Square => {
                if self.phase < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::Sawtooth => {
                let normalized_phase = self.phase / (2.0 * PI);
                2.0 * normalized_phase - 1.0
            }
            LfoWaveform::Random => self.random_value,
        }
    }

    /// Evaluate the LFO at the current phase. The random waveform draws a new value from the
    /// given random source here.
    pub fn evaluate(&mut self, random: &mut RandomSource) -> f64 {
        if self.waveform == LfoWaveform::Random {
            self.random_value = random.bipolar() as f64;
        }
        self.value()
    }

    /// Move the phase forward by one sample.
    #[inline]
    pub fn advance(&mut self) {
        self.phase += self.phase_inc;
        while self.phase >= 2.0 * PI {
            self.phase -= 2.0 * PI;
        }
    }

    /// Advances phase and returns the value before advancing.
    pub fn next(&mut self) -> f64 {
        let value = self.value();
        self.advance();
        value
    }
}

// -------------------------------------------------------------------------------------------------
