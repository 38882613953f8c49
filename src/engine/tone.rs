//! Per-voice lowpass filter and stereo chorus.

use std::f64::consts::PI;

use crate::{
    engine::parameters::GranularParameters,
    utils::dsp::{
        delay::DelayLine,
        filters::biquad::{BiquadFilter, BiquadFilterCoefficients},
        lfo::{Lfo, LfoWaveform},
    },
};

// -------------------------------------------------------------------------------------------------

/// Lowpass filter and chorus widening, applied to the mixed grains of a voice.
#[derive(Debug, Clone)]
pub(crate) struct ToneShaping {
    sample_rate: u32,
    filter_coefficients: BiquadFilterCoefficients,
    filter_enabled: bool,
    filters: [BiquadFilter; 2],
    chorus_amount: f32,
    chorus_delay: DelayLine<2>,
    chorus_lfos: [Lfo; 2],
}

impl ToneShaping {
    /// Highest applied cutoff relative to the sample rate.
    const MAX_RELATIVE_CUTOFF: f32 = 0.49;
    const CHORUS_BASE_DELAY_SECONDS: f32 = 0.008;
    const CHORUS_DEPTH_SECONDS: f32 = 0.005;
    const CHORUS_RATE_HZ: f64 = 0.5;
    /// Chorus amounts below this value skip the chorus.
    const CHORUS_MIN_AMOUNT: f32 = 0.01;
    /// Wet mix at full chorus amount.
    const CHORUS_MAX_MIX: f32 = 0.5;

    pub fn new(sample_rate: u32) -> Self {
        let max_delay_seconds = Self::CHORUS_BASE_DELAY_SECONDS + Self::CHORUS_DEPTH_SECONDS;
        let max_delay_frames = (max_delay_seconds * sample_rate as f32).ceil() as usize + 2;
        let chorus_delay = DelayLine::new(max_delay_frames);
        let mut chorus_lfos = [
            Lfo::new(sample_rate, Self::CHORUS_RATE_HZ, LfoWaveform::Sine),
            Lfo::new(sample_rate, Self::CHORUS_RATE_HZ, LfoWaveform::Sine),
        ];
        // right channel runs 90° ahead
        chorus_lfos[1].set_phase(PI / 2.0);
        Self {
            sample_rate,
            filter_coefficients: BiquadFilterCoefficients::default(),
            filter_enabled: false,
            filters: [BiquadFilter::new(), BiquadFilter::new()],
            chorus_amount: 0.0,
            chorus_delay,
            chorus_lfos,
        }
    }

    #[cfg(test)]
    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    /// Currently applied filter cutoff in Hz and Q.
    #[cfg(test)]
    pub fn filter_settings(&self) -> (f32, f32) {
        (
            self.filter_coefficients.cutoff(),
            self.filter_coefficients.q(),
        )
    }

    /// Clear filter and delay line states.
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
        self.chorus_delay.flush();
        self.chorus_lfos[0].set_phase(0.0);
        self.chorus_lfos[1].set_phase(PI / 2.0);
    }

    /// Apply filter and chorus settings from a new parameter snapshot.
    pub fn update(&mut self, parameters: &GranularParameters) {
        let was_enabled = self.filter_enabled;
        self.filter_enabled = if parameters.filter_enabled() {
            let cutoff = parameters
                .filter_cutoff_hz()
                .min(self.sample_rate as f32 * Self::MAX_RELATIVE_CUTOFF);
            let q = parameters.filter_q();
            self.filter_coefficients
                .set(self.sample_rate, cutoff, q)
                .is_ok()
        } else {
            false
        };
        if self.filter_enabled && !was_enabled {
            for filter in &mut self.filters {
                filter.reset();
            }
        }
        self.chorus_amount = parameters.chorus_amount;
    }

    /// Process a single stereo frame.
    #[inline]
    pub fn process(&mut self, input: [f32; 2]) -> [f32; 2] {
        let mut output = input;
        if self.filter_enabled {
            for (sample, filter) in output.iter_mut().zip(self.filters.iter_mut()) {
                *sample = filter.process_sample(&self.filter_coefficients, *sample as f64) as f32;
            }
        }
        if self.chorus_amount >= Self::CHORUS_MIN_AMOUNT {
            let sample_rate = self.sample_rate as f32;
            let base_delay = Self::CHORUS_BASE_DELAY_SECONDS * sample_rate;
            let depth = Self::CHORUS_DEPTH_SECONDS * sample_rate;
            let max_delay = self.chorus_delay.max_delay_frames() as f32;
            let delays = [
                (base_delay + depth * self.chorus_lfos[0].next() as f32).clamp(1.0, max_delay),
                (base_delay + depth * self.chorus_lfos[1].next() as f32).clamp(1.0, max_delay),
            ];
            let wet = self.chorus_delay.process_sample(output, delays);
            let mix = self.chorus_amount * Self::CHORUS_MAX_MIX;
            for (sample, wet) in output.iter_mut().zip(wet) {
                *sample = *sample * (1.0 - mix) + wet * mix;
            }
        }
        output
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass() {
        let mut tone = ToneShaping::new(44100);
        tone.update(&GranularParameters::default());
        assert!(!tone.filter_enabled());
        for frame in [[1.0, -1.0], [0.5, 0.25], [0.0, 0.0]] {
            assert_eq!(tone.process(frame), frame);
        }
    }

    #[test]
    fn filter_settings() {
        let mut tone = ToneShaping::new(44100);
        let mut parameters = GranularParameters {
            filter_cutoff: 0.5,
            filter_resonance: 0.0,
            ..GranularParameters::default()
        };
        tone.update(&parameters);
        assert!(tone.filter_enabled());
        assert_eq!(tone.filter_settings(), (10040.0, 0.5));

        // cutoff stays below nyquist
        let mut tone = ToneShaping::new(8000);
        parameters.filter_cutoff = 0.99;
        tone.update(&parameters);
        assert!(tone.filter_enabled());
        assert!(tone.filter_settings().0 < 4000.0);
    }

    #[test]
    fn filter_attenuates_highs() {
        let mut tone = ToneShaping::new(44100);
        tone.update(&GranularParameters {
            filter_cutoff: 0.0,
            ..GranularParameters::default()
        });
        // nyquist rate square wave
        let mut peak = 0.0_f32;
        for i in 0..4410 {
            let input = if i % 2 == 0 { 1.0 } else { -1.0 };
            let [left, right] = tone.process([input, input]);
            assert_eq!(left, right);
            if i > 441 {
                peak = peak.max(left.abs());
            }
        }
        assert!(peak < 0.01, "{peak}");
    }

    #[test]
    fn chorus_delays_signal() {
        let sample_rate = 1000;
        let mut tone = ToneShaping::new(sample_rate);
        tone.update(&GranularParameters {
            chorus_amount: 1.0,
            ..GranularParameters::default()
        });
        // impulse: dry part is mixed at 50%
        let [left, right] = tone.process([1.0, 1.0]);
        assert_eq!((left, right), (0.5, 0.5));
        // the wet impulse shows up within the max delay time
        let mut wet_energy = 0.0;
        for _ in 0..20 {
            let [left, right] = tone.process([0.0, 0.0]);
            assert!(left.is_finite() && right.is_finite());
            wet_energy += left.abs() + right.abs();
        }
        assert!((wet_energy - 1.0).abs() < 0.05, "{wet_energy}");
    }
}
