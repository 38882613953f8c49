//! Classic linear ADSR envelope for voices.

use std::time::Duration;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Current processing stage in a [`AdsrEnvelope`].
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum AdsrStage {
    #[default]
    /// Before attack and after release (zero volume).
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

// -------------------------------------------------------------------------------------------------

/// ADSR envelope parameters that define the envelope shape for a [`AdsrEnvelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdsrParameters {
    sample_rate: u32,
    attack_rate: f32,
    decay_rate: f32,
    sustain_level: f32,
    release_rate: f32,
}

impl AdsrParameters {
    /// Create new ADSR parameters for the given sample rate. See [`Self::setup`] for
    /// parameter info.
    pub fn new(
        sample_rate: u32,
        attack_time: Duration,
        decay_time: Duration,
        sustain_level: f32,
        release_time: Duration,
    ) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "Invalid envelope sample rate: must be > 0".to_string(),
            ));
        }
        let mut parameters = Self {
            sample_rate,
            attack_rate: 0.0,
            decay_rate: 0.0,
            sustain_level: 1.0,
            release_rate: 0.0,
        };
        parameters.setup(attack_time, decay_time, sustain_level, release_time)?;
        Ok(parameters)
    }

    /// Set sustain level, attack, decay and release time durations.
    ///
    /// sustain_level is in range [0.0, 1.0]. Zero times skip the corresponding stage.
    pub fn setup(
        &mut self,
        attack_time: Duration,
        decay_time: Duration,
        sustain_level: f32,
        release_time: Duration,
    ) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&sustain_level) {
            return Err(Error::ParameterError(format!(
                "Invalid sustain level: {}. Must be in range [0.0, 1.0]",
                sustain_level
            )));
        }
        // decay rate depends on the sustain level
        self.sustain_level = sustain_level;

        self.attack_rate = self.rate(attack_time, 1.0);
        self.decay_rate = self.rate(decay_time, 1.0 - sustain_level);
        self.release_rate = self.rate(release_time, 1.0);
        Ok(())
    }

    fn rate(&self, time: Duration, distance: f32) -> f32 {
        if time.is_zero() {
            f32::MAX
        } else {
            distance / (time.as_secs_f32() * self.sample_rate as f32)
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Classic ADSR envelope with externally defined parameter state.
///
/// Parameters are defined in an external struct which must be passed to the run function.
#[derive(Debug, Default, Clone)]
pub struct AdsrEnvelope {
    stage: AdsrStage,
    release_output: f32,
    output: f32,
}

impl AdsrEnvelope {
    /// Envelope level which is treated as silent when releasing.
    pub const SILENCE: f32 = 0.001; // -60dB

    pub fn new() -> Self {
        Self::default()
    }

    /// Return the envelope's current stage.
    #[inline(always)]
    pub fn stage(&self) -> AdsrStage {
        self.stage
    }

    /// Return the envelope's current (last processed) output value.
    #[inline(always)]
    pub fn output(&self) -> f32 {
        self.output
    }

    /// True while the envelope is producing output.
    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.stage != AdsrStage::Idle
    }

    /// Restart the envelope from zero in Attack stage.
    pub fn note_on(&mut self, parameters: &AdsrParameters) {
        if parameters.attack_rate == f32::MAX {
            self.output = 1.0;
            self.stage = AdsrStage::Decay;
        } else {
            self.output = 0.0;
            self.stage = AdsrStage::Attack;
        }
    }

    /// Move into the Release stage, starting from the current output level.
    pub fn note_off(&mut self, parameters: &AdsrParameters) {
        if self.stage == AdsrStage::Idle {
            return;
        }
        self.release_output = self.output;
        if parameters.release_rate == f32::MAX || self.release_output <= f32::EPSILON {
            self.reset();
        } else {
            self.stage = AdsrStage::Release;
        }
    }

    /// Immediately stop the envelope and set state to Idle.
    pub fn reset(&mut self) {
        self.output = 0.0;
        self.release_output = 0.0;
        self.stage = AdsrStage::Idle;
    }

    /// Compute and return one output sample. Will return 0.0 and do nothing
    /// at all in Idle stage.
    #[inline]
    pub fn run(&mut self, parameters: &AdsrParameters) -> f32 {
        match self.stage {
            AdsrStage::Attack => {
                self.output += parameters.attack_rate;
                if self.output >= 1.0 {
                    self.output = 1.0;
                    self.stage = AdsrStage::Decay;
                }
            }
            AdsrStage::Decay => {
                if self.output > parameters.sustain_level {
                    self.output -= parameters.decay_rate;
                }
                if self.output <= parameters.sustain_level {
                    self.output = parameters.sustain_level;
                    self.stage = AdsrStage::Sustain;
                }
            }
            AdsrStage::Sustain => {
                // follow sustain level changes
                self.output = parameters.sustain_level;
            }
            AdsrStage::Release => {
                self.output -= self.release_output * parameters.release_rate;
                if self.output <= Self::SILENCE {
                    self.reset();
                }
            }
            AdsrStage::Idle => {
                // nothing to do
            }
        }
        self.output
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> Result<AdsrParameters, Error> {
        AdsrParameters::new(
            1000,
            Duration::from_millis(10),
            Duration::from_millis(10),
            0.5,
            Duration::from_millis(10),
        )
    }

    #[test]
    fn invalid_parameters() {
        assert!(
            AdsrParameters::new(0, Duration::ZERO, Duration::ZERO, 1.0, Duration::ZERO).is_err()
        );
        assert!(
            AdsrParameters::new(44100, Duration::ZERO, Duration::ZERO, 1.5, Duration::ZERO)
                .is_err()
        );
    }

    #[test]
    fn stages() -> Result<(), Box<Error>> {
        let parameters = parameters()?;
        let mut env = AdsrEnvelope::new();
        assert_eq!(env.stage(), AdsrStage::Idle);
        assert_eq!(env.run(&parameters), 0.0);

        env.note_on(&parameters);
        assert_eq!(env.stage(), AdsrStage::Attack);
        for _ in 0..10 {
            env.run(&parameters);
        }
        assert!((env.output() - 1.0).abs() < 1e-4);
        for _ in 0..15 {
            env.run(&parameters);
        }
        assert_eq!(env.stage(), AdsrStage::Sustain);
        assert_eq!(env.output(), 0.5);

        env.note_off(&parameters);
        assert_eq!(env.stage(), AdsrStage::Release);
        for _ in 0..12 {
            env.run(&parameters);
        }
        assert_eq!(env.stage(), AdsrStage::Idle);
        assert!(!env.is_active());
        assert_eq!(env.output(), 0.0);
        Ok(())
    }

    #[test]
    fn zero_times() -> Result<(), Box<Error>> {
        let parameters =
            AdsrParameters::new(44100, Duration::ZERO, Duration::ZERO, 1.0, Duration::ZERO)?;
        let mut env = AdsrEnvelope::new();
        env.note_on(&parameters);
        assert_eq!(env.run(&parameters), 1.0);
        assert_eq!(env.stage(), AdsrStage::Sustain);
        env.note_off(&parameters);
        assert_eq!(env.stage(), AdsrStage::Idle);
        Ok(())
    }

    #[test]
    fn reset_goes_to_idle() -> Result<(), Box<Error>> {
        let parameters = parameters()?;
        let mut env = AdsrEnvelope::new();
        env.note_on(&parameters);
        env.run(&parameters);
        env.reset();
        assert_eq!(env.stage(), AdsrStage::Idle);
        assert_eq!(env.output(), 0.0);
        Ok(())
    }
}
