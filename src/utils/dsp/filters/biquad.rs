use std::f64;

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Lowpass coefficients for a [`BiquadFilter`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BiquadFilterCoefficients {
    sample_rate: u32,
    cutoff: f32,
    q: f32,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl BiquadFilterCoefficients {
    pub fn new(sample_rate: u32, cutoff: f32, q: f32) -> Result<Self, Error> {
        let mut coefficients = BiquadFilterCoefficients::default();
        coefficients.set(sample_rate, cutoff, q)?;
        Ok(coefficients)
    }

    /// The frequency in Hz where the cutoff of the filter should be.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// The steepness of the filter.
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Sets new and applies a batch of new filter parameters.
    pub fn set(&mut self, sample_rate: u32, cutoff: f32, q: f32) -> Result<(), Error> {
        if self.sample_rate != sample_rate || self.cutoff != cutoff || self.q != q {
            self.sample_rate = sample_rate;
            self.cutoff = cutoff;
            self.q = q;
            self.apply()
        } else {
            Ok(())
        }
    }

    fn apply(&mut self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter sample-rate: must be > 0, but is {s}",
                s = self.sample_rate
            )));
        }
        if self.q <= 0.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter Q: must be > 0, but is {q}",
                q = self.q
            )));
        }
        if self.cutoff <= 0.0 || self.cutoff >= self.sample_rate as f32 / 2.0 {
            return Err(Error::ParameterError(format!(
                "Invalid filter frequency: must be in range (0, nyquist {n}), but is {f}",
                n = self.sample_rate as f32 / 2.0,
                f = self.cutoff
            )));
        }
        let g = f64::tan(f64::consts::PI * self.cutoff as f64 / self.sample_rate as f64);
        let k = 1.0 / self.q as f64;
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// State variable lowpass filter, designed by Andrew Simper of Cytomic.
/// See <http://cytomic.com/files/dsp/SvfLinearTrapOptimised2.pdf>
///
/// This is a second-order filter with a cutoff slope of 12 dB/octave. Q = 0.707 means no
/// resonant peaking. The filter is stable when modulated at high rates.
#[derive(Debug, Default, Clone)]
pub struct BiquadFilter {
    ic1eq: f64,
    ic2eq: f64,
}

impl BiquadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the filter on a single sample.
    #[inline]
    pub fn process_sample(&mut self, coefficients: &BiquadFilterCoefficients, input: f64) -> f64 {
        let v0 = input;
        let v3 = v0 - self.ic2eq;
        let v1 = coefficients.a1 * self.ic1eq + coefficients.a2 * v3;
        let v2 = self.ic2eq + coefficients.a2 * self.ic1eq + coefficients.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        v2
    }

    /// Reset state of filter.
    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_coefficients() {
        assert!(BiquadFilterCoefficients::new(0, 1000.0, 0.7).is_err());
        assert!(BiquadFilterCoefficients::new(44100, 1000.0, 0.0).is_err());
        assert!(BiquadFilterCoefficients::new(44100, 30000.0, 0.7).is_err());
    }

    #[test]
    fn lowpass_passes_dc_and_damps_nyquist() -> Result<(), Box<Error>> {
        let coefficients = BiquadFilterCoefficients::new(44100, 1000.0, 0.707)?;

        let mut filter = BiquadFilter::new();
        let mut output = 0.0;
        for _ in 0..10000 {
            output = filter.process_sample(&coefficients, 1.0);
        }
        assert!((output - 1.0).abs() < 1e-3);

        filter.reset();
        let mut peak = 0.0_f64;
        for i in 0..10000 {
            let input = if i % 2 == 0 { 1.0 } else { -1.0 };
            let output = filter.process_sample(&coefficients, input);
            if i > 1000 {
                peak = peak.max(output.abs());
            }
        }
        assert!(peak < 0.01);
        Ok(())
    }
}
