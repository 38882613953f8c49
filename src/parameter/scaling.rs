// -------------------------------------------------------------------------------------------------

/// Parameter scaling for float parameters, applied to convert normalized UI or automation
/// values to the internal values.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub enum ParameterScaling {
    #[default]
    /// Linear scaling: `y = x` (no transformation applied)
    Linear,

    /// Exponential scaling: `y = x^factor`
    /// Factor must be > 0.0.
    ///
    /// Values > 1.0 create a curve that rises slowly at first then quickly, which spreads short
    /// times (e.g. envelope attacks) over a larger part of the normalized range.
    Exponential(f32),
}

impl ParameterScaling {
    /// Apply scaling to a normalized f32 value.
    pub fn scale(&self, value: f32) -> f32 {
        debug_assert!(
            (0.0..=1.0).contains(&value),
            "Expecting a normalized value here"
        );
        match self {
            ParameterScaling::Linear => value,
            ParameterScaling::Exponential(factor) => value.powf(*factor),
        }
    }

    /// Apply inverse scaling to a normalized f32 value.
    pub fn unscale(&self, value: f32) -> f32 {
        debug_assert!(
            (0.0..=1.0).contains(&value),
            "Expecting a normalized value here"
        );
        match self {
            ParameterScaling::Linear => value,
            ParameterScaling::Exponential(factor) => {
                let factor = factor.abs().max(0.001);
                value.powf(1.0 / factor)
            }
        }
    }

    pub(crate) const fn validate(&self) {
        match self {
            ParameterScaling::Linear => {}
            ParameterScaling::Exponential(factor) => {
                assert!(
                    *factor > 0.0,
                    "Invalid exponential parameter scaling factor (must be > 0)"
                );
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
