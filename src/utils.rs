//! Shared audio buffer and DSP helpers used by the engine.

pub mod adsr;
pub mod buffer;
pub mod dsp;
pub mod random;

// -------------------------------------------------------------------------------------------------

/// Linearly map a normalized `0..=1` value into the given `min..=max` range.
#[inline]
pub fn map_normalized(value: f32, min: f32, max: f32) -> f32 {
    min + value * (max - min)
}

/// Linear interpolation between `a` and `b` by `t`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// -------------------------------------------------------------------------------------------------
