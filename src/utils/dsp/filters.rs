//! Filters used by the voice tone shaping.

pub mod biquad;
