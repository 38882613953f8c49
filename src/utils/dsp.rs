//! Common, shared DSP tools for voices.

pub mod delay;
pub mod filters;
pub mod lfo;
