#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod engine;
mod error;
mod source;

// public, flat re-exports
pub use error::Error;

pub use source::{AudioSource, SampleInterpolator};

pub use engine::{
    EngineOptions, GrainShape, GranularEngine, GranularEngineHandle, GranularParameters,
    LfoParameters, LfoTarget, LoopMode, INITIAL_GRAINS, MAX_ACTIVE_GRAINS, QUIET_GRAIN_THRESHOLD,
    SPAWN_GRAIN_LIMIT, SPAWN_RATE_SCALE, VOICE_COUNT, VOICE_GAIN,
};

pub use utils::dsp::lfo::LfoWaveform;

// public mods
pub mod parameter;
pub mod utils;
