//! Per-voice dual LFO modulation.

use crate::{
    engine::parameters::{GranularParameters, LfoParameters, LfoTarget},
    utils::{dsp::lfo::Lfo, random::RandomSource},
};

// -------------------------------------------------------------------------------------------------

/// Summed, amount-scaled LFO values per modulation target, in range `[-2, 2]`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct ModulationValues {
    pub position: f32,
    pub pitch: f32,
    pub size: f32,
}

// -------------------------------------------------------------------------------------------------

/// Two independent LFOs, each driving one of the [`LfoTarget`]s.
#[derive(Debug, Clone)]
pub(crate) struct VoiceModulation {
    lfos: [Lfo; 2],
    sample_rate: u32,
}

impl VoiceModulation {
    /// LFOs with amounts at or below this value are inactive.
    pub const MIN_AMOUNT: f32 = 0.01;

    pub fn new(sample_rate: u32) -> Self {
        let lfos = [Lfo::default(), Lfo::default()];
        Self { lfos, sample_rate }
    }

    /// Restart both LFOs from phase zero.
    pub fn reset(&mut self) {
        for lfo in &mut self.lfos {
            lfo.set_phase(0.0);
        }
    }

    /// Apply rate and shape changes from a new parameter snapshot.
    pub fn update(&mut self, parameters: &GranularParameters) {
        for (lfo, settings) in self.lfos.iter_mut().zip(parameters.lfos()) {
            lfo.set_rate(self.sample_rate, settings.rate_hz() as f64);
            lfo.set_waveform(settings.shape);
        }
    }

    /// Move both LFO phases forward by one sample.
    #[inline]
    pub fn advance(&mut self) {
        for lfo in &mut self.lfos {
            lfo.advance();
        }
    }

    /// Current raw value of the LFO at the given index, in range `[-1, 1]`.
    pub fn lfo_value(&self, index: usize) -> f32 {
        self.lfos.get(index).map_or(0.0, |lfo| lfo.value() as f32)
    }

    /// Evaluate all active LFOs and sum their amount-scaled values by target.
    pub fn evaluate(
        &mut self,
        parameters: &GranularParameters,
        random: &mut RandomSource,
    ) -> ModulationValues {
        let mut values = ModulationValues::default();
        for (lfo, settings) in self.lfos.iter_mut().zip(parameters.lfos()) {
            if !Self::is_active(&settings) {
                continue;
            }
            let value = lfo.evaluate(random) as f32 * settings.amount;
            match settings.target {
                LfoTarget::Position => values.position += value,
                LfoTarget::Pitch => values.pitch += value,
                LfoTarget::Size => values.size += value,
            }
        }
        values
    }

    fn is_active(settings: &LfoParameters) -> bool {
        settings.amount > Self::MIN_AMOUNT
    }
}

// -------------------------------------------------------------------------------------------------
