//! Grain start position tracking: freeze, glide, scan sweep, spray and loop mode polarity.

use crate::{
    engine::parameters::{GranularParameters, LoopMode},
    utils::{lerp, random::RandomSource},
};

// -------------------------------------------------------------------------------------------------

/// Per-voice read position state.
///
/// Held, tracked and scan positions are normalized, so they survive audio source swaps. Only
/// [`Self::next_position`] maps them into source frames.
#[derive(Debug, Clone)]
pub(crate) struct PositionEngine {
    /// Normalized position that follows the (frozen) target, smoothed by glide.
    tracked_position: f32,
    /// Normalized position captured when freeze got engaged.
    frozen_position: Option<f32>,
    /// Scan sweep offset in range `[0, 1]`.
    scan_phase: f32,
    /// Scan sweep direction: 1 or -1 (ping-pong only).
    scan_direction: f32,
    sample_rate: u32,
}

impl PositionEngine {
    /// Modulation amounts at or below this value are treated as off.
    const MIN_AMOUNT: f32 = 0.01;
    /// Scan speed in source lengths per second at full scan amount.
    const SCAN_RATE_SCALE: f32 = 0.5;
    /// Position LFO depth relative to the source length.
    const LFO_DEPTH: f32 = 0.3;
    /// Spray/texture depth relative to the source length.
    const SPRAY_DEPTH: f32 = 0.2;
    /// Glide amount to smoothing factor scaling.
    const GLIDE_SCALE: f32 = 0.99;

    pub fn new(sample_rate: u32) -> Self {
        Self {
            tracked_position: 0.5,
            frozen_position: None,
            scan_phase: 0.0,
            scan_direction: 1.0,
            sample_rate,
        }
    }

    /// Normalized, glided position. Does not include scan, LFO or spray offsets.
    pub fn tracked_position(&self) -> f32 {
        self.tracked_position
    }

    #[cfg(test)]
    pub fn scan_phase(&self) -> f32 {
        self.scan_phase
    }

    /// Start a new note: rewind the scan sweep and snap the tracked position to its target.
    pub fn reset(&mut self, parameters: &GranularParameters) {
        self.scan_phase = 0.0;
        self.scan_direction = 1.0;
        self.frozen_position = None;
        self.tracked_position = self.target_position(parameters);
    }

    /// Move the scan sweep forward by one sample.
    #[inline]
    pub fn advance_scan(&mut self, parameters: &GranularParameters) {
        if parameters.scan <= Self::MIN_AMOUNT || self.sample_rate == 0 {
            return;
        }
        let step = parameters.scan * Self::SCAN_RATE_SCALE / self.sample_rate as f32;
        match parameters.loop_mode {
            LoopMode::Forward | LoopMode::Backward => {
                self.scan_phase = (self.scan_phase + step).rem_euclid(1.0);
            }
            LoopMode::PingPong => {
                self.scan_phase += step * self.scan_direction;
                if self.scan_phase > 1.0 {
                    self.scan_phase = 2.0 - self.scan_phase;
                    self.scan_direction = -1.0;
                } else if self.scan_phase < 0.0 {
                    self.scan_phase = -self.scan_phase;
                    self.scan_direction = 1.0;
                }
                self.scan_phase = self.scan_phase.clamp(0.0, 1.0);
            }
        }
    }

    /// Calculate the start frame of a new grain in a source with the given frame count.
    /// `lfo_position` is the summed position LFO modulation.
    pub fn next_position(
        &mut self,
        parameters: &GranularParameters,
        frame_count: usize,
        lfo_position: f32,
        random: &mut RandomSource,
    ) -> f32 {
        if frame_count == 0 {
            return 0.0;
        }
        let length = frame_count as f32;
        let max_position = (frame_count - 1) as f32;

        let target = self.target_position(parameters);
        if parameters.glide > Self::MIN_AMOUNT {
            let factor = 1.0 - parameters.glide * Self::GLIDE_SCALE;
            self.tracked_position += (target - self.tracked_position) * factor;
        } else {
            self.tracked_position = target;
        }

        let mut position = self.tracked_position * max_position;
        position += lfo_position * length * Self::LFO_DEPTH;
        if parameters.scan > Self::MIN_AMOUNT {
            position += self.scan_phase * length;
        }
        let spray = parameters.texture.max(parameters.spray);
        if spray > Self::MIN_AMOUNT {
            position += random.bipolar() * spray * length * Self::SPRAY_DEPTH;
        }
        if parameters.loop_mode == LoopMode::Backward {
            position = max_position - position;
        }
        position.clamp(0.0, max_position)
    }

    /// Normalized position target, blended towards the frozen position.
    fn target_position(&mut self, parameters: &GranularParameters) -> f32 {
        let position = parameters.position;
        if parameters.freeze > Self::MIN_AMOUNT {
            let frozen = *self.frozen_position.get_or_insert(position);
            lerp(position, frozen, parameters.freeze)
        } else {
            self.frozen_position = None;
            position
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(value: f32, expected: f32) {
        assert!(
            (value - expected).abs() < 1e-3,
            "expected {expected}, got {value}"
        );
    }

    fn quiet_parameters() -> GranularParameters {
        GranularParameters {
            texture: 0.0,
            spray: 0.0,
            ..GranularParameters::default()
        }
    }

    #[test]
    fn base_position() {
        let mut random = RandomSource::new(1);
        let mut engine = PositionEngine::new(44100);
        let parameters = quiet_parameters();
        engine.reset(&parameters);
        assert_eq!(engine.next_position(&parameters, 101, 0.0, &mut random), 50.0);
        // LFO offset
        assert_close(engine.next_position(&parameters, 101, 0.5, &mut random), 65.15);
        // clamped
        assert_eq!(engine.next_position(&parameters, 101, 2.0, &mut random), 100.0);
        assert_eq!(engine.next_position(&parameters, 0, 0.0, &mut random), 0.0);

        let parameters = GranularParameters {
            loop_mode: LoopMode::Backward,
            position: 0.25,
            ..quiet_parameters()
        };
        assert_eq!(engine.next_position(&parameters, 101, 0.0, &mut random), 75.0);
    }

    #[test]
    fn freeze_holds_position() {
        let mut random = RandomSource::new(1);
        let mut engine = PositionEngine::new(44100);
        let mut parameters = GranularParameters {
            freeze: 1.0,
            position: 0.2,
            ..quiet_parameters()
        };
        engine.reset(&parameters);
        for position in [0.2, 0.5, 0.9, 0.0] {
            parameters.position = position;
            assert_close(engine.next_position(&parameters, 11, 0.0, &mut random), 2.0);
        }
        // half frozen
        parameters.freeze = 0.5;
        parameters.position = 1.0;
        assert_close(engine.next_position(&parameters, 11, 0.0, &mut random), 6.0);
        // released and recaptured
        parameters.freeze = 0.0;
        assert_eq!(engine.next_position(&parameters, 11, 0.0, &mut random), 10.0);
        parameters.freeze = 1.0;
        parameters.position = 0.0;
        engine.next_position(&parameters, 11, 0.0, &mut random);
        parameters.position = 1.0;
        assert_eq!(engine.next_position(&parameters, 11, 0.0, &mut random), 0.0);
    }

    #[test]
    fn glide_smoothes_position_changes() {
        let mut random = RandomSource::new(1);
        let mut engine = PositionEngine::new(44100);
        let mut parameters = GranularParameters {
            glide: 0.5,
            position: 0.0,
            ..quiet_parameters()
        };
        engine.reset(&parameters);
        assert_eq!(engine.tracked_position(), 0.0);
        parameters.position = 1.0;
        let first = engine.next_position(&parameters, 101, 0.0, &mut random);
        assert_close(first, 50.5);
        let second = engine.next_position(&parameters, 101, 0.0, &mut random);
        assert!(second > first && second < 100.0);
        // note-on snaps
        engine.reset(&parameters);
        assert_eq!(engine.tracked_position(), 1.0);
    }

    #[test]
    fn scan_sweeps() {
        let mut engine = PositionEngine::new(10);
        let mut parameters = GranularParameters {
            scan: 1.0,
            ..quiet_parameters()
        };
        engine.reset(&parameters);
        // 0.05 per sample
        for _ in 0..30 {
            engine.advance_scan(&parameters);
            assert!((0.0..1.0).contains(&engine.scan_phase()));
        }
        assert_close(engine.scan_phase(), 0.5);

        parameters.loop_mode = LoopMode::PingPong;
        engine.reset(&parameters);
        for _ in 0..25 {
            engine.advance_scan(&parameters);
            assert!((0.0..=1.0).contains(&engine.scan_phase()));
        }
        assert_close(engine.scan_phase(), 0.75);

        // disabled scan doesn't move
        parameters.scan = 0.0;
        engine.reset(&parameters);
        engine.advance_scan(&parameters);
        assert_eq!(engine.scan_phase(), 0.0);
    }

    #[test]
    fn spray_stays_in_bounds() {
        let mut random = RandomSource::new(3);
        let mut engine = PositionEngine::new(44100);
        let parameters = GranularParameters {
            spray: 1.0,
            position: 0.0,
            ..GranularParameters::default()
        };
        engine.reset(&parameters);
        let mut moved = false;
        for _ in 0..100 {
            let position = engine.next_position(&parameters, 1000, 0.0, &mut random);
            assert!((0.0..=999.0).contains(&position));
            moved |= position > 0.0;
        }
        assert!(moved);
    }
}
