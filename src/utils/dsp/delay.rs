//! Delay buffers to delay or lookup signals.

// -------------------------------------------------------------------------------------------------

/// Multi channel delay line buffer with fractional, per channel delay time support.
#[derive(Debug, Default, Clone)]
pub struct DelayLine<const CHANNELS: usize> {
    buffer: Vec<f32>,
    buffer_mask: usize,
    max_delay_frames: usize,
    write_pos: usize,
}

impl<const CHANNELS: usize> DelayLine<CHANNELS> {
    /// Create a new delay buffer with the given max delay time in sample frames.
    pub fn new(max_delay_frames: usize) -> Self {
        let (buffer, buffer_mask) = if max_delay_frames > 0 {
            // one extra frame for the interpolation
            let buffer_frames = (max_delay_frames + 1).next_power_of_two();
            (vec![0.0; buffer_frames * CHANNELS], buffer_frames - 1)
        } else {
            (Vec::new(), 0)
        };
        let write_pos = 0;
        Self {
            buffer,
            buffer_mask,
            max_delay_frames,
            write_pos,
        }
    }

    /// Maximum supported delay in sample frames.
    pub fn max_delay_frames(&self) -> usize {
        self.max_delay_frames
    }

    /// Reset the delay buffer and write position.
    pub fn flush(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Read the delayed frame at the given per channel delay positions, then write the input
    /// frame. Delays are clamped into `[0, max_delay_frames]`.
    pub fn process_sample(
        &mut self,
        input: [f32; CHANNELS],
        delay_frames: [f32; CHANNELS],
    ) -> [f32; CHANNELS] {
        if self.buffer.is_empty() {
            return input;
        }
        let max_delay = self.max_delay_frames as f32;

        let mut output = [0.0; CHANNELS];
        for ch in 0..CHANNELS {
            let delay = delay_frames[ch].clamp(0.0, max_delay);
            let read_pos = self.write_pos as f32 - delay;

            let read_pos_floor = read_pos.floor();
            let fraction = read_pos - read_pos_floor;

            // negative positions wrap around via the pow2 mask
            let index1 = read_pos_floor as isize as usize & self.buffer_mask;
            let index2 = (index1 + 1) & self.buffer_mask;

            let val1 = self.buffer[index1 * CHANNELS + ch];
            let val2 = self.buffer[index2 * CHANNELS + ch];
            output[ch] = val1 + (val2 - val1) * fraction;
        }

        let write_sample_index = self.write_pos * CHANNELS;
        self.buffer[write_sample_index..write_sample_index + CHANNELS].copy_from_slice(&input);
        self.write_pos = (self.write_pos + 1) & self.buffer_mask;

        output
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_delay() {
        let mut delay = DelayLine::<2>::new(4);
        let mut outputs = Vec::new();
        for i in 1..=8 {
            let input = [i as f32, -(i as f32)];
            outputs.push(delay.process_sample(input, [2.0, 3.0]));
        }
        // reads happen before writes: a delay of N frames returns the input from N frames ago
        assert_eq!(outputs[0], [0.0, 0.0]);
        assert_eq!(outputs[2][0], 1.0);
        assert_eq!(outputs[3][1], -1.0);
        assert_eq!(outputs[7], [6.0, -5.0]);
    }

    #[test]
    fn fractional_delay() {
        let mut delay = DelayLine::<1>::new(8);
        for i in 0..8 {
            delay.process_sample([i as f32], [1.0]);
        }
        // last written: 7, frame before 6
        let output = delay.process_sample([8.0], [1.5]);
        assert!((output[0] - 6.5).abs() < 1e-6);
    }

    #[test]
    fn clamps_delay() {
        let mut delay = DelayLine::<1>::new(4);
        for i in 0..16 {
            let output = delay.process_sample([i as f32], [100.0]);
            assert!(output[0].is_finite());
        }
        delay.flush();
        assert_eq!(delay.process_sample([1.0], [1.0]), [0.0]);
    }
}
