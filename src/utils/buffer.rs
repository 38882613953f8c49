use std::slice::ChunksExactMut;

// -------------------------------------------------------------------------------------------------

/// Frame-wise access to interleaved audio buffers.
pub trait InterleavedBufferMut {
    /// Iterate over mutable frames of the given channel layout. Trailing samples which do not
    /// form a complete frame are skipped.
    fn frames_mut(&mut self, channel_count: usize) -> ChunksExactMut<'_, f32>;
}

impl InterleavedBufferMut for [f32] {
    #[inline]
    fn frames_mut(&mut self, channel_count: usize) -> ChunksExactMut<'_, f32> {
        debug_assert!(channel_count > 0, "Need at least one channel");
        self.chunks_exact_mut(channel_count.max(1))
    }
}

// -------------------------------------------------------------------------------------------------

/// Split an interleaved buffer with the given channel layout into planar channel buffers.
/// Trailing samples which do not form a complete frame are ignored.
pub fn interleaved_to_planar(interleaved: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    if channel_count == 0 {
        return Vec::new();
    }
    let frame_count = interleaved.len() / channel_count;
    match channel_count {
        1 => vec![interleaved[..frame_count].to_vec()],
        2 => {
            let mut left = Vec::with_capacity(frame_count);
            let mut right = Vec::with_capacity(frame_count);
            for frame in interleaved.chunks_exact(2) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
            vec![left, right]
        }
        _ => {
            let mut planar = vec![Vec::with_capacity(frame_count); channel_count];
            for frame in interleaved.chunks_exact(channel_count) {
                for (channel, value) in planar.iter_mut().zip(frame) {
                    channel.push(*value);
                }
            }
            planar
        }
    }
}

// -------------------------------------------------------------------------------------------------
