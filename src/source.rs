//! Read-only audio sources which grains are read from.

use assume::assume;

use crate::{utils::buffer::interleaved_to_planar, Error};

// -------------------------------------------------------------------------------------------------

/// An immutable, planar multichannel sample buffer plus its native sample rate.
///
/// Sources are shared read-only across all voices of an engine and get published to the audio
/// thread via [`GranularEngine::set_audio_source`](crate::GranularEngine::set_audio_source).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    channels: Vec<Box<[f32]>>,
    frame_count: usize,
    sample_rate: u32,
}

impl AudioSource {
    /// An empty source without channels and frames. Renders silence.
    pub fn empty() -> Self {
        Self {
            channels: Vec::new(),
            frame_count: 0,
            sample_rate: 44100,
        }
    }

    /// Create a new source from planar channel buffers, which all must have the same length.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::SourceError("sample rate must be > 0".to_string()));
        }
        if channels.is_empty() {
            return Err(Error::SourceError("need at least one channel".to_string()));
        }
        let frame_count = channels[0].len();
        if channels.iter().any(|c| c.len() != frame_count) {
            return Err(Error::SourceError("all channels must have the same length".to_string()));
        }
        if channels.iter().flatten().any(|s| !s.is_finite()) {
            return Err(Error::SourceError("source contains NaN or infinite samples".to_string()));
        }
        let channels = channels
            .into_iter()
            .map(Vec::into_boxed_slice)
            .collect::<Vec<_>>();
        Ok(Self {
            channels,
            frame_count,
            sample_rate,
        })
    }

    /// Create a new source from an interleaved buffer with the given channel layout.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, Error> {
        if channel_count == 0 {
            return Err(Error::SourceError("need at least one channel".to_string()));
        }
        if samples.len() % channel_count != 0 {
            return Err(Error::SourceError(format!(
                "interleaved buffer length {} is not a multiple of the channel count {}",
                samples.len(),
                channel_count
            )));
        }
        Self::from_planar(interleaved_to_planar(samples, channel_count), sample_rate)
    }

    /// The source's native sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames in each channel.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// True when there's nothing to play.
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0 || self.channels.is_empty()
    }

    /// Access a single channel's samples.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| &c[..])
    }
}

impl Default for AudioSource {
    fn default() -> Self {
        Self::empty()
    }
}

// -------------------------------------------------------------------------------------------------

/// Reads fractional positions from an [`AudioSource`] with linear interpolation.
#[derive(Debug, Clone, Copy)]
pub struct SampleInterpolator<'a> {
    source: &'a AudioSource,
}

impl<'a> SampleInterpolator<'a> {
    pub fn new(source: &'a AudioSource) -> Self {
        Self { source }
    }

    /// Interpolated sample of the given channel at a fractional frame position.
    /// Positions outside of the source and invalid channels read as silence.
    #[inline]
    pub fn sample(&self, channel: usize, position: f32) -> f32 {
        let Some(samples) = self.source.channels.get(channel) else {
            return 0.0;
        };
        if !(position >= 0.0) {
            // negative or NaN
            return 0.0;
        }
        let len = samples.len();
        let index0 = position as usize;
        if index0 >= len {
            return 0.0;
        }
        let index1 = (index0 + 1).min(len - 1);
        let fraction = position - index0 as f32;

        assume!(unsafe: index0 < len);
        assume!(unsafe: index1 < len);
        let value0 = samples[index0];
        let value1 = samples[index1];
        value0 + (value1 - value0) * fraction
    }

    /// Interpolated stereo frame at a fractional frame position. Mono sources are read into
    /// both channels.
    #[inline]
    pub fn frame(&self, position: f32) -> [f32; 2] {
        let left = self.sample(0, position);
        let right = if self.source.channel_count() > 1 {
            self.sample(1, position)
        } else {
            left
        };
        [left, right]
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() -> Result<(), Box<dyn std::error::Error>> {
        let source = AudioSource::from_interleaved(&[1.0, -1.0, 2.0, -2.0], 2, 48000)?;
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.frame_count(), 2);
        assert_eq!(source.sample_rate(), 48000);
        assert_eq!(source.channel(1), Some(&[-1.0, -2.0][..]));
        assert!(source.channel(2).is_none());

        assert!(AudioSource::from_planar(vec![], 44100).is_err());
        assert!(AudioSource::from_planar(vec![vec![0.0]], 0).is_err());
        assert!(AudioSource::from_planar(vec![vec![0.0], vec![]], 44100).is_err());
        assert!(AudioSource::from_planar(vec![vec![f32::NAN]], 44100).is_err());
        assert!(AudioSource::from_interleaved(&[0.0; 3], 2, 44100).is_err());

        assert!(AudioSource::empty().is_empty());
        assert!(AudioSource::from_planar(vec![vec![]], 44100)?.is_empty());
        Ok(())
    }

    #[test]
    fn interpolation() -> Result<(), Box<dyn std::error::Error>> {
        let source = AudioSource::from_planar(vec![vec![0.0, 1.0, 3.0]], 44100)?;
        let interpolator = SampleInterpolator::new(&source);
        assert_eq!(interpolator.sample(0, 0.0), 0.0);
        assert_eq!(interpolator.sample(0, 0.5), 0.5);
        assert_eq!(interpolator.sample(0, 1.25), 1.5);
        // last frame holds its value
        assert_eq!(interpolator.sample(0, 2.0), 3.0);
        assert_eq!(interpolator.sample(0, 2.5), 3.0);
        // out of range
        assert_eq!(interpolator.sample(0, 3.0), 0.0);
        assert_eq!(interpolator.sample(0, -1.0), 0.0);
        assert_eq!(interpolator.sample(0, f32::NAN), 0.0);
        assert_eq!(interpolator.sample(1, 0.5), 0.0);
        // mono sources feed both channels
        assert_eq!(interpolator.frame(0.5), [0.5, 0.5]);
        Ok(())
    }
}
