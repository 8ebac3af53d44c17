/// A fixed-length block of planar audio samples.
///
/// Each pipeline stage consumes a chunk and returns a new one; chunks are
/// never mutated in place once handed off.
#[derive(Clone, Debug)]
pub struct AudioChunk {
    /// One sample vector per channel, all the same length.
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(
            channels.windows(2).all(|w| w[0].len() == w[1].len()),
            "all channels must have the same length"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![samples],
            sample_rate,
        }
    }

    /// All-zero chunk with the given geometry.
    pub fn silent(channel_count: usize, len: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; len]; channel_count],
            sample_rate,
        }
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() || self.len() == 0
    }

    /// Average of all channels, for single-trace analysis.
    pub fn mono_mix(&self) -> Vec<f32> {
        let n = self.len();
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let norm = 1.0 / self.channels.len() as f32;
        let mut mix = vec![0.0f32; n];
        for channel in &self.channels {
            for (m, &s) in mix.iter_mut().zip(channel.iter()) {
                *m += s;
            }
        }
        for m in mix.iter_mut() {
            *m *= norm;
        }
        mix
    }
}
