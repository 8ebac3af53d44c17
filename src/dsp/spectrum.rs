use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::chunk::AudioChunk;
use crate::error::{EqError, Result};

/// Display floor/ceiling for level normalization, in dBFS.
const DISPLAY_RANGE_DB: f32 = 80.0;

/// Analyzer tuning. Out-of-range values are clamped at construction with
/// a warning.
#[derive(Clone, Copy, Debug)]
pub struct AnalyzerConfig {
    /// Number of log-spaced bands, at least 1.
    pub bands: usize,
    /// Lower edge of the first band in Hz; must sit below Nyquist.
    pub min_frequency: f32,
    /// Level EMA factor in [0, 1): 0 disables smoothing, values near 1
    /// respond slowly.
    pub level_smoothing: f32,
    /// Per-call peak decay factor in [0, 1): 0 makes peaks follow levels,
    /// values near 1 hold peaks longer. 0.95 keeps a peak visible for
    /// roughly a second at a 30 Hz analysis rate.
    pub peak_decay: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bands: 10,
            min_frequency: 20.0,
            level_smoothing: 0.7,
            peak_decay: 0.95,
        }
    }
}

/// One analysis result: normalized levels and held peaks per band, both
/// in [0, 1]. Peaks are never below the level they were produced with.
#[derive(Clone, Debug)]
pub struct SpectrumFrame {
    pub levels: Vec<f32>,
    pub peaks: Vec<f32>,
}

/// Log-spaced bar-spectrum analyzer.
///
/// Band edges are geometrically spaced from `min_frequency` up to
/// Nyquist: `edge_i = min * (nyquist / min)^(i / bands)`. Levels are
/// smoothed with an exponential moving average; peaks rise instantly and
/// decay gradually. The peak state is the only state carried between
/// calls.
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    config: AnalyzerConfig,
    edges: Vec<f32>,
    levels: Vec<f32>,
    peaks: Vec<f32>,
    planner: FftPlanner<f32>,
    window: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32, config: AnalyzerConfig) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let mut config = config;
        config.bands = config.bands.max(1);
        if !(config.min_frequency > 0.0 && config.min_frequency < nyquist) {
            log::warn!(
                "analyzer min frequency {} Hz out of range, using 20 Hz",
                config.min_frequency
            );
            config.min_frequency = 20.0;
        }
        for (name, value) in [
            ("level_smoothing", &mut config.level_smoothing),
            ("peak_decay", &mut config.peak_decay),
        ] {
            if !(*value >= 0.0 && *value < 1.0) {
                log::warn!("analyzer {} {} outside [0, 1), clamping", name, value);
                *value = if value.is_finite() {
                    value.clamp(0.0, 0.999)
                } else {
                    0.0
                };
            }
        }

        let ratio = nyquist / config.min_frequency;
        let edges = (0..=config.bands)
            .map(|i| config.min_frequency * ratio.powf(i as f32 / config.bands as f32))
            .collect();

        Self {
            sample_rate,
            edges,
            levels: vec![0.0; config.bands],
            peaks: vec![0.0; config.bands],
            planner: FftPlanner::new(),
            window: Vec::new(),
            config,
        }
    }

    /// Windowed magnitude spectrum of the chunk, aggregated into the
    /// analyzer's bands.
    ///
    /// Silence yields all-zero levels and decaying peaks; magnitudes are
    /// floored before the dB conversion so normalization can never produce
    /// NaN.
    pub fn analyze(&mut self, chunk: &AudioChunk) -> Result<SpectrumFrame> {
        if chunk.is_empty() {
            return Err(EqError::EmptyChunk);
        }

        let samples = chunk.mono_mix();
        let n = samples.len();

        if self.window.len() != n {
            self.window = hamming_window(n);
        }

        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        // Amplitude spectrum in dBFS (2/N restores sine amplitude)
        let half = (n / 2).max(1);
        let amplitude_scale = 2.0 / n as f32;
        let magnitude_db: Vec<f32> = buffer[..half]
            .iter()
            .map(|c| 20.0 * (c.norm() * amplitude_scale + 1e-10).log10())
            .collect();

        let bin_width = self.sample_rate as f32 / n as f32;

        for band in 0..self.config.bands {
            let (low, high) = (self.edges[band], self.edges[band + 1]);
            let mut sum = 0.0;
            let mut count = 0usize;
            for (k, &db) in magnitude_db.iter().enumerate() {
                let f = k as f32 * bin_width;
                if f >= low && f < high {
                    sum += db;
                    count += 1;
                }
            }

            let new_level = if count > 0 {
                let mean_db = sum / count as f32;
                ((mean_db + DISPLAY_RANGE_DB) / DISPLAY_RANGE_DB).clamp(0.0, 1.0)
            } else {
                0.0
            };

            let s = self.config.level_smoothing;
            self.levels[band] = s * self.levels[band] + (1.0 - s) * new_level;
            self.peaks[band] = (self.peaks[band] * self.config.peak_decay).max(self.levels[band]);
        }

        Ok(SpectrumFrame {
            levels: self.levels.clone(),
            peaks: self.peaks.clone(),
        })
    }

    /// Labeled center frequency of each band (geometric mean of its
    /// edges), for the rendering side.
    pub fn band_centers(&self) -> Vec<f32> {
        self.edges
            .windows(2)
            .map(|e| (e[0] * e[1]).sqrt())
            .collect()
    }

    pub fn band_edges(&self) -> &[f32] {
        &self.edges
    }

    pub fn band_count(&self) -> usize {
        self.config.bands
    }

    /// Forget all level and peak state.
    pub fn reset(&mut self) {
        self.levels.fill(0.0);
        self.peaks.fill(0.0);
    }
}

fn hamming_window(len: usize) -> Vec<f32> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|i| {
            0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32).cos()
        })
        .collect()
}
