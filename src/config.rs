use serde::Deserialize;
use std::path::PathBuf;

use crate::dsp::bank::DEFAULT_BAND_CENTERS;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_taps")]
    pub taps: usize,
    #[serde(default = "default_gain_min_db")]
    pub gain_min_db: f32,
    #[serde(default = "default_gain_max_db")]
    pub gain_max_db: f32,
    #[serde(default = "default_band_centers")]
    pub band_centers: Vec<f32>,
    /// Per-band width in Hz. Omitted = contiguous bands with cutoffs at
    /// the midpoints between adjacent centers.
    #[serde(default)]
    pub bandwidth: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_analyzer_bands")]
    pub bands: usize,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: f32,
    #[serde(default = "default_level_smoothing")]
    pub level_smoothing: f32,
    #[serde(default = "default_peak_decay")]
    pub peak_decay: f32,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            taps: default_taps(),
            gain_min_db: default_gain_min_db(),
            gain_max_db: default_gain_max_db(),
            band_centers: default_band_centers(),
            bandwidth: None,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bands: default_analyzer_bands(),
            min_frequency: default_min_frequency(),
            level_smoothing: default_level_smoothing(),
            peak_decay: default_peak_decay(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bit_depth: default_bit_depth(),
        }
    }
}

fn default_chunk_size() -> usize { 1024 }
fn default_taps() -> usize { 255 }
fn default_gain_min_db() -> f32 { -30.0 }
fn default_gain_max_db() -> f32 { 12.0 }
fn default_band_centers() -> Vec<f32> { DEFAULT_BAND_CENTERS.to_vec() }
fn default_analyzer_bands() -> usize { 10 }
fn default_min_frequency() -> f32 { 20.0 }
fn default_level_smoothing() -> f32 { 0.7 }
fn default_peak_decay() -> f32 { 0.95 }
fn default_bit_depth() -> u16 { 16 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
