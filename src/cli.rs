use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use bandeq::dsp::offline::MaskShape;

#[derive(Parser, Debug)]
#[command(name = "bandeq", about = "5-band FFT equalizer and spectrum analyzer for audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// Output WAV file (default: derived from the input name)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Per-band gains in dB for the multi-band engine, one per band,
    /// e.g. --gains 6,0,-3,0,3
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub gains: Vec<f32>,

    /// Filter type for single-filter mode
    #[arg(short = 't', long = "type", value_enum, default_value_t = FilterKind::Bandpass)]
    pub filter: FilterKind,

    /// Center frequency in Hz
    #[arg(short, long, default_value_t = 100.0)]
    pub freq: f32,

    /// Bandwidth in Hz (band-pass filter)
    #[arg(short, long, default_value_t = 50.0)]
    pub bandwidth: f32,

    /// Gain in dB (parametric filter)
    #[arg(short, long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub gain: f32,

    /// Q factor (parametric filter)
    #[arg(short, long, default_value_t = 1.0)]
    pub q: f32,

    /// Band mask shape for band-pass filtering
    #[arg(long, value_enum, default_value_t = ShapeArg::Sinc)]
    pub shape: ShapeArg,

    /// Chunk size for the multi-band engine
    #[arg(long, default_value_t = 1024)]
    pub chunk_size: usize,

    /// FIR length of the band filters (forced odd)
    #[arg(long, default_value_t = 255)]
    pub taps: usize,

    /// Output bit depth (16 or 24)
    #[arg(long, default_value_t = 16)]
    pub bit_depth: u16,

    /// Print spectrum analyzer bars while processing
    #[arg(long)]
    pub spectrum: bool,

    /// List the equalizer bands and exit
    #[arg(long)]
    pub list_bands: bool,

    /// Config file path (default: bandeq.toml, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Bandpass,
    Parametric,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeArg {
    Sinc,
    Gaussian,
    Rectangular,
}

impl From<ShapeArg> for MaskShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Sinc => MaskShape::Sinc,
            ShapeArg::Gaussian => MaskShape::Gaussian,
            ShapeArg::Rectangular => MaskShape::Rectangular,
        }
    }
}
