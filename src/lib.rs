//! bandeq - chunk-wise band-splitting equalizer and spectrum analyzer.
//!
//! The core splits audio into a small bank of frequency bands via
//! frequency-domain FIR filtering, applies an independently adjustable
//! gain per band, recombines the bands and feeds a log-spaced bar
//! spectrum for visualization. An offline path shares the same filter
//! mathematics for single-shot file processing.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
