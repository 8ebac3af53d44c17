use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::audio::chunk::AudioChunk;
use crate::dsp::filter;
use crate::error::{EqError, Result};

/// The five musically spaced bands of the default equalizer.
pub const DEFAULT_BAND_CENTERS: [f32; 5] = [100.0, 330.0, 1000.0, 3300.0, 10000.0];

struct BankBand {
    center: f32,
    low: f32,
    high: f32,
    /// Forward FFT of the zero-padded band FIR.
    spectrum: Vec<Complex<f32>>,
    /// Overlap-add tail carried between chunks, one buffer per channel.
    overlap: Vec<Vec<f32>>,
}

/// A fixed set of band-pass filters applied per chunk in the frequency
/// domain.
///
/// Each band is a Hamming-windowed sinc FIR of the same odd length,
/// transformed once at build time. `apply` performs exact linear
/// convolution via overlap-add with per-band, per-channel tail-carry, so
/// processing a signal chunk by chunk and processing it whole produce
/// identical output. All bands share the same linear phase; the bank's
/// constant group delay is reported by [`FilterBank::latency`].
///
/// A bank is immutable once built. To change the sample rate or band
/// geometry, build a new bank instead of mutating one a processing loop
/// might be reading.
pub struct FilterBank {
    sample_rate: u32,
    channels: usize,
    chunk_size: usize,
    fft_size: usize,
    taps: usize,
    bands: Vec<BankBand>,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
}

/// Derive `[low, high]` cutoffs for each band center.
///
/// With an explicit bandwidth each band spans `center +/- bandwidth/2`.
/// Without one, cutoffs sit at the midpoints between adjacent centers,
/// the first band reaching down to 0 Hz and the last up to Nyquist, so
/// the bands tile the whole spectrum and sum to unity at flat gains.
pub fn derive_edges(
    centers: &[f32],
    bandwidth: Option<f32>,
    nyquist: f32,
) -> Result<Vec<(f32, f32)>> {
    if centers.is_empty() {
        return Err(EqError::BankConfig(
            "at least one band center is required".into(),
        ));
    }
    if centers[0] <= 0.0 {
        return Err(EqError::BankConfig(
            "band centers must be positive".into(),
        ));
    }
    if centers.windows(2).any(|w| w[0] >= w[1]) {
        return Err(EqError::BankConfig(
            "band centers must be strictly increasing".into(),
        ));
    }
    let last = *centers.last().unwrap();
    if last >= nyquist {
        return Err(EqError::BankConfig(format!(
            "band center {} Hz is at or above Nyquist ({} Hz)",
            last, nyquist
        )));
    }

    match bandwidth {
        Some(bw) => {
            if bw <= 0.0 {
                return Err(EqError::BankConfig(format!(
                    "bandwidth {} Hz collapses bands to non-positive width",
                    bw
                )));
            }
            centers
                .iter()
                .map(|&c| {
                    let low = (c - bw / 2.0).max(0.0);
                    let high = c + bw / 2.0;
                    if high >= nyquist {
                        return Err(EqError::BankConfig(format!(
                            "band at {} Hz overlaps Nyquist ({} Hz)",
                            c, nyquist
                        )));
                    }
                    Ok((low, high))
                })
                .collect()
        }
        None => Ok((0..centers.len())
            .map(|i| {
                let low = if i == 0 {
                    0.0
                } else {
                    (centers[i - 1] + centers[i]) / 2.0
                };
                let high = if i == centers.len() - 1 {
                    nyquist
                } else {
                    (centers[i] + centers[i + 1]) / 2.0
                };
                (low, high)
            })
            .collect()),
    }
}

impl FilterBank {
    pub fn build(
        sample_rate: u32,
        channels: usize,
        centers: &[f32],
        bandwidth: Option<f32>,
        chunk_size: usize,
        taps: usize,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(EqError::BankConfig("channel count must be at least 1".into()));
        }
        if chunk_size == 0 {
            return Err(EqError::BankConfig("chunk size must be at least 1".into()));
        }

        let nyquist = sample_rate as f32 / 2.0;
        let edges = derive_edges(centers, bandwidth, nyquist)?;
        let taps = filter::force_odd(taps);
        let fft_size = (chunk_size + taps - 1).next_power_of_two();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        let bands = centers
            .iter()
            .zip(edges)
            .map(|(&center, (low, high))| {
                let fir = filter::fir_from_edges(low as f64, high as f64, sample_rate, taps);
                let mut spectrum = vec![Complex::new(0.0f32, 0.0); fft_size];
                for (slot, &tap) in spectrum.iter_mut().zip(fir.iter()) {
                    slot.re = tap;
                }
                fft.process(&mut spectrum);
                BankBand {
                    center,
                    low,
                    high,
                    spectrum,
                    overlap: vec![vec![0.0; fft_size - chunk_size]; channels],
                }
            })
            .collect();

        log::info!(
            "Filter bank: {} bands, {} taps, FFT size {}, latency {} samples",
            centers.len(),
            taps,
            fft_size,
            (taps - 1) / 2
        );

        Ok(Self {
            sample_rate,
            channels,
            chunk_size,
            fft_size,
            taps,
            bands,
            fft,
            ifft,
        })
    }

    /// Filter one chunk through every band.
    ///
    /// Returns one chunk per band, in band order, length-aligned with the
    /// input. Validation happens before any tail-carry state is touched,
    /// so a rejected chunk leaves the bank ready for the next valid one.
    pub fn apply(&mut self, chunk: &AudioChunk) -> Result<Vec<AudioChunk>> {
        if chunk.is_empty() {
            return Err(EqError::EmptyChunk);
        }
        if chunk.channel_count() != self.channels {
            return Err(EqError::ChannelMismatch {
                expected: self.channels,
                got: chunk.channel_count(),
            });
        }
        if chunk.len() != self.chunk_size {
            return Err(EqError::ChunkSize {
                expected: self.chunk_size,
                got: chunk.len(),
            });
        }
        if chunk.sample_rate != self.sample_rate {
            return Err(EqError::BankConfig(format!(
                "chunk sample rate {} Hz differs from bank sample rate {} Hz",
                chunk.sample_rate, self.sample_rate
            )));
        }

        let scale = 1.0 / self.fft_size as f32;
        let mut outputs: Vec<AudioChunk> = (0..self.bands.len())
            .map(|_| AudioChunk::silent(self.channels, self.chunk_size, self.sample_rate))
            .collect();

        let mut input_spectrum = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        let mut band_buf = vec![Complex::new(0.0f32, 0.0); self.fft_size];

        for ch in 0..self.channels {
            // One forward transform of the zero-padded chunk per channel
            for slot in input_spectrum.iter_mut() {
                *slot = Complex::new(0.0, 0.0);
            }
            for (slot, &sample) in input_spectrum.iter_mut().zip(chunk.channels[ch].iter()) {
                slot.re = sample;
            }
            self.fft.process(&mut input_spectrum);

            for (b, band) in self.bands.iter_mut().enumerate() {
                for ((y, &x), &h) in band_buf
                    .iter_mut()
                    .zip(input_spectrum.iter())
                    .zip(band.spectrum.iter())
                {
                    *y = x * h;
                }
                self.ifft.process(&mut band_buf);

                let olap = &mut band.overlap[ch];
                let out = &mut outputs[b].channels[ch];
                for n in 0..self.chunk_size {
                    let carried = if n < olap.len() { olap[n] } else { 0.0 };
                    out[n] = band_buf[n].re * scale + carried;
                }
                // Slide the tail: consume the emitted part, append the new one
                let olen = olap.len();
                for n in 0..olen {
                    let carried = if n + self.chunk_size < olen {
                        olap[n + self.chunk_size]
                    } else {
                        0.0
                    };
                    olap[n] = band_buf[self.chunk_size + n].re * scale + carried;
                }
            }
        }

        Ok(outputs)
    }

    /// Constant group delay in samples, identical for every band.
    pub fn latency(&self) -> usize {
        (self.taps - 1) / 2
    }

    /// Clear all tail-carry state, as if no chunk had been processed.
    pub fn reset(&mut self) {
        for band in self.bands.iter_mut() {
            for olap in band.overlap.iter_mut() {
                olap.fill(0.0);
            }
        }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn centers(&self) -> Vec<f32> {
        self.bands.iter().map(|b| b.center).collect()
    }

    /// `(low, high)` cutoffs per band, in band order.
    pub fn band_edges(&self) -> Vec<(f32, f32)> {
        self.bands.iter().map(|b| (b.low, b.high)).collect()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: u32 = 44100;

    fn sine_mix(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / FS as f32;
                0.4 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                    + 0.3 * (2.0 * std::f32::consts::PI * 1000.0 * t).sin()
                    + 0.2 * (2.0 * std::f32::consts::PI * 5200.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn midpoint_edges_tile_the_spectrum() {
        let edges = derive_edges(&DEFAULT_BAND_CENTERS, None, FS as f32 / 2.0).unwrap();
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[0].0, 0.0);
        assert_eq!(edges[4].1, FS as f32 / 2.0);
        for pair in edges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "adjacent bands must share an edge");
        }
        assert_eq!(edges[1], (215.0, 665.0));
    }

    #[test]
    fn build_rejects_degenerate_geometry() {
        // Center above Nyquist
        assert!(FilterBank::build(FS, 1, &[100.0, 30000.0], None, 512, 255).is_err());
        // Band overlapping Nyquist via bandwidth
        assert!(FilterBank::build(FS, 1, &[22000.0], Some(1000.0), 512, 255).is_err());
        // Non-positive width
        assert!(FilterBank::build(FS, 1, &[1000.0], Some(0.0), 512, 255).is_err());
        // Unsorted centers
        assert!(FilterBank::build(FS, 1, &[1000.0, 330.0], None, 512, 255).is_err());
        // No bands at all
        assert!(FilterBank::build(FS, 1, &[], None, 512, 255).is_err());
    }

    #[test]
    fn bank_reports_its_geometry() {
        let bank = FilterBank::build(FS, 2, &DEFAULT_BAND_CENTERS, None, 512, 255).unwrap();
        assert_eq!(bank.band_count(), 5);
        assert_eq!(bank.channel_count(), 2);
        assert_eq!(bank.chunk_size(), 512);
        assert_eq!(bank.sample_rate(), FS);
        assert_eq!(bank.centers(), DEFAULT_BAND_CENTERS.to_vec());
        assert_eq!(bank.band_edges()[0].0, 0.0);
        assert_eq!(bank.band_edges()[4].1, FS as f32 / 2.0);
    }

    #[test]
    fn latency_is_half_the_odd_tap_count() {
        let bank = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 512, 255).unwrap();
        assert_eq!(bank.latency(), 127);
        // Even tap counts are forced odd first
        let bank = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 512, 300).unwrap();
        assert_eq!(bank.latency(), 150);
    }

    #[test]
    fn flat_band_sum_is_a_delayed_impulse() {
        let mut bank = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 512, 255).unwrap();
        let latency = bank.latency();

        let mut impulse = AudioChunk::silent(1, 512, FS);
        impulse.channels[0][0] = 1.0;

        let mut summed = Vec::new();
        for chunk in [impulse, AudioChunk::silent(1, 512, FS)] {
            let bands = bank.apply(&chunk).unwrap();
            for n in 0..512 {
                let s: f32 = bands.iter().map(|b| b.channels[0][n]).sum();
                summed.push(s);
            }
        }

        // The tiled band FIRs telescope to a pure delta at the center tap
        for (n, &s) in summed.iter().enumerate() {
            let expected = if n == latency { 1.0 } else { 0.0 };
            assert!(
                (s - expected).abs() < 1e-3,
                "sample {} was {}, expected {}",
                n,
                s,
                expected
            );
        }
    }

    #[test]
    fn chunked_processing_matches_single_pass() {
        let signal = sine_mix(2048);

        let mut chunked = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 256, 255).unwrap();
        let mut whole = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 2048, 255).unwrap();

        let mut per_band: Vec<Vec<f32>> = vec![Vec::new(); 5];
        for piece in signal.chunks(256) {
            let chunk = AudioChunk::from_mono(piece.to_vec(), FS);
            let bands = chunked.apply(&chunk).unwrap();
            for (b, band) in bands.iter().enumerate() {
                per_band[b].extend_from_slice(&band.channels[0]);
            }
        }

        let reference = whole
            .apply(&AudioChunk::from_mono(signal.clone(), FS))
            .unwrap();

        for b in 0..5 {
            for n in 0..2048 {
                let diff = (per_band[b][n] - reference[b].channels[0][n]).abs();
                assert!(
                    diff < 1e-3,
                    "band {} sample {} differs by {}",
                    b,
                    n,
                    diff
                );
            }
        }
    }

    #[test]
    fn filter_longer_than_chunk_does_not_corrupt_neighbors() {
        // 255 taps against 64-sample chunks: the tail spans four chunks
        let signal = sine_mix(1024);

        let mut chunked = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 64, 255).unwrap();
        let mut whole = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 1024, 255).unwrap();

        let mut out = Vec::new();
        for piece in signal.chunks(64) {
            let bands = chunked
                .apply(&AudioChunk::from_mono(piece.to_vec(), FS))
                .unwrap();
            out.extend_from_slice(&bands[2].channels[0]);
        }

        let reference = whole
            .apply(&AudioChunk::from_mono(signal.clone(), FS))
            .unwrap();

        for n in 0..1024 {
            let diff = (out[n] - reference[2].channels[0][n]).abs();
            assert!(diff < 1e-3, "sample {} differs by {}", n, diff);
        }
    }

    #[test]
    fn rejected_chunk_leaves_tail_carry_intact() {
        let signal = sine_mix(1024);
        let first = AudioChunk::from_mono(signal[..512].to_vec(), FS);
        let second = AudioChunk::from_mono(signal[512..].to_vec(), FS);

        let mut disturbed = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 512, 255).unwrap();
        let mut control = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 512, 255).unwrap();

        let d1 = disturbed.apply(&first).unwrap();
        // Wrong length, wrong channel count, empty: all rejected up front
        assert!(matches!(
            disturbed.apply(&AudioChunk::from_mono(vec![0.0; 100], FS)),
            Err(EqError::ChunkSize { .. })
        ));
        assert!(matches!(
            disturbed.apply(&AudioChunk::silent(2, 512, FS)),
            Err(EqError::ChannelMismatch { .. })
        ));
        assert!(matches!(
            disturbed.apply(&AudioChunk::new(vec![], FS)),
            Err(EqError::EmptyChunk)
        ));
        let d2 = disturbed.apply(&second).unwrap();

        let c1 = control.apply(&first).unwrap();
        let c2 = control.apply(&second).unwrap();

        for b in 0..5 {
            assert_eq!(d1[b].channels[0], c1[b].channels[0]);
            assert_eq!(d2[b].channels[0], c2[b].channels[0]);
        }
    }

    #[test]
    fn reset_clears_history() {
        let mut bank = FilterBank::build(FS, 1, &DEFAULT_BAND_CENTERS, None, 512, 255).unwrap();
        let chunk = AudioChunk::from_mono(sine_mix(512), FS);

        let fresh = bank.apply(&chunk).unwrap();
        bank.reset();
        let after_reset = bank.apply(&chunk).unwrap();

        for b in 0..5 {
            assert_eq!(fresh[b].channels[0], after_reset[b].channels[0]);
        }
    }
}
