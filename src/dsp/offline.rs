use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::dsp::filter;
use crate::error::{EqError, Result};

/// Band-selection shape for the offline band-pass path.
///
/// `Sinc` designs a windowed-sinc FIR and uses the magnitude of its
/// transform (sharp edges, controlled ripple); `Gaussian` and
/// `Rectangular` are defined directly in the frequency domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskShape {
    Sinc,
    Gaussian,
    Rectangular,
}

/// Single-shot band-pass over a whole signal via full-signal FFT
/// convolution. Zero-phase: the output is not delayed relative to the
/// input.
pub fn apply_bandpass(
    samples: &[f32],
    sample_rate: u32,
    f_low: f32,
    f_high: f32,
    shape: MaskShape,
) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Err(EqError::EmptyChunk);
    }
    let n = samples.len();
    let mask = match shape {
        MaskShape::Gaussian => filter::gaussian_mask(f_low, f_high, n, sample_rate)?,
        MaskShape::Rectangular => filter::rectangular_mask(f_low, f_high, n, sample_rate)?,
        MaskShape::Sinc => sinc_mask(f_low, f_high, n, sample_rate)?,
    };
    Ok(apply_mask(samples, &mask))
}

/// Single-shot parametric boost/cut over a whole signal.
///
/// `gain_db == 0` reproduces the input exactly. The output is normalized
/// down if the boost pushes any sample past full scale.
pub fn apply_parametric(
    samples: &[f32],
    sample_rate: u32,
    f_center: f32,
    q: f32,
    gain_db: f32,
) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Err(EqError::EmptyChunk);
    }
    let mask = filter::parametric(f_center, q, gain_db, sample_rate, samples.len())?;
    if gain_db == 0.0 {
        return Ok(samples.to_vec());
    }

    let mut out = apply_mask(samples, &mask);

    let peak = out.iter().fold(0.0f32, |a, &s| a.max(s.abs()));
    if peak > 1.0 {
        log::info!("Normalizing output (peak {:.3})", peak);
        for s in out.iter_mut() {
            *s /= peak;
        }
    }
    Ok(out)
}

/// Apply the same single-channel operation to every channel in parallel.
pub fn process_channels<F>(channels: &[Vec<f32>], op: F) -> Result<Vec<Vec<f32>>>
where
    F: Fn(&[f32]) -> Result<Vec<f32>> + Sync,
{
    channels.par_iter().map(|ch| op(ch.as_slice())).collect()
}

/// Zero-phase magnitude mask from a windowed-sinc FIR: the FIR is placed
/// with its center tap at index 0 (negative-time taps wrapped to the end
/// of the buffer) and transformed, and the magnitude is used as the mask.
fn sinc_mask(f_low: f32, f_high: f32, n: usize, sample_rate: u32) -> Result<Vec<f32>> {
    // Length rule of thumb: ~4 periods of the bandwidth, capped by the
    // signal length.
    let bandwidth = (f_high - f_low).max(1.0);
    let mut taps = ((4.0 * sample_rate as f32 / bandwidth) as usize).clamp(3, (n / 2).max(3));
    if taps % 2 == 0 {
        taps += 1;
    }
    if taps > n {
        // Signal too short for a meaningful FIR; hard mask instead
        return filter::rectangular_mask(f_low, f_high, n, sample_rate);
    }

    let ir = filter::bandpass(f_low, f_high, sample_rate, taps)?;
    let m = ir.center();

    let mut buf = vec![Complex::new(0.0f32, 0.0); n];
    for (i, &tap) in ir.taps()[m..].iter().enumerate() {
        buf[i].re = tap;
    }
    for (i, &tap) in ir.taps()[..m].iter().enumerate() {
        buf[n - m + i].re = tap;
    }

    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buf);

    Ok(buf.iter().map(|c| c.norm()).collect())
}

fn apply_mask(samples: &[f32], mask: &[f32]) -> Vec<f32> {
    let n = samples.len();
    let mut planner = FftPlanner::new();

    let mut buf: Vec<Complex<f32>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut buf);

    for (c, &m) in buf.iter_mut().zip(mask.iter()) {
        *c = *c * m;
    }

    planner.plan_fft_inverse(n).process(&mut buf);
    let scale = 1.0 / n as f32;
    buf.iter().map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: u32 = 44100;
    const N: usize = 4096;

    /// Sine locked to an exact FFT bin, so tests see no leakage.
    fn bin_sine(bin: usize, amplitude: f32) -> Vec<f32> {
        (0..N)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / N as f32).sin()
            })
            .collect()
    }

    fn bin_freq(bin: usize) -> f32 {
        bin as f32 * FS as f32 / N as f32
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn parametric_zero_gain_reproduces_the_input() {
        let signal = bin_sine(93, 0.7);
        let out = apply_parametric(&signal, FS, 1000.0, 1.0, 0.0).unwrap();
        assert_eq!(out, signal);
    }

    #[test]
    fn parametric_boost_raises_in_band_energy() {
        let signal = bin_sine(93, 0.3); // ~1001 Hz
        let out = apply_parametric(&signal, FS, 1000.0, 1.0, 6.0).unwrap();
        let ratio = rms(&out) / rms(&signal);
        assert!(
            (ratio - 1.995).abs() < 0.1,
            "boost ratio was {}",
            ratio
        );
    }

    #[test]
    fn parametric_normalizes_instead_of_clipping() {
        let signal = bin_sine(93, 0.9);
        let out = apply_parametric(&signal, FS, 1000.0, 1.0, 12.0).unwrap();
        let peak = out.iter().fold(0.0f32, |a, &s| a.max(s.abs()));
        assert!(peak <= 1.0 + 1e-4, "peak was {}", peak);
    }

    #[test]
    fn rectangular_bandpass_keeps_only_in_band_content() {
        let low = bin_sine(10, 0.5); // ~108 Hz
        let high = bin_sine(400, 0.5); // ~4307 Hz
        let signal: Vec<f32> = low.iter().zip(high.iter()).map(|(a, b)| a + b).collect();

        let out =
            apply_bandpass(&signal, FS, 2000.0, 8000.0, MaskShape::Rectangular).unwrap();

        // The high sine survives untouched, the low one is gone
        for n in 0..N {
            assert!((out[n] - high[n]).abs() < 1e-3, "sample {} off", n);
        }
    }

    #[test]
    fn gaussian_bandpass_attenuates_distant_content() {
        let low = bin_sine(10, 0.5);
        let out = apply_bandpass(&low, FS, 2000.0, 8000.0, MaskShape::Gaussian).unwrap();
        assert!(rms(&out) < 0.3 * rms(&low), "rms ratio {}", rms(&out) / rms(&low));

        let in_band = bin_sine(465, 0.5); // ~5007 Hz, at the band center
        let kept = apply_bandpass(&in_band, FS, 2000.0, 8000.0, MaskShape::Gaussian).unwrap();
        assert!(rms(&kept) > 0.9 * rms(&in_band));
    }

    #[test]
    fn sinc_bandpass_is_zero_phase_in_band() {
        let signal = bin_sine(93, 0.8); // ~1001 Hz, inside [900, 1100]
        let out = apply_bandpass(&signal, FS, 900.0, 1100.0, MaskShape::Sinc).unwrap();

        // Bin-aligned input through a zero-phase mask: same sine, scaled
        // by the (near-unity) passband magnitude, with no time shift
        for n in 0..N {
            assert!(
                (out[n] - signal[n]).abs() < 0.05,
                "sample {} shifted or attenuated: {} vs {}",
                n,
                out[n],
                signal[n]
            );
        }

        let far = bin_sine(400, 0.8); // ~4307 Hz, deep in the stopband
        let rejected = apply_bandpass(&far, FS, 900.0, 1100.0, MaskShape::Sinc).unwrap();
        assert!(rms(&rejected) < 0.02 * rms(&far));
    }

    #[test]
    fn bandpass_validates_edges() {
        let signal = bin_sine(93, 0.5);
        assert!(apply_bandpass(&signal, FS, 0.0, 1000.0, MaskShape::Sinc).is_err());
        assert!(apply_bandpass(&signal, FS, 2000.0, 1000.0, MaskShape::Gaussian).is_err());
        assert!(apply_bandpass(&signal, FS, 100.0, bin_freq(4000), MaskShape::Rectangular).is_err());
    }

    #[test]
    fn empty_signal_is_rejected() {
        assert!(matches!(
            apply_bandpass(&[], FS, 100.0, 200.0, MaskShape::Sinc),
            Err(EqError::EmptyChunk)
        ));
        assert!(matches!(
            apply_parametric(&[], FS, 100.0, 1.0, 3.0),
            Err(EqError::EmptyChunk)
        ));
    }
}
