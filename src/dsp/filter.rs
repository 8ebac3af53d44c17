use std::f64::consts::PI;

use crate::error::{EqError, Result};

/// Windowed-sinc FIR taps for one band.
///
/// Taps are designed in f64 and stored as f32; a Hamming window is always
/// applied. The length is forced odd so the filter has a well-defined
/// center tap and linear phase with a constant group delay of
/// `(len - 1) / 2` samples.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    taps: Vec<f32>,
    pub low_cutoff: f32,
    pub high_cutoff: f32,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    /// Index of the center tap, equal to the group delay in samples.
    pub fn center(&self) -> usize {
        (self.taps.len() - 1) / 2
    }
}

/// Ideal band-pass impulse response, Hamming-windowed:
///
/// `h[n] = (sin(w_h n) - sin(w_l n)) / (n pi)` for n != 0,
/// `h[0] = (w_h - w_l) / pi`.
///
/// Requires `0 < f_low < f_high < sample_rate / 2`.
pub fn bandpass(f_low: f32, f_high: f32, sample_rate: u32, taps: usize) -> Result<ImpulseResponse> {
    let nyquist = sample_rate as f32 / 2.0;
    if !(f_low > 0.0 && f_low < f_high && f_high < nyquist) {
        return Err(EqError::InvalidBand {
            low: f_low,
            high: f_high,
            sample_rate,
        });
    }

    Ok(ImpulseResponse {
        taps: fir_from_edges(f_low as f64, f_high as f64, sample_rate, taps),
        low_cutoff: f_low,
        high_cutoff: f_high,
        sample_rate,
    })
}

/// Unchecked designer used by the filter bank, whose edge bands may
/// legitimately start at 0 Hz (low-pass) or end at Nyquist (high-pass).
/// Callers validate the edges themselves.
pub(crate) fn fir_from_edges(f_low: f64, f_high: f64, sample_rate: u32, taps: usize) -> Vec<f32> {
    let taps = force_odd(taps);
    let m = ((taps - 1) / 2) as f64;
    let w_l = 2.0 * PI * f_low / sample_rate as f64;
    let w_h = 2.0 * PI * f_high / sample_rate as f64;

    (0..taps)
        .map(|i| {
            let n = i as f64 - m;
            // sin(w n) / (n pi) == (w / pi) * sinc(w n / pi); sinc handles
            // n = 0 with its closed-form limit, so no division branch here.
            let ideal = (w_h / PI) * sinc(w_h * n / PI) - (w_l / PI) * sinc(w_l * n / PI);
            let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / (taps - 1) as f64).cos();
            (ideal * window) as f32
        })
        .collect()
}

/// Frequency-domain peaking response over `len` FFT bins.
///
/// A Gaussian prototype centered at `f_center` with bandwidth
/// `f_center / q` is blended into unity gain: boosts add the shaped excess,
/// cuts subtract it. `gain_db == 0` returns the exact identity response.
pub fn parametric(
    f_center: f32,
    q: f32,
    gain_db: f32,
    sample_rate: u32,
    len: usize,
) -> Result<Vec<f32>> {
    let nyquist = sample_rate as f32 / 2.0;
    if !(f_center > 0.0 && f_center < nyquist && q > 0.0) {
        return Err(EqError::InvalidBand {
            low: f_center,
            high: f_center,
            sample_rate,
        });
    }
    if !gain_db.is_finite() {
        return Err(EqError::InvalidGain(gain_db));
    }

    if gain_db == 0.0 {
        return Ok(vec![1.0; len]);
    }

    let gain_linear = 10f64.powf(gain_db as f64 / 20.0);
    let bandwidth = f_center as f64 / q as f64;
    let sigma = gaussian_sigma(bandwidth);
    let center = f_center as f64;

    let response = (0..len)
        .map(|k| {
            let f = bin_frequency(k, len, sample_rate);
            let shape = (-0.5 * ((f - center) / sigma).powi(2)).exp();
            let r = if gain_db > 0.0 {
                1.0 + shape * (gain_linear - 1.0)
            } else {
                1.0 - shape * (1.0 - gain_linear)
            };
            r as f32
        })
        .collect();

    Ok(response)
}

/// Gaussian band-selection mask over `len` FFT bins (smooth band edges).
pub fn gaussian_mask(f_low: f32, f_high: f32, len: usize, sample_rate: u32) -> Result<Vec<f32>> {
    validate_edges(f_low, f_high, sample_rate)?;

    let center = (f_low as f64 + f_high as f64) / 2.0;
    let sigma = gaussian_sigma((f_high - f_low) as f64);

    Ok((0..len)
        .map(|k| {
            let f = bin_frequency(k, len, sample_rate);
            (-0.5 * ((f - center) / sigma).powi(2)).exp() as f32
        })
        .collect())
}

/// Rectangular band-selection mask over `len` FFT bins (hard band edges).
pub fn rectangular_mask(f_low: f32, f_high: f32, len: usize, sample_rate: u32) -> Result<Vec<f32>> {
    validate_edges(f_low, f_high, sample_rate)?;

    Ok((0..len)
        .map(|k| {
            let f = bin_frequency(k, len, sample_rate);
            if f >= f_low as f64 && f <= f_high as f64 {
                1.0
            } else {
                0.0
            }
        })
        .collect())
}

fn validate_edges(f_low: f32, f_high: f32, sample_rate: u32) -> Result<()> {
    let nyquist = sample_rate as f32 / 2.0;
    if !(f_low > 0.0 && f_low < f_high && f_high < nyquist) {
        return Err(EqError::InvalidBand {
            low: f_low,
            high: f_high,
            sample_rate,
        });
    }
    Ok(())
}

/// Absolute frequency of FFT bin `k` for a transform of length `len`,
/// mirroring the upper half onto negative frequencies.
fn bin_frequency(k: usize, len: usize, sample_rate: u32) -> f64 {
    let k = k.min(len - k);
    k as f64 * sample_rate as f64 / len as f64
}

/// FWHM-based sigma so the Gaussian's full width at half maximum equals
/// the requested bandwidth.
fn gaussian_sigma(bandwidth: f64) -> f64 {
    bandwidth / (2.0 * (2.0 * 2f64.ln()).sqrt())
}

/// Normalized sinc with the closed-form limit at zero.
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

pub(crate) fn force_odd(taps: usize) -> usize {
    let taps = if taps % 2 == 0 { taps + 1 } else { taps };
    taps.max(3)
}
