use anyhow::{Context, Result};
use std::path::Path;

/// Write planar f32 channels as integer PCM in a WAV container.
///
/// Samples are clamped to [-1, 1] before quantization; `bits` must be 16
/// or 24.
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32, bits: u16) -> Result<()> {
    anyhow::ensure!(
        bits == 16 || bits == 24,
        "unsupported bit depth {} (use 16 or 24)",
        bits
    );
    anyhow::ensure!(!channels.is_empty(), "no channels to write");

    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let full_scale = ((1i32 << (bits - 1)) - 1) as f32;

    for i in 0..frames {
        for channel in channels {
            let sample = channel[i].clamp(-1.0, 1.0);
            writer.write_sample((sample * full_scale).round() as i32)?;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    log::info!(
        "Wrote {}: {} frames x {} channels, {}Hz, {}-bit PCM",
        path.display(),
        frames,
        channels.len(),
        sample_rate,
        bits
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_bit_depth() {
        let dir = std::env::temp_dir().join("bandeq_wav_test.wav");
        let result = write_wav(&dir, &[vec![0.0; 8]], 44100, 32);
        assert!(result.is_err());
    }

    #[test]
    fn clamps_out_of_range_samples() {
        let path = std::env::temp_dir().join("bandeq_wav_clip_test.wav");
        write_wav(&path, &[vec![2.0, -2.0, 0.5]], 44100, 16).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples[0], i16::MAX);
        assert_eq!(samples[1], -i16::MAX);
        std::fs::remove_file(&path).ok();
    }
}
