mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use bandeq::audio::chunk::AudioChunk;
use bandeq::audio::decode::{self, AudioData};
use bandeq::audio::wav;
use bandeq::config;
use bandeq::dsp::bank::{self, FilterBank};
use bandeq::dsp::equalizer::{GainRange, RealTimeEqualizer};
use bandeq::dsp::offline::{self, MaskShape};
use bandeq::dsp::spectrum::{AnalyzerConfig, SpectrumAnalyzer, SpectrumFrame};
use cli::{Cli, FilterKind};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect bandeq.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("bandeq.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("bandeq").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });

    let mut file_config = config::Config::default();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            file_config = cfg;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Merge: config values apply only when the CLI is at its default
    if cli.chunk_size == 1024 {
        cli.chunk_size = file_config.engine.chunk_size;
    }
    if cli.taps == 255 {
        cli.taps = file_config.engine.taps;
    }
    if cli.bit_depth == 16 {
        cli.bit_depth = file_config.output.bit_depth;
    }

    if cli.list_bands {
        return list_bands(&file_config);
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("bandeq - 5-band FFT equalizer");
    log::info!("Input: {}", input.display());

    let audio_data = decode::decode_audio(input)?;
    anyhow::ensure!(audio_data.len() > 0, "decoded signal is empty");

    let (channels, suffix) = if cli.gains.is_empty() {
        (
            run_single_filter(&cli, &audio_data)?,
            format!("_filtered_{}Hz", cli.freq),
        )
    } else {
        (
            run_equalizer(&cli, &file_config, &audio_data)?,
            "_equalized".to_string(),
        )
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, &suffix));
    wav::write_wav(&output, &channels, audio_data.sample_rate, cli.bit_depth)?;

    log::info!("Done");
    Ok(())
}

/// Offline single-shot path: one band-pass or parametric filter over the
/// whole signal, every channel in parallel.
fn run_single_filter(cli: &Cli, audio: &AudioData) -> Result<Vec<Vec<f32>>> {
    match cli.filter {
        FilterKind::Bandpass => {
            let f_low = cli.freq - cli.bandwidth / 2.0;
            let f_high = cli.freq + cli.bandwidth / 2.0;
            let shape: MaskShape = cli.shape.into();
            log::info!(
                "Band-pass {:.1} Hz .. {:.1} Hz ({:?} mask)",
                f_low,
                f_high,
                shape
            );
            let out = offline::process_channels(&audio.channels, |ch| {
                offline::apply_bandpass(ch, audio.sample_rate, f_low, f_high, shape)
            })?;
            Ok(out)
        }
        FilterKind::Parametric => {
            log::info!(
                "Parametric EQ at {:.1} Hz, Q {:.2}, {:+.1} dB",
                cli.freq,
                cli.q,
                cli.gain
            );
            let out = offline::process_channels(&audio.channels, |ch| {
                offline::apply_parametric(ch, audio.sample_rate, cli.freq, cli.q, cli.gain)
            })?;
            Ok(out)
        }
    }
}

/// Multi-band path: drive the chunk-wise equalizer over the decoded file,
/// pad the final chunk, drain the bank's latency with silence and line the
/// written output up with the input.
fn run_equalizer(
    cli: &Cli,
    file_config: &config::Config,
    audio: &AudioData,
) -> Result<Vec<Vec<f32>>> {
    let centers = &file_config.engine.band_centers;
    anyhow::ensure!(
        cli.gains.len() == centers.len(),
        "expected {} band gains, got {}",
        centers.len(),
        cli.gains.len()
    );

    let bank = FilterBank::build(
        audio.sample_rate,
        audio.channel_count(),
        centers,
        file_config.engine.bandwidth,
        cli.chunk_size,
        cli.taps,
    )?;
    let latency = bank.latency();
    let range = GainRange {
        min_db: file_config.engine.gain_min_db,
        max_db: file_config.engine.gain_max_db,
    };
    let mut eq = RealTimeEqualizer::new(bank, range);

    let control = eq.controller();
    for (i, &db) in cli.gains.iter().enumerate() {
        control.set_band_gain_db(i, db)?;
    }

    log::info!(
        "Equalizer ready: {} bands, latency {} samples",
        eq.bank().band_count(),
        latency
    );
    for band in control.bands() {
        log::info!(
            "  band {} ({:>9}): {:+5.1} dB (A = {:.3})",
            band.index,
            format_freq(band.center),
            band.gain_db,
            band.gain_linear
        );
    }

    let mut analyzer = cli.spectrum.then(|| {
        SpectrumAnalyzer::new(
            audio.sample_rate,
            AnalyzerConfig {
                bands: file_config.analyzer.bands,
                min_frequency: file_config.analyzer.min_frequency,
                level_smoothing: file_config.analyzer.level_smoothing,
                peak_decay: file_config.analyzer.peak_decay,
            },
        )
    });
    let tap = eq.output_tap();

    control.start();

    let len = audio.len();
    let chunk_size = cli.chunk_size;
    let feed_chunks = len.div_ceil(chunk_size);
    let drain_chunks = latency.div_ceil(chunk_size);
    let total_chunks = feed_chunks + drain_chunks;

    let pb = ProgressBar::new(total_chunks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} chunks ({eta} remaining)")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut out_channels: Vec<Vec<f32>> =
        vec![Vec::with_capacity(total_chunks * chunk_size); audio.channel_count()];

    for c in 0..total_chunks {
        let start = c * chunk_size;
        let piece: Vec<Vec<f32>> = audio
            .channels
            .iter()
            .map(|ch| {
                let mut v: Vec<f32> = if start < len {
                    ch[start..(start + chunk_size).min(len)].to_vec()
                } else {
                    Vec::new()
                };
                v.resize(chunk_size, 0.0);
                v
            })
            .collect();

        let out = eq.process_chunk(&AudioChunk::new(piece, audio.sample_rate))?;
        for (dst, src) in out_channels.iter_mut().zip(out.channels.iter()) {
            dst.extend_from_slice(src);
        }

        if let Some(analyzer) = analyzer.as_mut() {
            // Read through the tap, the way a renderer on its own cadence would
            if let Some(latest) = tap.latest() {
                let frame = analyzer.analyze(&latest)?;
                if c % 32 == 0 {
                    pb.suspend(|| print_spectrum(&frame, &analyzer.band_centers()));
                }
            }
        }
        pb.set_position(c as u64 + 1);
    }
    pb.finish_with_message("Processing complete");

    control.stop();

    // Drop the bank's constant group delay so the file lines up with the input
    Ok(out_channels
        .into_iter()
        .map(|ch| ch[latency..latency + len].to_vec())
        .collect())
}

fn list_bands(file_config: &config::Config) -> Result<()> {
    let nominal_rate = 44100u32;
    let centers = &file_config.engine.band_centers;
    let edges = bank::derive_edges(
        centers,
        file_config.engine.bandwidth,
        nominal_rate as f32 / 2.0,
    )?;

    println!("Equalizer bands (at {} Hz):", nominal_rate);
    for (i, (&center, (low, high))) in centers.iter().zip(edges).enumerate() {
        println!(
            "  band {}: {:>9}   {:7.1} Hz .. {:7.1} Hz",
            i,
            format_freq(center),
            low,
            high
        );
    }
    println!(
        "Gain range: {} dB .. {} dB",
        file_config.engine.gain_min_db, file_config.engine.gain_max_db
    );
    Ok(())
}

fn print_spectrum(frame: &SpectrumFrame, centers: &[f32]) {
    println!("--- spectrum ---");
    for ((&level, &peak), &center) in frame
        .levels
        .iter()
        .zip(frame.peaks.iter())
        .zip(centers.iter())
    {
        let bar = "=".repeat((level * 40.0).round() as usize);
        println!(
            "{:>9} |{:<40}| {:.2} (peak {:.2})",
            format_freq(center),
            bar,
            level,
            peak
        );
    }
}

fn format_freq(freq: f32) -> String {
    if freq < 1000.0 {
        format!("{:.0} Hz", freq)
    } else {
        format!("{:.1} kHz", freq / 1000.0)
    }
}

fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}{}.wav", stem, suffix))
}
