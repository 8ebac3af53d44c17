use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::chunk::AudioChunk;
use crate::dsp::bank::FilterBank;
use crate::error::{EqError, Result};

/// One equalizer band: center frequency plus its current gain.
///
/// `gain_db` and `gain_linear` are always updated together under the band
/// table lock; they never disagree once a mutation completes.
#[derive(Clone, Copy, Debug)]
pub struct Band {
    pub index: usize,
    pub center: f32,
    pub gain_db: f32,
    pub gain_linear: f32,
}

/// Supported slider range in dB. Finite requests outside the range are
/// clamped with a warning; only non-finite values are rejected.
#[derive(Clone, Copy, Debug)]
pub struct GainRange {
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for GainRange {
    fn default() -> Self {
        Self {
            min_db: -30.0,
            max_db: 12.0,
        }
    }
}

pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

struct Shared {
    bands: Mutex<Vec<Band>>,
    running: AtomicBool,
    last_output: Mutex<Option<AudioChunk>>,
    range: GainRange,
}

impl Shared {
    fn set_band_gain_db(&self, index: usize, db: f32) -> Result<()> {
        if !db.is_finite() {
            return Err(EqError::InvalidGain(db));
        }
        let mut bands = self.bands.lock().unwrap();
        let count = bands.len();
        let band = bands
            .get_mut(index)
            .ok_or(EqError::BandIndex { index, bands: count })?;

        let clamped = db.clamp(self.range.min_db, self.range.max_db);
        if clamped != db {
            log::warn!(
                "gain {} dB for band {} outside {}..{} dB, clamping to {}",
                db,
                index,
                self.range.min_db,
                self.range.max_db,
                clamped
            );
        }
        band.gain_db = clamped;
        band.gain_linear = db_to_linear(clamped);
        Ok(())
    }
}

/// Cloneable control surface for the equalizer: gains, start, stop.
///
/// These are the only mutation points exposed to other threads; everything
/// goes through the shared band table lock or an atomic flag, so a write
/// of one band's gain is never observed half-applied by the processing
/// path.
#[derive(Clone)]
pub struct GainControl {
    shared: Arc<Shared>,
}

impl GainControl {
    pub fn set_band_gain_db(&self, index: usize, db: f32) -> Result<()> {
        self.shared.set_band_gain_db(index, db)
    }

    pub fn band_gain_db(&self, index: usize) -> Result<f32> {
        let bands = self.shared.bands.lock().unwrap();
        bands
            .get(index)
            .map(|b| b.gain_db)
            .ok_or(EqError::BandIndex {
                index,
                bands: bands.len(),
            })
    }

    /// Snapshot of the whole band table.
    pub fn bands(&self) -> Vec<Band> {
        self.shared.bands.lock().unwrap().clone()
    }

    /// Set every band back to 0 dB.
    pub fn reset(&self) {
        let mut bands = self.shared.bands.lock().unwrap();
        for band in bands.iter_mut() {
            band.gain_db = 0.0;
            band.gain_linear = 1.0;
        }
    }

    pub fn start(&self) {
        self.shared.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    pub fn is_processing(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

/// Read-only view of the latest composite chunk for the presentation
/// context. `latest` uses a try-lock so a slow reader can never block the
/// processing path; on contention it simply reports nothing this tick.
#[derive(Clone)]
pub struct OutputTap {
    shared: Arc<Shared>,
}

impl OutputTap {
    pub fn latest(&self) -> Option<AudioChunk> {
        match self.shared.last_output.try_lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }
}

/// Chunk-wise band-split equalizer.
///
/// State machine: Idle -> Processing -> Idle via `start`/`stop`; chunks
/// are accepted only while Processing. `process_chunk` takes `&mut self`,
/// so the bank's tail-carry state only ever sees one chunk at a time and
/// chunks are processed strictly in arrival order. A chunk accepted
/// before `stop` completes in full; nothing half-summed ever reaches the
/// output tap.
pub struct RealTimeEqualizer {
    bank: FilterBank,
    shared: Arc<Shared>,
}

impl RealTimeEqualizer {
    pub fn new(bank: FilterBank, range: GainRange) -> Self {
        let bands = bank
            .centers()
            .into_iter()
            .enumerate()
            .map(|(index, center)| Band {
                index,
                center,
                gain_db: 0.0,
                gain_linear: 1.0,
            })
            .collect();

        Self {
            bank,
            shared: Arc::new(Shared {
                bands: Mutex::new(bands),
                running: AtomicBool::new(false),
                last_output: Mutex::new(None),
                range,
            }),
        }
    }

    pub fn controller(&self) -> GainControl {
        GainControl {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn output_tap(&self) -> OutputTap {
        OutputTap {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn start(&self) {
        self.shared.running.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
    }

    pub fn is_processing(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn set_band_gain_db(&self, index: usize, db: f32) -> Result<()> {
        self.shared.set_band_gain_db(index, db)
    }

    /// Filter one chunk through every band, apply the current gains and
    /// sum the bands sample-wise.
    ///
    /// Gains are snapshotted under a single lock acquisition before any
    /// filtering happens, so one call never mixes old and new values of a
    /// concurrent gain write.
    pub fn process_chunk(&mut self, chunk: &AudioChunk) -> Result<AudioChunk> {
        if !self.is_processing() {
            return Err(EqError::NotProcessing);
        }

        let gains: Vec<f32> = {
            let bands = self.shared.bands.lock().unwrap();
            bands.iter().map(|b| b.gain_linear).collect()
        };

        let band_chunks = self.bank.apply(chunk)?;

        let mut output = AudioChunk::silent(chunk.channel_count(), chunk.len(), chunk.sample_rate);
        for (band_chunk, &gain) in band_chunks.iter().zip(gains.iter()) {
            for (out_ch, band_ch) in output.channels.iter_mut().zip(band_chunk.channels.iter()) {
                for (out, &s) in out_ch.iter_mut().zip(band_ch.iter()) {
                    *out += gain * s;
                }
            }
        }

        *self.shared.last_output.lock().unwrap() = Some(output.clone());
        Ok(output)
    }

    /// Most recent composite output, if any chunk has been processed.
    pub fn last_processed_chunk(&self) -> Option<AudioChunk> {
        self.shared.last_output.lock().unwrap().clone()
    }

    /// The bank's constant group delay in samples.
    pub fn latency(&self) -> usize {
        self.bank.latency()
    }

    pub fn bank(&self) -> &FilterBank {
        &self.bank
    }
}
