use thiserror::Error;

/// Errors produced by filter design, bank construction and chunk processing.
///
/// Design-time errors (`InvalidBand`, `BankConfig`) are fatal to setup and
/// abort equalizer startup. Per-chunk errors (`NotProcessing`, `EmptyChunk`,
/// `ChunkSize`, `ChannelMismatch`) are returned to the caller and leave the
/// filter bank's tail-carry state untouched, so the next valid chunk is
/// processed normally. Out-of-range finite gains are clamped, never fatal;
/// only non-finite gain requests surface as `InvalidGain`.
#[derive(Debug, Error)]
pub enum EqError {
    #[error("invalid band edges: {low} Hz .. {high} Hz at {sample_rate} Hz (need 0 < low < high < Nyquist)")]
    InvalidBand {
        low: f32,
        high: f32,
        sample_rate: u32,
    },

    #[error("filter bank config: {0}")]
    BankConfig(String),

    #[error("gain {0} dB is not a finite value")]
    InvalidGain(f32),

    #[error("band index {index} out of range (bank has {bands} bands)")]
    BandIndex { index: usize, bands: usize },

    #[error("equalizer is not processing; call start() first")]
    NotProcessing,

    #[error("empty audio chunk")]
    EmptyChunk,

    #[error("chunk length {got} does not match configured chunk size {expected}")]
    ChunkSize { expected: usize, got: usize },

    #[error("chunk has {got} channels but the bank was built for {expected}")]
    ChannelMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, EqError>;
