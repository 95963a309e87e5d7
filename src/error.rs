use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("audio sample rate {actual} Hz is not supported (target {target} Hz); allow downsampling or upsampling")]
    UnsupportedSampleRate { actual: u32, target: u32 },
    #[error("unsupported feature method: {0}")]
    UnsupportedFeatureMethod(String),
    #[error("invalid waveform: {0}")]
    InvalidWaveform(String),
    #[error("need at least {needed} samples to extract features, got {actual}")]
    InsufficientSamples { needed: usize, actual: usize },
    #[error("gain of {gain_db:.2} dB exceeds the maximum of {max_gain_db:.2} dB")]
    Gain { gain_db: f64, max_gain_db: f64 },
    #[error("resampling failed: {0}")]
    Resample(String),
    #[error("feature dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid manifest record at {path:?} line {line}")]
    Manifest {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("index {index} out of range for dataset of {len} samples")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no usable sample for index {index} after {attempts} attempts")]
    SampleUnavailable { index: usize, attempts: usize },
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("WAV decode error")]
    Wav(#[from] hound::Error),
    #[error("JSON error")]
    Json(#[from] serde_json::Error),
    #[error("ndarray shape error")]
    Shape(#[from] ndarray::ShapeError),
}
