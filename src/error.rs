use thiserror::Error;

/// Audio could not be fetched or decoded into samples.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("invalid vorbis stream: {0}")]
    Vorbis(String),

    #[error("audio stream reports a sample rate of 0 Hz")]
    InvalidSampleRate,

    #[error("audio stream has no channels")]
    NoChannels,
}

impl From<lewton::VorbisError> for DecodeError {
    fn from(e: lewton::VorbisError) -> Self {
        DecodeError::Vorbis(e.to_string())
    }
}

/// Beat detection did not produce a result.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("beat detection was cancelled")]
    Cancelled,

    #[error("beat detection worker exited without reporting")]
    Disconnected,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("lane count must be at least 1")]
    ZeroLanes,

    #[error("judgment windows must be strictly increasing (perfect={perfect}, great={great}, good={good})")]
    NonIncreasingWindows { perfect: f64, great: f64, good: f64 },

    #[error("judgment windows must be finite and non-negative")]
    NegativeWindow,

    #[error("lead-in offset must be finite and non-negative")]
    NegativeLeadIn,
}
