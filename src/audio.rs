pub mod decode;
pub mod network;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Mono samples in `[-1, 1]` together with their rate. Lives only for the
/// duration of one analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / f64::from(self.sample_rate)
    }
}

/// Where encoded audio comes from.
#[derive(Clone)]
pub enum AudioSource {
    File(PathBuf),
    Url(String),
    Bytes(Arc<Vec<u8>>),
}

impl AudioSource {
    /// Treats `http://` and `https://` prefixes as remote, anything else as a path.
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            AudioSource::Url(location.to_string())
        } else {
            AudioSource::File(PathBuf::from(location))
        }
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::File(path) => write!(f, "File({})", path.display()),
            AudioSource::Url(url) => write!(f, "Url({url})"),
            AudioSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// Output side of the music track. The engine never renders audio itself; it
/// only starts, stops and rewinds playback and asks where playback is.
pub trait Playback: Send {
    fn play(&mut self);
    fn pause(&mut self);
    /// Stops playback and seeks back to the start of the track.
    fn rewind(&mut self);
    /// Current position in milliseconds from the start of the track.
    fn position_ms(&self) -> f64;
    fn has_ended(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_and_local_locations() {
        assert!(matches!(
            AudioSource::parse("https://example.com/a.ogg"),
            AudioSource::Url(_)
        ));
        assert!(matches!(
            AudioSource::parse("HTTP://example.com/a.ogg"),
            AudioSource::Url(_)
        ));
        assert!(matches!(
            AudioSource::parse("songs/a.ogg"),
            AudioSource::File(_)
        ));
    }

    #[test]
    fn duration_follows_rate() {
        let buffer = SampleBuffer::new(vec![0.0; 22_050], 44_100);
        assert_eq!(buffer.duration_ms(), 500.0);
        assert_eq!(SampleBuffer::new(vec![0.0; 10], 0).duration_ms(), 0.0);
    }
}
