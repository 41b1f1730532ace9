use crate::audio::{AudioSource, SampleBuffer, network};
use crate::error::{DecodeError, DetectionError};
use lewton::inside_ogg::OggStreamReader;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};

/// Streaming Ogg Vorbis decoder that keeps only the first channel.
///
/// The underlying reader (file handle or downloaded bytes) is released when
/// the decoder is dropped.
pub struct OggDecoder<R: Read + Seek> {
    ogg: OggStreamReader<R>,
    channels: usize,
    sample_rate: u32,
}

impl<R: Read + Seek> OggDecoder<R> {
    pub fn new(reader: R) -> Result<Self, DecodeError> {
        let ogg = OggStreamReader::new(reader)?;
        let channels = ogg.ident_hdr.audio_channels as usize;
        let sample_rate = ogg.ident_hdr.audio_sample_rate;
        if channels == 0 {
            return Err(DecodeError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(DecodeError::InvalidSampleRate);
        }
        debug!("Opened vorbis stream: {} ch @ {} Hz", channels, sample_rate);
        Ok(Self {
            ogg,
            channels,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Appends the first channel of the next packet to `out`, normalised to
    /// `[-1, 1]`. Returns `Ok(false)` at end of stream.
    pub fn next_packet_into(&mut self, out: &mut Vec<f32>) -> Result<bool, DecodeError> {
        loop {
            match self.ogg.read_dec_packet_itl()? {
                None => return Ok(false),
                Some(pkt) if pkt.is_empty() => continue,
                Some(pkt) => {
                    out.extend(
                        pkt.iter()
                            .step_by(self.channels)
                            .map(|&s| f32::from(s) / 32768.0),
                    );
                    return Ok(true);
                }
            }
        }
    }

    /// Decodes until end of stream or until `stop` is raised.
    pub fn decode_all(mut self, stop: &AtomicBool) -> Result<SampleBuffer, DetectionError> {
        let mut samples = Vec::new();
        while self.next_packet_into(&mut samples)? {
            if stop.load(Ordering::Relaxed) {
                return Err(DetectionError::Cancelled);
            }
        }
        Ok(SampleBuffer::new(samples, self.sample_rate))
    }
}

impl<R: Read + Seek> Drop for OggDecoder<R> {
    fn drop(&mut self) {
        debug!("Released vorbis decoder ({} Hz)", self.sample_rate);
    }
}

/// Fetches (if remote) and decodes `source` into a mono sample buffer.
pub fn decode_source(source: &AudioSource, stop: &AtomicBool) -> Result<SampleBuffer, DetectionError> {
    let buffer = match source {
        AudioSource::File(path) => {
            let file = File::open(path).map_err(DecodeError::from)?;
            OggDecoder::new(BufReader::new(file))?.decode_all(stop)?
        }
        AudioSource::Url(url) => {
            let bytes = network::fetch_bytes(url)?;
            if stop.load(Ordering::Relaxed) {
                return Err(DetectionError::Cancelled);
            }
            OggDecoder::new(Cursor::new(bytes))?.decode_all(stop)?
        }
        AudioSource::Bytes(bytes) => {
            OggDecoder::new(Cursor::new(bytes.as_slice()))?.decode_all(stop)?
        }
    };

    info!(
        "Decoded {:?}: {} samples @ {} Hz ({:.1}s)",
        source,
        buffer.samples.len(),
        buffer.sample_rate,
        buffer.duration_ms() / 1000.0
    );
    Ok(buffer)
}
