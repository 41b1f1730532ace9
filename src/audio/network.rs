use crate::error::DecodeError;
use log::info;
use once_cell::sync::Lazy;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on a downloaded track.
const MAX_AUDIO_BYTES: u64 = 64 * 1024 * 1024;

static AGENT: Lazy<ureq::Agent> = Lazy::new(|| {
    ureq::Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into()
});

/// Exposes the shared ureq Agent used for audio downloads.
pub fn get_agent() -> ureq::Agent {
    AGENT.clone()
}

/// Downloads the encoded audio at `url` into memory.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>, DecodeError> {
    info!("Fetching audio from {}", url);
    let fetch_error = |e: ureq::Error| DecodeError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    };

    let response = get_agent().get(url).call().map_err(fetch_error)?;
    let bytes = response
        .into_body()
        .with_config()
        .limit(MAX_AUDIO_BYTES)
        .read_to_vec()
        .map_err(fetch_error)?;

    info!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}
