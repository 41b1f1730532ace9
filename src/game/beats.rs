use crate::audio::SampleBuffer;
use log::debug;
use serde::Serialize;

pub const WINDOW_SIZE: usize = 2048;
pub const HOP_SIZE: usize = WINDOW_SIZE / 2;
pub const ENERGY_THRESHOLD_RATIO: f64 = 1.3;
/// Minimum distance between two detected beats, in windows.
pub const MIN_BEAT_GAP_WINDOWS: usize = 5;
/// Neighbours on each side a peak must strictly exceed.
const PEAK_RADIUS: usize = 2;

pub const DEFAULT_BPM: u32 = 120;
pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeatAnalysis {
    /// Ascending beat times in milliseconds.
    pub beats: Vec<f64>,
    pub bpm: u32,
}

/// Mean squared amplitude of each window, advancing by `HOP_SIZE`.
pub fn window_energies(samples: &[f32]) -> Vec<f64> {
    let mut energies = Vec::new();
    let mut start = 0;
    while start + WINDOW_SIZE < samples.len() {
        let sum: f64 = samples[start..start + WINDOW_SIZE]
            .iter()
            .map(|&s| f64::from(s) * f64::from(s))
            .sum();
        energies.push(sum / WINDOW_SIZE as f64);
        start += HOP_SIZE;
    }
    energies
}

/// Window indices that are strong, isolated local maxima.
pub fn pick_peaks(energies: &[f64]) -> Vec<usize> {
    if energies.len() < 2 * PEAK_RADIUS + 1 {
        return Vec::new();
    }

    let mean = energies.iter().sum::<f64>() / energies.len() as f64;
    let threshold = mean * ENERGY_THRESHOLD_RATIO;

    let mut peaks = Vec::new();
    let mut last_peak: Option<usize> = None;
    for i in PEAK_RADIUS..energies.len() - PEAK_RADIUS {
        let current = energies[i];
        let is_local_max = (i - PEAK_RADIUS..=i + PEAK_RADIUS)
            .filter(|&j| j != i)
            .all(|j| current > energies[j]);
        let spaced = last_peak.is_none_or(|last| i - last > MIN_BEAT_GAP_WINDOWS);

        if is_local_max && current > threshold && spaced {
            peaks.push(i);
            last_peak = Some(i);
        }
    }
    peaks
}

/// Tempo from the median inter-beat interval, clamped to a playable range.
pub fn estimate_bpm(beats: &[f64]) -> u32 {
    if beats.len() < 2 {
        return DEFAULT_BPM;
    }

    let mut intervals: Vec<f64> = beats.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_by(f64::total_cmp);
    let median = intervals[intervals.len() / 2];
    if median.is_nan() || median <= 0.0 {
        return DEFAULT_BPM;
    }

    let bpm = (60_000.0 / median).round();
    bpm.clamp(MIN_BPM as f64, MAX_BPM as f64) as u32
}

pub fn detect_beats(buffer: &SampleBuffer) -> BeatAnalysis {
    if buffer.sample_rate == 0 {
        return BeatAnalysis {
            beats: Vec::new(),
            bpm: DEFAULT_BPM,
        };
    }

    let energies = window_energies(&buffer.samples);
    let ms_per_window = HOP_SIZE as f64 * 1000.0 / f64::from(buffer.sample_rate);
    let beats: Vec<f64> = pick_peaks(&energies)
        .into_iter()
        .map(|i| i as f64 * ms_per_window)
        .collect();
    let bpm = estimate_bpm(&beats);

    debug!(
        "Analysed {} samples @ {} Hz: {} windows, {} beats, {} BPM",
        buffer.samples.len(),
        buffer.sample_rate,
        energies.len(),
        beats.len(),
        bpm
    );

    BeatAnalysis { beats, bpm }
}
