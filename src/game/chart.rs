use crate::error::ConfigError;
use crate::game::beats::BeatAnalysis;
use crate::game::note::Note;
use log::info;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Consecutive beats further apart than this get a midpoint note on hard.
pub const HARD_SUBDIVIDE_GAP_MS: f64 = 500.0;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Picks the beat timings that become notes for `difficulty`.
pub fn select_timings(beats: &[f64], difficulty: Difficulty) -> Vec<f64> {
    match difficulty {
        Difficulty::Easy => beats.iter().step_by(2).copied().collect(),
        Difficulty::Normal => beats.to_vec(),
        Difficulty::Hard => {
            let mut timings = beats.to_vec();
            for pair in beats.windows(2) {
                let (curr, next) = (pair[0], pair[1]);
                if next - curr > HARD_SUBDIVIDE_GAP_MS {
                    timings.push((curr + next) / 2.0);
                }
            }
            timings.sort_by(f64::total_cmp);
            timings
        }
    }
}

/// Deterministic lane for the note at `index`. `lanes` must be non-zero.
#[inline(always)]
pub fn lane_for_index(index: usize, lanes: usize) -> usize {
    let spread = ((index as f64 * 2.5).sin() + 1.0) * (lanes as f64 / 2.0);
    spread.floor() as usize % lanes
}

/// Builds the tap-note chart for `beats`. Timings are relative to a zero
/// origin; lead-in is applied by whoever plays the chart.
pub fn generate_chart(
    beats: &[f64],
    difficulty: Difficulty,
    lanes: usize,
) -> Result<Vec<Note>, ConfigError> {
    if lanes == 0 {
        return Err(ConfigError::ZeroLanes);
    }
    Ok(select_timings(beats, difficulty)
        .into_iter()
        .enumerate()
        .map(|(index, timing)| Note::tap(index, lane_for_index(index, lanes), timing))
        .collect())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeatMap {
    pub title: String,
    pub artist: String,
    pub bpm: u32,
    pub notes: Vec<Note>,
    /// Delay before logical start, in milliseconds.
    pub offset_ms: f64,
}

impl BeatMap {
    pub fn from_analysis(
        title: impl Into<String>,
        artist: impl Into<String>,
        analysis: &BeatAnalysis,
        difficulty: Difficulty,
        lanes: usize,
        offset_ms: f64,
    ) -> Result<Self, ConfigError> {
        let notes = generate_chart(&analysis.beats, difficulty, lanes)?;
        let title = title.into();
        info!(
            "Generated {} chart for '{}': {} notes from {} beats at {} BPM",
            difficulty,
            title,
            notes.len(),
            analysis.beats.len(),
            analysis.bpm
        );
        Ok(Self {
            title,
            artist: artist.into(),
            bpm: analysis.bpm,
            notes,
            offset_ms,
        })
    }

    /// Built-in four-lane demo chart, used when no audio could be analysed.
    pub fn sample() -> Self {
        const BPM: u32 = 120;
        const START_MS: f64 = 3000.0;
        const BEATS: usize = 64;
        let beat_ms = 60_000.0 / BPM as f64;

        let mut notes = Vec::with_capacity(BEATS + BEATS / 8);
        for i in 0..BEATS {
            let timing = START_MS + i as f64 * beat_ms;
            let lane = i % 4;
            notes.push(Note::tap(notes.len(), lane, timing));
            if i % 8 == 0 && i > 0 {
                notes.push(Note::tap(notes.len(), (lane + 2) % 4, timing));
            }
        }

        Self {
            title: "Sample Song".to_string(),
            artist: "Demo Artist".to_string(),
            bpm: BPM,
            notes,
            offset_ms: 2000.0,
        }
    }
}
