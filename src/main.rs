use beatlane::audio::AudioSource;
use beatlane::config::{DEFAULT_CONFIG_PATH, GameConfig};
use beatlane::game::chart::{BeatMap, Difficulty};
use beatlane::game::detection::DetectionTask;
use beatlane::game::gameplay::{GameSession, GameState};
use clap::Parser;
use log::{LevelFilter, info, warn};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "beatlane", about = "Generate a rhythm chart from an Ogg Vorbis track")]
struct Args {
    /// Path to the INI config file (created with defaults if missing).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Overrides the difficulty from the config file.
    #[arg(long)]
    difficulty: Option<Difficulty>,

    /// Play the chart perfectly against a simulated clock and print the score.
    #[arg(long)]
    autoplay: bool,

    /// Ogg Vorbis file or http(s) URL. The built-in sample chart is used when
    /// omitted or when analysis fails.
    audio: Option<String>,
}

#[derive(Serialize)]
struct ChartSummary<'a> {
    title: &'a str,
    artist: &'a str,
    bpm: u32,
    difficulty: Difficulty,
    notes: usize,
    notes_per_lane: Vec<usize>,
    first_note_ms: Option<f64>,
    last_note_ms: Option<f64>,
}

impl<'a> ChartSummary<'a> {
    fn new(beat_map: &'a BeatMap, difficulty: Difficulty, lanes: usize) -> Self {
        let mut notes_per_lane = vec![0; lanes];
        for note in &beat_map.notes {
            if let Some(count) = notes_per_lane.get_mut(note.lane) {
                *count += 1;
            }
        }
        Self {
            title: &beat_map.title,
            artist: &beat_map.artist,
            bpm: beat_map.bpm,
            difficulty,
            notes: beat_map.notes.len(),
            notes_per_lane,
            first_note_ms: beat_map.notes.iter().map(|n| n.timing).reduce(f64::min),
            last_note_ms: beat_map.notes.iter().map(|n| n.timing).reduce(f64::max),
        }
    }
}

fn track_title(location: &str) -> String {
    Path::new(location)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(location)
        .to_string()
}

fn build_beat_map(audio: Option<&str>, config: &GameConfig, difficulty: Difficulty) -> BeatMap {
    let Some(location) = audio else {
        info!("No audio given, using the sample chart.");
        return BeatMap::sample();
    };

    let beat_map = DetectionTask::spawn(AudioSource::parse(location))
        .wait()
        .and_then(|analysis| {
            Ok(BeatMap::from_analysis(
                track_title(location),
                "Unknown Artist",
                &analysis,
                difficulty,
                config.lanes,
                config.lead_in_offset_ms,
            )?)
        });
    match beat_map {
        Ok(beat_map) => beat_map,
        Err(e) => {
            warn!("Could not analyse '{}': {}. Using the sample chart.", location, e);
            BeatMap::sample()
        }
    }
}

/// Runs a session against synthetic instants, pressing every note exactly on
/// time.
fn autoplay(config: GameConfig, beat_map: &BeatMap) -> Result<GameSession, Box<dyn Error>> {
    let lead_in_ms = config.lead_in_offset_ms;
    let mut session = GameSession::new(config)?;
    session.load_beat_map(beat_map);

    let mut timings: Vec<f64> = beat_map.notes.iter().map(|n| n.timing).collect();
    timings.sort_by(f64::total_cmp);
    timings.dedup();

    let t0 = Instant::now();
    let at = |game_ms: f64| t0 + Duration::from_secs_f64(((game_ms + lead_in_ms) / 1000.0).max(0.0));

    session.start(t0);
    for timing in timings {
        if session.state() != GameState::Playing {
            break;
        }
        let now = at(timing);
        session.tick(now);
        for note in beat_map.notes.iter().filter(|n| n.timing == timing) {
            session.press_lane(note.lane);
        }
        session.tick(now);
    }

    // Let the finish check run if the chart ended with unplayable notes.
    let mut game_ms = session.current_time();
    while session.state() == GameState::Playing {
        game_ms += 500.0;
        session.tick(at(game_ms));
    }
    Ok(session)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("beatlane::audio", LevelFilter::Info)
        .filter_module("beatlane::game", LevelFilter::Debug)
        .init();

    let args = Args::parse();
    info!("beatlane starting...");

    let config = GameConfig::load(&args.config)?;
    let difficulty = args.difficulty.unwrap_or(config.difficulty);

    let beat_map = build_beat_map(args.audio.as_deref(), &config, difficulty);
    let summary = ChartSummary::new(&beat_map, difficulty, config.lanes);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if args.autoplay {
        let session = autoplay(config, &beat_map)?;
        println!("{}", serde_json::to_string_pretty(session.score())?);
    }

    info!("beatlane exited gracefully.");
    Ok(())
}
