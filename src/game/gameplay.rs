use crate::audio::{AudioSource, Playback};
use crate::config::GameConfig;
use crate::error::{ConfigError, DetectionError};
use crate::game::chart::{BeatMap, Difficulty, generate_chart};
use crate::game::detection::DetectionTask;
use crate::game::effects::{TransientEffect, purge_expired};
use crate::game::judgment::{Judgment, JudgmentWindows};
use crate::game::note::Note;
use crate::game::scores::Score;
use crate::game::timing::GameClock;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;

/// After the last note, the session ends this long later even if something
/// is still unresolved.
pub const FINISH_GRACE_MS: f64 = 2000.0;
/// Span after the good window during which an unhit note is swept as a miss.
pub const MISS_GRACE_MS: f64 = 100.0;
const STATUS_LOG_INTERVAL_MS: f64 = 1000.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Ready,
    Playing,
    Paused,
    Finished,
}

/// What a single lane press did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LaneOutcome {
    /// No unresolved note in the lane; only a key-press effect was emitted.
    NoNote,
    /// The nearest note is outside the good window and stays unresolved.
    OutOfWindow { note_id: usize },
    Judged { note_id: usize, judgment: Judgment },
}

/// Notes, score and effects of one run. Only `judge_lane` and `sweep_misses`
/// resolve notes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Playfield {
    pub notes: Vec<Note>,
    pub score: Score,
    pub effects: Vec<TransientEffect>,
}

impl Playfield {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            notes,
            ..Self::default()
        }
    }

    pub fn unresolved_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.is_resolved()).count()
    }

    pub fn all_resolved(&self) -> bool {
        self.notes.iter().all(Note::is_resolved)
    }

    /// Timing of the latest note in the chart.
    pub fn last_timing(&self) -> Option<f64> {
        self.notes.iter().map(|n| n.timing).reduce(f64::max)
    }
}

fn resolve_note(field: &mut Playfield, note_index: usize, judgment: Judgment, now_ms: f64) {
    let note = &mut field.notes[note_index];
    if !note.resolve(judgment) {
        return;
    }
    let lane = note.lane;
    field.score.apply(judgment);
    field
        .effects
        .push(TransientEffect::judgment(lane, judgment, now_ms));
}

/// Judges a press in `lane` at game time `now_ms` against the nearest
/// unresolved note in that lane. Equidistant candidates go to the lowest id.
pub fn judge_lane(
    field: &mut Playfield,
    lane: usize,
    now_ms: f64,
    windows: &JudgmentWindows,
) -> LaneOutcome {
    field.effects.push(TransientEffect::key_press(lane, now_ms));

    let candidate = field
        .notes
        .iter()
        .enumerate()
        .filter(|(_, note)| note.lane == lane && !note.is_resolved())
        .map(|(index, note)| (index, note.id, (note.timing - now_ms).abs()))
        .min_by(|a, b| a.2.total_cmp(&b.2).then(a.1.cmp(&b.1)));

    let Some((note_index, note_id, delta)) = candidate else {
        return LaneOutcome::NoNote;
    };

    let Some(judgment) = windows.classify(delta) else {
        debug!(
            "Press in lane {} at {:.1}ms is {:.1}ms from note {}; outside windows",
            lane, now_ms, delta, note_id
        );
        return LaneOutcome::OutOfWindow { note_id };
    };

    resolve_note(field, note_index, judgment, now_ms);
    info!(
        "JUDGED: Note {}, Lane {}, Error: {:.2}ms, Grade: {}",
        note_id, lane, delta, judgment
    );
    LaneOutcome::Judged { note_id, judgment }
}

/// Resolves as MISS every unresolved note that is later than the good window
/// but still inside the grace span. Returns how many notes were swept.
pub fn sweep_misses(field: &mut Playfield, now_ms: f64, good_window_ms: f64) -> usize {
    let mut swept = 0;
    for note_index in 0..field.notes.len() {
        let note = &field.notes[note_index];
        if note.is_resolved() {
            continue;
        }
        let late_by = now_ms - note.timing;
        if late_by > good_window_ms && late_by < good_window_ms + MISS_GRACE_MS {
            info!("MISSED: Note {}, Lane {}, Late: {:.2}ms", note.id, note.lane, late_by);
            resolve_note(field, note_index, Judgment::Miss, now_ms);
            swept += 1;
        }
    }
    swept
}

/// Read-only view handed to renderers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub notes: Vec<Note>,
    pub current_time: f64,
    pub game_state: GameState,
    pub score: Score,
    pub effects: Vec<TransientEffect>,
    pub remaining_notes: usize,
    pub loading_chart: bool,
}

struct PendingChart {
    task: DetectionTask,
    difficulty: Difficulty,
}

/// Owns one play session: the chart, the live playfield, the clock, and the
/// ready/playing/paused/finished lifecycle.
///
/// All mutation happens on the caller's thread through `&mut self`; the only
/// background work is beat detection, whose result is picked up on `tick`.
pub struct GameSession {
    config: GameConfig,
    chart: Vec<Note>,
    bpm: Option<u32>,
    field: Playfield,
    state: GameState,
    clock: GameClock,
    pending_presses: VecDeque<usize>,
    pending_chart: Option<PendingChart>,
    load_error: Option<DetectionError>,
    subscribers: Vec<Sender<Snapshot>>,
    last_status_log_ms: f64,
}

impl GameSession {
    /// Session whose clock is a free-running timer.
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = GameClock::new(config.lead_in_offset_ms);
        Ok(Self::with_clock(config, clock))
    }

    /// Session whose clock follows `playback` once the lead-in has elapsed.
    pub fn with_playback(
        config: GameConfig,
        playback: Box<dyn Playback>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let clock = GameClock::with_playback(config.lead_in_offset_ms, playback);
        Ok(Self::with_clock(config, clock))
    }

    fn with_clock(config: GameConfig, clock: GameClock) -> Self {
        Self {
            config,
            chart: Vec::new(),
            bpm: None,
            field: Playfield::default(),
            state: GameState::Ready,
            clock,
            pending_presses: VecDeque::new(),
            pending_chart: None,
            load_error: None,
            subscribers: Vec::new(),
            last_status_log_ms: f64::NEG_INFINITY,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_ms()
    }

    pub fn score(&self) -> &Score {
        &self.field.score
    }

    pub fn notes(&self) -> &[Note] {
        &self.field.notes
    }

    pub fn effects(&self) -> &[TransientEffect] {
        &self.field.effects
    }

    /// The chart that the next `start` will load.
    pub fn chart(&self) -> &[Note] {
        &self.chart
    }

    pub fn bpm(&self) -> Option<u32> {
        self.bpm
    }

    pub fn is_loading_chart(&self) -> bool {
        self.pending_chart.is_some()
    }

    /// The last beat detection failure, if any. Cleared on read.
    pub fn take_load_error(&mut self) -> Option<DetectionError> {
        self.load_error.take()
    }

    /// Replaces the chart. A run in progress keeps its notes; the new chart
    /// is used from the next `start`.
    pub fn load_chart(&mut self, notes: Vec<Note>) {
        info!("Loaded chart with {} notes.", notes.len());
        self.chart = notes;
        if matches!(self.state, GameState::Ready | GameState::Finished) {
            self.field.notes = self.chart.clone();
        }
    }

    pub fn load_beat_map(&mut self, beat_map: &BeatMap) {
        self.bpm = Some(beat_map.bpm);
        self.load_chart(beat_map.notes.clone());
    }

    /// Starts beat detection for `source` in the background. The chart is
    /// replaced when detection succeeds; a previous pending detection is
    /// cancelled.
    pub fn load_audio(&mut self, source: AudioSource, difficulty: Difficulty) {
        self.cancel_chart_load();
        info!("Analysing {:?} for a {} chart...", source, difficulty);
        self.pending_chart = Some(PendingChart {
            task: DetectionTask::spawn(source),
            difficulty,
        });
    }

    pub fn cancel_chart_load(&mut self) {
        if let Some(mut pending) = self.pending_chart.take() {
            pending.task.cancel();
            info!("Cancelled pending beat detection.");
        }
    }

    fn poll_chart_load(&mut self) {
        let Some(pending) = self.pending_chart.as_mut() else {
            return;
        };
        let Some(result) = pending.task.poll() else {
            return;
        };
        let difficulty = pending.difficulty;
        self.pending_chart = None;

        match result {
            Ok(analysis) => match generate_chart(&analysis.beats, difficulty, self.config.lanes) {
                Ok(notes) => {
                    self.bpm = Some(analysis.bpm);
                    self.load_chart(notes);
                }
                Err(e) => {
                    warn!("Keeping previous chart; chart generation failed: {}", e);
                    self.load_error = Some(e.into());
                }
            },
            Err(DetectionError::Cancelled) => {}
            Err(e) => {
                warn!("Keeping previous chart; beat detection failed: {}", e);
                self.load_error = Some(e);
            }
        }
    }

    /// `ready | finished -> playing`: reloads the chart, resets the score and
    /// starts the clock.
    pub fn start(&mut self, now: Instant) -> bool {
        if !matches!(self.state, GameState::Ready | GameState::Finished) {
            debug!("Ignoring start while {:?}", self.state);
            return false;
        }
        if self.pending_chart.is_some() && self.chart.is_empty() {
            warn!("Starting while the chart is still being analysed.");
        }
        self.field = Playfield::new(self.chart.clone());
        self.pending_presses.clear();
        self.clock.start(now);
        self.last_status_log_ms = f64::NEG_INFINITY;
        self.state = GameState::Playing;
        info!("Session started with {} notes.", self.field.notes.len());
        true
    }

    /// `playing -> paused`: stops the clock and playback.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        self.clock.pause(now);
        self.pending_presses.clear();
        self.state = GameState::Paused;
        info!("Session paused at {:.1}ms.", self.clock.current_ms());
        true
    }

    /// `paused -> playing`.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.state != GameState::Paused {
            return false;
        }
        self.clock.resume(now);
        self.state = GameState::Playing;
        info!("Session resumed at {:.1}ms.", self.clock.current_ms());
        true
    }

    /// Back to `ready` from any state: clears notes, score, clock and
    /// effects, aborts pending beat detection and drops any unread load
    /// error. The loaded chart and its BPM are kept for the next `start`.
    pub fn reset(&mut self) {
        self.cancel_chart_load();
        self.load_error = None;
        self.clock.reset();
        self.field = Playfield::default();
        self.pending_presses.clear();
        self.state = GameState::Ready;
        info!("Session reset.");
    }

    fn finish(&mut self, now: Instant) {
        self.clock.pause(now);
        self.field.effects.clear();
        self.pending_presses.clear();
        self.state = GameState::Finished;
        let score = &self.field.score;
        info!(
            "Session finished: score {}, max combo {}, P/G/G/M {}/{}/{}/{}",
            score.score,
            score.max_combo,
            score.count(Judgment::Perfect),
            score.count(Judgment::Great),
            score.count(Judgment::Good),
            score.count(Judgment::Miss)
        );
    }

    /// Queues a press for the next tick. Ignored unless playing and `lane`
    /// exists.
    pub fn press_lane(&mut self, lane: usize) -> bool {
        if self.state != GameState::Playing {
            return false;
        }
        if lane >= self.config.lanes {
            debug!("Ignoring press on lane {} (only {} lanes)", lane, self.config.lanes);
            return false;
        }
        self.pending_presses.push_back(lane);
        true
    }

    fn should_finish(&self, now_ms: f64) -> bool {
        if self.field.all_resolved() {
            return true;
        }
        if let Some(last) = self.field.last_timing() {
            if now_ms > last + FINISH_GRACE_MS {
                return true;
            }
        }
        self.clock.playback_ended()
    }

    /// Advances one frame. Presses queued since the last tick and the miss
    /// sweep all see the same game time. Returns that time.
    pub fn tick(&mut self, now: Instant) -> f64 {
        self.poll_chart_load();

        if self.state == GameState::Playing {
            let now_ms = self.clock.tick(now);
            purge_expired(&mut self.field.effects, now_ms);

            let windows = self.config.judgment_windows;
            while let Some(lane) = self.pending_presses.pop_front() {
                judge_lane(&mut self.field, lane, now_ms, &windows);
            }
            sweep_misses(&mut self.field, now_ms, windows.good);

            if self.should_finish(now_ms) {
                self.finish(now);
            } else if now_ms - self.last_status_log_ms >= STATUS_LOG_INTERVAL_MS {
                info!(
                    "Time: {:.2}s, Score: {}, Combo: {}, Remaining: {}",
                    now_ms / 1000.0,
                    self.field.score.score,
                    self.field.score.combo,
                    self.field.unresolved_count()
                );
                self.last_status_log_ms = now_ms;
            }
        }

        self.publish();
        self.clock.current_ms()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            notes: self.field.notes.clone(),
            current_time: self.clock.current_ms(),
            game_state: self.state,
            score: self.field.score.clone(),
            effects: self.field.effects.clone(),
            remaining_notes: self.field.unresolved_count(),
            loading_chart: self.is_loading_chart(),
        }
    }

    /// Receives one snapshot per tick until the receiver is dropped.
    pub fn subscribe(&mut self) -> Receiver<Snapshot> {
        let (sender, receiver) = channel();
        self.subscribers.push(sender);
        receiver
    }

    fn publish(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleBuffer;
    use crate::game::effects::EffectKind;
    use crate::game::timing::tests::FakePlayback;
    use std::time::Duration;

    fn windows() -> JudgmentWindows {
        JudgmentWindows {
            perfect: 100.0,
            great: 200.0,
            good: 300.0,
        }
    }

    fn zero_lead_in() -> GameConfig {
        GameConfig {
            lead_in_offset_ms: 0.0,
            ..GameConfig::default()
        }
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn timing_errors_map_to_expected_grades() {
        let cases = [
            (90.0, Some(Judgment::Perfect)),
            (150.0, Some(Judgment::Great)),
            (250.0, Some(Judgment::Good)),
            (350.0, None),
        ];
        for (offset, expected) in cases {
            let mut field = Playfield::new(vec![Note::tap(0, 1, 1000.0)]);
            let outcome = judge_lane(&mut field, 1, 1000.0 + offset, &windows());
            match expected {
                Some(judgment) => {
                    assert_eq!(outcome, LaneOutcome::Judged { note_id: 0, judgment });
                    assert_eq!(field.notes[0].result(), Some(judgment));
                }
                None => {
                    assert_eq!(outcome, LaneOutcome::OutOfWindow { note_id: 0 });
                    assert!(!field.notes[0].is_resolved());
                    assert_eq!(field.score, Score::default());
                }
            }
        }
    }

    #[test]
    fn empty_lane_press_only_emits_key_effect() {
        let mut field = Playfield::new(vec![Note::tap(0, 0, 500.0)]);
        let outcome = judge_lane(&mut field, 3, 500.0, &windows());
        assert_eq!(outcome, LaneOutcome::NoNote);
        assert_eq!(field.score, Score::default());
        assert_eq!(field.effects, vec![TransientEffect::key_press(3, 500.0)]);
    }

    #[test]
    fn nearest_note_wins_and_ties_go_to_lowest_id() {
        let notes = vec![
            Note::tap(0, 0, 1000.0),
            Note::tap(1, 0, 1200.0),
            Note::tap(2, 0, 1400.0),
        ];
        let mut field = Playfield::new(notes);
        // 1100 is equidistant from notes 0 and 1
        let outcome = judge_lane(&mut field, 0, 1100.0, &windows());
        assert_eq!(
            outcome,
            LaneOutcome::Judged {
                note_id: 0,
                judgment: Judgment::Perfect
            }
        );
        let outcome = judge_lane(&mut field, 0, 1390.0, &windows());
        assert_eq!(
            outcome,
            LaneOutcome::Judged {
                note_id: 2,
                judgment: Judgment::Perfect
            }
        );
        assert!(!field.notes[1].is_resolved());
    }

    #[test]
    fn one_press_resolves_at_most_one_note() {
        let notes = vec![Note::tap(0, 2, 1000.0), Note::tap(1, 2, 1000.0)];
        let mut field = Playfield::new(notes);
        judge_lane(&mut field, 2, 1000.0, &windows());
        assert_eq!(field.unresolved_count(), 1);
        assert!(field.notes[0].is_resolved());
    }

    #[test]
    fn hold_heads_are_judged_like_taps() {
        let mut field = Playfield::new(vec![Note::hold(0, 1, 800.0, 1600.0)]);
        let outcome = judge_lane(&mut field, 1, 820.0, &windows());
        assert_eq!(
            outcome,
            LaneOutcome::Judged {
                note_id: 0,
                judgment: Judgment::Perfect
            }
        );
    }

    #[test]
    fn sweep_only_inside_grace_span_and_only_once() {
        let notes = vec![Note::tap(0, 0, 1000.0), Note::tap(1, 1, 0.0)];
        let mut field = Playfield::new(notes);

        // exactly at the good window: not yet late
        assert_eq!(sweep_misses(&mut field, 1300.0, 300.0), 0);
        assert_eq!(sweep_misses(&mut field, 1301.0, 300.0), 1);
        assert_eq!(field.notes[0].result(), Some(Judgment::Miss));
        assert_eq!(sweep_misses(&mut field, 1350.0, 300.0), 0);
        assert_eq!(field.score.count(Judgment::Miss), 1);

        // note 1 is far past the grace span and is left alone
        assert!(!field.notes[1].is_resolved());
    }

    #[test]
    fn sweep_resets_combo() {
        let notes = vec![Note::tap(0, 0, 0.0), Note::tap(1, 1, 500.0)];
        let mut field = Playfield::new(notes);
        judge_lane(&mut field, 0, 0.0, &windows());
        assert_eq!(field.score.combo, 1);
        sweep_misses(&mut field, 850.0, 300.0);
        assert_eq!(field.score.combo, 0);
        assert_eq!(field.score.max_combo, 1);
        assert_eq!(field.score.score, 303);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GameConfig {
            lanes: 0,
            ..GameConfig::default()
        };
        assert!(matches!(GameSession::new(config), Err(ConfigError::ZeroLanes)));
    }

    #[test]
    fn lifecycle_transitions() {
        let t0 = Instant::now();
        let mut session = GameSession::new(zero_lead_in()).unwrap();
        session.load_chart(vec![Note::tap(0, 0, 1000.0)]);
        assert_eq!(session.state(), GameState::Ready);
        assert_eq!(session.notes().len(), 1);

        assert!(!session.pause(t0));
        assert!(!session.resume(t0));
        assert!(session.start(t0));
        assert!(!session.start(t0));
        assert!(session.pause(at(t0, 100)));
        assert_eq!(session.state(), GameState::Paused);
        assert!(!session.press_lane(0));
        assert!(session.resume(at(t0, 200)));
        assert_eq!(session.state(), GameState::Playing);

        session.reset();
        assert_eq!(session.state(), GameState::Ready);
        assert!(session.notes().is_empty());
        assert_eq!(session.current_time(), 0.0);
        assert_eq!(session.chart().len(), 1);
    }

    #[test]
    fn presses_are_judged_at_the_tick_time() {
        let t0 = Instant::now();
        let mut session = GameSession::new(zero_lead_in()).unwrap();
        session.load_chart(vec![Note::tap(0, 1, 500.0), Note::tap(1, 2, 5000.0)]);
        session.start(t0);

        session.tick(at(t0, 16));
        assert!(session.press_lane(1));
        assert!(!session.press_lane(9));
        session.tick(at(t0, 480));
        assert_eq!(session.notes()[0].result(), Some(Judgment::Perfect));
        assert_eq!(session.score().combo, 1);

        let judged = session
            .effects()
            .iter()
            .filter(|e| matches!(e.kind, EffectKind::Judgment(_)))
            .count();
        assert_eq!(judged, 1);
        assert_eq!(session.effects().len(), 2);

        // both effects are stamped at 480ms; key press expires first
        session.tick(at(t0, 700));
        assert_eq!(session.effects().len(), 1);
        session.tick(at(t0, 1500));
        assert!(session.effects().is_empty());
    }

    #[test]
    fn finishes_when_every_note_is_resolved() {
        let t0 = Instant::now();
        let mut session = GameSession::new(zero_lead_in()).unwrap();
        session.load_chart(vec![Note::tap(0, 0, 100.0)]);
        session.start(t0);
        session.press_lane(0);
        session.tick(at(t0, 100));
        assert_eq!(session.state(), GameState::Finished);
        assert!(session.effects().is_empty());
        assert_eq!(session.score().count(Judgment::Perfect), 1);

        // finished -> playing reloads the chart and clears the score
        assert!(session.start(at(t0, 200)));
        assert_eq!(session.score(), &Score::default());
        assert!(session.notes().iter().all(|n| !n.is_resolved()));
    }

    #[test]
    fn dangling_note_finishes_after_grace() {
        let t0 = Instant::now();
        let mut session = GameSession::new(zero_lead_in()).unwrap();
        session.load_chart(vec![Note::tap(0, 0, 1000.0)]);
        session.start(t0);
        // skip straight past the sweep span so the note is never swept
        session.tick(at(t0, 2500));
        assert_eq!(session.state(), GameState::Playing);
        session.tick(at(t0, 3001));
        assert_eq!(session.state(), GameState::Finished);
        assert!(!session.notes()[0].is_resolved());
    }

    #[test]
    fn empty_chart_finishes_on_first_tick() {
        let t0 = Instant::now();
        let mut session = GameSession::new(zero_lead_in()).unwrap();
        session.start(t0);
        session.tick(at(t0, 16));
        assert_eq!(session.state(), GameState::Finished);
    }

    #[test]
    fn playback_end_finishes_the_session() {
        let fake = FakePlayback::default();
        let t0 = Instant::now();
        let mut session =
            GameSession::with_playback(zero_lead_in(), Box::new(fake.clone())).unwrap();
        session.load_chart(vec![Note::tap(0, 0, 60_000.0)]);
        session.start(t0);
        session.tick(at(t0, 16));
        assert_eq!(session.state(), GameState::Playing);

        {
            let mut state = fake.0.lock().unwrap();
            state.position_ms = 1000.0;
            state.ended = true;
        }
        session.tick(at(t0, 1000));
        assert_eq!(session.state(), GameState::Finished);
        assert!(!fake.0.lock().unwrap().playing);
    }

    #[test]
    fn subscribers_receive_a_snapshot_per_tick() {
        let t0 = Instant::now();
        let mut session = GameSession::new(zero_lead_in()).unwrap();
        session.load_chart(vec![Note::tap(0, 0, 5000.0)]);
        let receiver = session.subscribe();
        session.start(t0);
        session.tick(at(t0, 250));
        session.tick(at(t0, 500));

        let snapshots: Vec<Snapshot> = receiver.try_iter().collect();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].current_time, 500.0);
        assert_eq!(snapshots[1].game_state, GameState::Playing);
        assert_eq!(snapshots[1].remaining_notes, 1);

        drop(receiver);
        session.tick(at(t0, 750));
        assert!(session.subscribers.is_empty());
    }

    #[test]
    fn detection_result_replaces_the_chart() {
        let rate = 44_100u32;
        let samples = (0..rate as usize * 4)
            .map(|i| if i % (rate as usize / 2) < 1500 { 0.8 } else { 0.0 })
            .collect();

        let mut session = GameSession::new(GameConfig::default()).unwrap();
        session.pending_chart = Some(PendingChart {
            task: DetectionTask::spawn_samples(SampleBuffer::new(samples, rate)),
            difficulty: Difficulty::Normal,
        });
        assert!(session.is_loading_chart());

        let t0 = Instant::now();
        let mut ticks = 0u64;
        while session.is_loading_chart() {
            session.tick(at(t0, ticks));
            ticks += 1;
            std::thread::yield_now();
        }
        assert!(!session.chart().is_empty());
        assert_eq!(session.notes(), session.chart());
        assert!(session.take_load_error().is_none());
        assert!(session.bpm().is_some());
    }

    #[test]
    fn failed_detection_keeps_previous_chart() {
        let mut session = GameSession::new(GameConfig::default()).unwrap();
        let fallback = BeatMap::sample();
        session.load_beat_map(&fallback);

        session.load_audio(
            AudioSource::Bytes(std::sync::Arc::new(vec![1, 2, 3, 4])),
            Difficulty::Hard,
        );
        let t0 = Instant::now();
        while session.is_loading_chart() {
            session.tick(t0);
            std::thread::yield_now();
        }
        assert!(matches!(
            session.take_load_error(),
            Some(DetectionError::Decode(_))
        ));
        assert_eq!(session.chart(), fallback.notes.as_slice());
    }

    #[test]
    fn reset_clears_an_unread_load_error() {
        let mut session = GameSession::new(GameConfig::default()).unwrap();
        session.load_beat_map(&BeatMap::sample());
        let bpm = session.bpm();

        session.load_audio(
            AudioSource::Bytes(std::sync::Arc::new(vec![1, 2, 3, 4])),
            Difficulty::Normal,
        );
        let t0 = Instant::now();
        while session.is_loading_chart() {
            session.tick(t0);
            std::thread::yield_now();
        }

        session.reset();
        assert!(session.take_load_error().is_none());
        assert_eq!(session.bpm(), bpm);
        assert!(!session.chart().is_empty());
    }

    #[test]
    fn reset_does_not_wait_for_a_stalled_download() {
        // Accepts the connection but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/track.ogg", listener.local_addr().unwrap());

        let mut session = GameSession::new(GameConfig::default()).unwrap();
        session.load_audio(AudioSource::Url(url), Difficulty::Normal);
        std::thread::sleep(Duration::from_millis(200));

        let began = Instant::now();
        session.reset();
        assert!(began.elapsed() < Duration::from_secs(2));
        assert!(!session.is_loading_chart());
        assert_eq!(session.state(), GameState::Ready);
        drop(listener);
    }

    #[test]
    fn reset_aborts_pending_detection_without_touching_the_chart() {
        let mut session = GameSession::new(GameConfig::default()).unwrap();
        session.load_chart(vec![Note::tap(0, 0, 1000.0)]);
        session.load_audio(
            AudioSource::File("no/such/track.ogg".into()),
            Difficulty::Normal,
        );
        session.reset();
        assert!(!session.is_loading_chart());
        assert_eq!(session.chart().len(), 1);
        assert!(session.take_load_error().is_none());
    }
}
