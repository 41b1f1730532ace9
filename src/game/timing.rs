use crate::audio::Playback;
use log::{debug, info};
use std::time::{Duration, Instant};

/// Game time in milliseconds. Negative during the lead-in before the chart
/// origin.
///
/// Without a `Playback` the clock is a free-running timer started at play.
/// With one, the timer only drives the lead-in: music starts once the lead-in
/// has elapsed and from then on game time follows the playback position.
pub struct GameClock {
    lead_in_ms: f64,
    playback: Option<Box<dyn Playback>>,
    /// Start of the currently running segment.
    segment_start: Option<Instant>,
    /// Time accumulated by earlier segments (before pauses).
    accumulated: Duration,
    audio_started: bool,
    current_ms: f64,
}

impl GameClock {
    pub fn new(lead_in_ms: f64) -> Self {
        Self {
            lead_in_ms,
            playback: None,
            segment_start: None,
            accumulated: Duration::ZERO,
            audio_started: false,
            current_ms: 0.0,
        }
    }

    pub fn with_playback(lead_in_ms: f64, playback: Box<dyn Playback>) -> Self {
        Self {
            playback: Some(playback),
            ..Self::new(lead_in_ms)
        }
    }

    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.segment_start.is_some()
    }

    #[inline(always)]
    pub fn is_audio_backed(&self) -> bool {
        self.playback.is_some()
    }

    #[inline(always)]
    pub fn audio_started(&self) -> bool {
        self.audio_started
    }

    #[inline(always)]
    pub fn lead_in_ms(&self) -> f64 {
        self.lead_in_ms
    }

    /// Last time produced by `tick`.
    #[inline(always)]
    pub fn current_ms(&self) -> f64 {
        self.current_ms
    }

    pub fn playback_ended(&self) -> bool {
        self.audio_started && self.playback.as_ref().is_some_and(|p| p.has_ended())
    }

    fn elapsed_since_play(&self, now: Instant) -> Duration {
        let running = self
            .segment_start
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start));
        self.accumulated + running
    }

    /// Starts from the beginning of the lead-in.
    pub fn start(&mut self, now: Instant) {
        self.reset();
        self.segment_start = Some(now);
        self.current_ms = -self.lead_in_ms;
        info!(
            "Clock started ({} mode, lead-in {:.0}ms)",
            if self.is_audio_backed() { "audio" } else { "timer" },
            self.lead_in_ms
        );
    }

    pub fn pause(&mut self, now: Instant) {
        let Some(start) = self.segment_start.take() else {
            return;
        };
        self.accumulated += now.saturating_duration_since(start);
        if self.audio_started {
            if let Some(playback) = self.playback.as_mut() {
                playback.pause();
            }
        }
        debug!("Clock paused at {:.1}ms", self.current_ms);
    }

    pub fn resume(&mut self, now: Instant) {
        if self.segment_start.is_some() {
            return;
        }
        self.segment_start = Some(now);
        if self.audio_started {
            if let Some(playback) = self.playback.as_mut() {
                playback.play();
            }
        }
        debug!("Clock resumed at {:.1}ms", self.current_ms);
    }

    /// Stops everything and returns the clock to 0.
    pub fn reset(&mut self) {
        self.segment_start = None;
        self.accumulated = Duration::ZERO;
        self.audio_started = false;
        self.current_ms = 0.0;
        if let Some(playback) = self.playback.as_mut() {
            playback.rewind();
        }
    }

    /// Advances the clock and returns the game time snapshot for this tick.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if !self.is_running() {
            return self.current_ms;
        }

        let elapsed_ms = self.elapsed_since_play(now).as_secs_f64() * 1000.0;
        if !self.audio_started && elapsed_ms >= self.lead_in_ms {
            if let Some(playback) = self.playback.as_mut() {
                playback.play();
                self.audio_started = true;
                info!("Lead-in complete, starting playback.");
            }
        }

        let time = match (&self.playback, self.audio_started) {
            (Some(playback), true) => playback.position_ms(),
            _ => elapsed_ms - self.lead_in_ms,
        };
        // Never step backwards within a run, even if playback jitters.
        self.current_ms = self.current_ms.max(time);
        self.current_ms
    }
}
