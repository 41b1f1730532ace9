use crate::game::judgment::Judgment;
use serde::Serialize;

pub const KEY_PRESS_EFFECT_TTL_MS: f64 = 200.0;
pub const JUDGMENT_EFFECT_TTL_MS: f64 = 1000.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "judgment", rename_all = "snake_case")]
pub enum EffectKind {
    KeyPress,
    Judgment(Judgment),
}

/// Short-lived visual feedback, stamped with game time.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct TransientEffect {
    pub kind: EffectKind,
    pub lane: usize,
    pub timestamp: f64,
}

impl TransientEffect {
    pub fn key_press(lane: usize, timestamp: f64) -> Self {
        Self {
            kind: EffectKind::KeyPress,
            lane,
            timestamp,
        }
    }

    pub fn judgment(lane: usize, judgment: Judgment, timestamp: f64) -> Self {
        Self {
            kind: EffectKind::Judgment(judgment),
            lane,
            timestamp,
        }
    }

    pub fn ttl_ms(&self) -> f64 {
        match self.kind {
            EffectKind::KeyPress => KEY_PRESS_EFFECT_TTL_MS,
            EffectKind::Judgment(_) => JUDGMENT_EFFECT_TTL_MS,
        }
    }

    #[inline(always)]
    pub fn is_alive_at(&self, now_ms: f64) -> bool {
        now_ms - self.timestamp < self.ttl_ms()
    }
}

/// Drops every effect whose TTL has run out at `now_ms`.
pub fn purge_expired(effects: &mut Vec<TransientEffect>, now_ms: f64) {
    effects.retain(|effect| effect.is_alive_at(now_ms));
}
