use crate::game::judgment::Judgment;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Score {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: BTreeMap<Judgment, u32>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            counts: BTreeMap::from_iter(Judgment::ALL.map(|j| (j, 0))),
        }
    }
}

/// Points awarded for `judgment` when it brings the combo to `new_combo`.
///
/// The multiplier is `1 + new_combo * 0.01`, evaluated in whole hundredths so
/// the floor is exact.
pub fn points_for(judgment: Judgment, new_combo: u32) -> u64 {
    let base = judgment.base_points();
    if new_combo == 0 {
        return base;
    }
    base * (100 + u64::from(new_combo)) / 100
}

impl Score {
    /// Applies one judgment and returns the points added.
    pub fn apply(&mut self, judgment: Judgment) -> u64 {
        let new_combo = if judgment.is_miss() {
            0
        } else {
            self.combo.saturating_add(1)
        };
        let increment = points_for(judgment, new_combo);

        self.score = self.score.saturating_add(increment);
        self.combo = new_combo;
        self.max_combo = self.max_combo.max(new_combo);
        *self.counts.entry(judgment).or_insert(0) += 1;
        increment
    }

    pub fn count(&self, judgment: Judgment) -> u32 {
        self.counts.get(&judgment).copied().unwrap_or(0)
    }

    pub fn total_judged(&self) -> u32 {
        self.counts.values().sum()
    }
}
