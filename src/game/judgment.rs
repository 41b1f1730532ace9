use crate::error::ConfigError;
use serde::Serialize;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Perfect,
    Great,
    Good,
    Miss,
}

impl Judgment {
    pub const ALL: [Judgment; 4] = [
        Judgment::Perfect,
        Judgment::Great,
        Judgment::Good,
        Judgment::Miss,
    ];

    pub const fn base_points(self) -> u64 {
        match self {
            Judgment::Perfect => 300,
            Judgment::Great => 200,
            Judgment::Good => 100,
            Judgment::Miss => 0,
        }
    }

    #[inline(always)]
    pub const fn is_miss(self) -> bool {
        matches!(self, Judgment::Miss)
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Judgment::Perfect => "PERFECT",
            Judgment::Great => "GREAT",
            Judgment::Good => "GOOD",
            Judgment::Miss => "MISS",
        };
        f.write_str(name)
    }
}

/// Hit windows in milliseconds of absolute timing error.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct JudgmentWindows {
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
}

impl JudgmentWindows {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.perfect, self.great, self.good];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::NegativeWindow);
        }
        if !(self.perfect < self.great && self.great < self.good) {
            return Err(ConfigError::NonIncreasingWindows {
                perfect: self.perfect,
                great: self.great,
                good: self.good,
            });
        }
        Ok(())
    }

    /// Ordered from tightest to loosest; the first window that contains the
    /// error decides the grade.
    #[inline(always)]
    pub fn table(&self) -> [(Judgment, f64); 3] {
        [
            (Judgment::Perfect, self.perfect),
            (Judgment::Great, self.great),
            (Judgment::Good, self.good),
        ]
    }

    /// `None` means the error is outside every window and the note stays
    /// unresolved.
    pub fn classify(&self, abs_error_ms: f64) -> Option<Judgment> {
        self.table()
            .into_iter()
            .find(|(_, window)| abs_error_ms <= *window)
            .map(|(judgment, _)| judgment)
    }
}
