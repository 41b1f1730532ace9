use crate::game::judgment::Judgment;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NoteKind {
    Tap,
    Hold { end_timing: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Note {
    pub id: usize,
    pub lane: usize,
    /// Milliseconds from the chart origin.
    pub timing: f64,
    pub kind: NoteKind,
    result: Option<Judgment>,
}

impl Note {
    pub fn tap(id: usize, lane: usize, timing: f64) -> Self {
        Self {
            id,
            lane,
            timing,
            kind: NoteKind::Tap,
            result: None,
        }
    }

    pub fn hold(id: usize, lane: usize, timing: f64, end_timing: f64) -> Self {
        Self {
            kind: NoteKind::Hold { end_timing },
            ..Self::tap(id, lane, timing)
        }
    }

    #[inline(always)]
    pub fn result(&self) -> Option<Judgment> {
        self.result
    }

    #[inline(always)]
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }

    /// Resolution happens once. Returns false if the note was already judged.
    pub(crate) fn resolve(&mut self, judgment: Judgment) -> bool {
        if self.result.is_some() {
            return false;
        }
        self.result = Some(judgment);
        true
    }
}
