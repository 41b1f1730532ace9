/// Keys for lanes 0..=3, left to right.
pub const LANE_KEYS: [char; 4] = ['d', 'f', 'j', 'k'];

/// Maps a key name to its lane. Accepts the bare character in either case
/// (`"d"`, `"D"`) or a physical key code (`"KeyD"`).
pub fn lane_for_key(key: &str) -> Option<usize> {
    let key = key.strip_prefix("Key").unwrap_or(key);
    let mut chars = key.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let c = c.to_ascii_lowercase();
    LANE_KEYS.iter().position(|&k| k == c)
}

/// Tracks which lane keys are held so that auto-repeat does not count as a
/// fresh press.
#[derive(Default)]
pub struct InputState {
    held: [bool; LANE_KEYS.len()],
}

pub fn init_state() -> InputState {
    InputState::default()
}

impl InputState {
    pub fn is_held(&self, lane: usize) -> bool {
        self.held.get(lane).copied().unwrap_or(false)
    }

    pub fn release_all(&mut self) {
        self.held = [false; LANE_KEYS.len()];
    }
}

/// Updates `state` for a key event and returns the lane when this is a new
/// press. Releases, repeats and unmapped keys return `None`.
pub fn handle_key(key: &str, is_pressed: bool, state: &mut InputState) -> Option<usize> {
    let lane = lane_for_key(key)?;
    let was_held = std::mem::replace(&mut state.held[lane], is_pressed);
    (is_pressed && !was_held).then_some(lane)
}
