use crate::error::ConfigError;
use crate::game::chart::Difficulty;
use crate::game::judgment::JudgmentWindows;
use configparser::ini::Ini;
use log::{info, warn};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "beatlane.ini";

// Gameplay defaults
pub const DEFAULT_LANES: usize = 4;
pub const DEFAULT_LEAD_IN_OFFSET_MS: f64 = 2000.0;
pub const DEFAULT_NOTE_SPEED: f64 = 300.0; // pixels per second, rendering only
pub const DEFAULT_PERFECT_WINDOW_MS: f64 = 100.0;
pub const DEFAULT_GREAT_WINDOW_MS: f64 = 200.0;
pub const DEFAULT_GOOD_WINDOW_MS: f64 = 300.0;

const GAMEPLAY_SECTION: &str = "Gameplay";
const WINDOWS_SECTION: &str = "JudgmentWindows";

#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub lanes: usize,
    pub judgment_windows: JudgmentWindows,
    pub lead_in_offset_ms: f64,
    pub difficulty: Difficulty,
    pub note_speed: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANES,
            judgment_windows: JudgmentWindows {
                perfect: DEFAULT_PERFECT_WINDOW_MS,
                great: DEFAULT_GREAT_WINDOW_MS,
                good: DEFAULT_GOOD_WINDOW_MS,
            },
            lead_in_offset_ms: DEFAULT_LEAD_IN_OFFSET_MS,
            difficulty: Difficulty::Normal,
            note_speed: DEFAULT_NOTE_SPEED,
        }
    }
}

impl GameConfig {
    /// Rejects configurations the engine cannot run with. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes == 0 {
            return Err(ConfigError::ZeroLanes);
        }
        self.judgment_windows.validate()?;
        if !self.lead_in_offset_ms.is_finite() || self.lead_in_offset_ms < 0.0 {
            return Err(ConfigError::NegativeLeadIn);
        }
        Ok(())
    }

    /// Parses INI text. Keys that are absent keep their defaults.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let mut ini = Ini::new();
        ini.read(text.to_string()).map_err(ConfigError::Parse)?;
        let config = Self::from_ini(&ini)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file at `path`, writing a default one first if
    /// it does not exist yet.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            if let Err(e) = write_default_file(path) {
                warn!("Failed to create default config '{}': {}", path.display(), e);
            }
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let mut ini = Ini::new();
        ini.load(path).map_err(ConfigError::Parse)?;
        let config = Self::from_ini(&ini)?;
        config.validate()?;
        info!(
            "Loaded config from '{}': {} lanes, {} difficulty, windows {:?}",
            path.display(),
            config.lanes,
            config.difficulty,
            config.judgment_windows
        );
        Ok(config)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let lanes = read_parsed(ini, GAMEPLAY_SECTION, "Lanes")?.unwrap_or(defaults.lanes);
        let lead_in_offset_ms = read_parsed(ini, GAMEPLAY_SECTION, "LeadInOffsetMs")?
            .unwrap_or(defaults.lead_in_offset_ms);
        let note_speed =
            read_parsed(ini, GAMEPLAY_SECTION, "NoteSpeed")?.unwrap_or(defaults.note_speed);
        let difficulty =
            read_parsed(ini, GAMEPLAY_SECTION, "Difficulty")?.unwrap_or(defaults.difficulty);

        let windows = defaults.judgment_windows;
        let judgment_windows = JudgmentWindows {
            perfect: read_parsed(ini, WINDOWS_SECTION, "Perfect")?.unwrap_or(windows.perfect),
            great: read_parsed(ini, WINDOWS_SECTION, "Great")?.unwrap_or(windows.great),
            good: read_parsed(ini, WINDOWS_SECTION, "Good")?.unwrap_or(windows.good),
        };

        Ok(Self {
            lanes,
            judgment_windows,
            lead_in_offset_ms,
            difficulty,
            note_speed,
        })
    }
}

fn read_parsed<T: std::str::FromStr>(
    ini: &Ini,
    section: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = ini.get(section, key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            key: format!("{section}.{key}"),
            value: raw.clone(),
        })
}

fn write_default_file(path: &Path) -> Result<(), std::io::Error> {
    info!("Config file not found, creating defaults in '{}'.", path.display());
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let defaults = GameConfig::default();
    let mut ini = Ini::new();
    ini.set(GAMEPLAY_SECTION, "Lanes", Some(defaults.lanes.to_string()));
    ini.set(GAMEPLAY_SECTION, "Difficulty", Some(defaults.difficulty.to_string()));
    ini.set(
        GAMEPLAY_SECTION,
        "LeadInOffsetMs",
        Some(defaults.lead_in_offset_ms.to_string()),
    );
    ini.set(GAMEPLAY_SECTION, "NoteSpeed", Some(defaults.note_speed.to_string()));
    let windows = defaults.judgment_windows;
    ini.set(WINDOWS_SECTION, "Perfect", Some(windows.perfect.to_string()));
    ini.set(WINDOWS_SECTION, "Great", Some(windows.great.to_string()));
    ini.set(WINDOWS_SECTION, "Good", Some(windows.good.to_string()));
    ini.write(path)
}
