use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::persistence::{read_json, write_json};
use crate::errors::StoreError;

pub const DEFAULT_VOLUME: u8 = 100;
pub const VOLUME_STEP: i64 = 5;

/// User settings stored in `config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub library: PathBuf,
    pub volume: u8,
}

// What is actually on disk: fields may be missing or out of range.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    library: Option<PathBuf>,
    volume: Option<i64>,
}

pub fn clamp_volume(volume: i64) -> u8 {
    volume.clamp(0, 100) as u8
}

/// Accessor over `config.json`.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    default_library: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf, default_library: PathBuf) -> Self {
        Self {
            path,
            default_library,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> Result<RawSettings, StoreError> {
        read_json(&self.path)
    }

    fn fill(&self, raw: RawSettings) -> Settings {
        Settings {
            library: raw.library.unwrap_or_else(|| self.default_library.clone()),
            volume: clamp_volume(raw.volume.unwrap_or(DEFAULT_VOLUME as i64)),
        }
    }

    pub fn load(&self) -> Result<Settings, StoreError> {
        self.read_raw().map(|raw| self.fill(raw))
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let settings = Settings {
            volume: settings.volume.min(100),
            ..settings.clone()
        };
        write_json(&self.path, &settings)
    }

    /// Create the file with defaults, or rewrite it with any missing fields filled in.
    pub fn ensure(&self) -> Result<Settings, StoreError> {
        let raw = if self.path.exists() {
            self.read_raw()?
        } else {
            info!("Creating config file at {}", self.path.display());
            RawSettings::default()
        };
        let settings = self.fill(raw);
        self.save(&settings)?;
        Ok(settings)
    }

    /// Read the volume for the running session. A value edited out of range
    /// by hand is clamped and the corrected value written back.
    pub fn poll_volume(&self) -> Result<u8, StoreError> {
        let raw = self.read_raw()?;
        let stored = raw.volume.unwrap_or(DEFAULT_VOLUME as i64);
        let clamped = clamp_volume(stored);
        if stored != clamped as i64 {
            warn!("Volume {} out of range, resetting to {}", stored, clamped);
            self.save(&self.fill(raw))?;
        }
        Ok(clamped)
    }

    pub fn set_volume(&self, volume: i64) -> Result<u8, StoreError> {
        let mut settings = self.load()?;
        settings.volume = clamp_volume(volume);
        self.save(&settings)?;
        Ok(settings.volume)
    }

    pub fn nudge_volume(&self, delta: i64) -> Result<u8, StoreError> {
        let current = self.load()?.volume as i64;
        self.set_volume(current + delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("config.json"), dir.path().join("library"))
    }

    #[rstest]
    #[case(150, 100)]
    #[case(-10, 0)]
    #[case(0, 0)]
    #[case(100, 100)]
    #[case(42, 42)]
    fn test_volume_is_clamped_on_write_and_read(#[case] written: i64, #[case] read: u8) {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.ensure().unwrap();

        assert_eq!(store.set_volume(written).unwrap(), read);
        assert_eq!(store.load().unwrap().volume, read);
    }

    #[test]
    fn test_hand_edited_volume_is_corrected_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), r#"{"library": "/music", "volume": 250}"#).unwrap();

        assert_eq!(store.load().unwrap().volume, 100);
        assert_eq!(store.poll_volume().unwrap(), 100);

        let on_disk: serde_json::Value = read_json(store.path()).unwrap();
        assert_eq!(on_disk["volume"], 100);
        assert_eq!(on_disk["library"], "/music");
    }

    #[test]
    fn test_ensure_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), r#"{"volume": 30}"#).unwrap();

        let settings = store.ensure().unwrap();

        assert_eq!(settings.volume, 30);
        assert_eq!(settings.library, dir.path().join("library"));
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_nudge_stops_at_the_bounds() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.ensure().unwrap();
        store.set_volume(97).unwrap();

        assert_eq!(store.nudge_volume(VOLUME_STEP).unwrap(), 100);
        store.set_volume(3).unwrap();
        assert_eq!(store.nudge_volume(-VOLUME_STEP).unwrap(), 0);
    }
}
