use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod persistence;
pub mod playback;
pub mod queue;
pub mod user;

pub use persistence::Live;
pub use playback::{PlaybackConfigStore, PlaybackFlags};
pub use queue::QueueStore;
pub use user::{Settings, SettingsStore};

pub const LOG_FILE_NAME: &str = "muxplay.log";

/// Location of every durable file the player shares between processes.
#[derive(Debug, Clone)]
pub struct AppConfig {
    dir: PathBuf,
    default_library: PathBuf,
}

impl AppConfig {
    /// `~/.muxplay`, with the library defaulting to `~/muxplay Library`.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find the home directory")?;
        Ok(Self {
            dir: home.join(".muxplay"),
            default_library: home.join("muxplay Library"),
        })
    }

    /// Everything under `dir`, library included. Used by tests.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            default_library: dir.join("library"),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.dir.join("config.json"), self.default_library.clone())
    }

    pub fn playback(&self) -> PlaybackConfigStore {
        PlaybackConfigStore::new(self.dir.join("playback.json"))
    }

    pub fn queue(&self) -> QueueStore {
        QueueStore::new(self.dir.join("queue.json"))
    }

    /// Create the directory, config, queue, playback config and library
    /// folder if any is missing. Returns the loaded settings.
    pub fn ensure(&self) -> Result<Settings> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        }

        let settings = self
            .settings()
            .ensure()
            .context("Failed to prepare config.json")?;

        let queue = self.queue();
        if !queue.path().exists() {
            info!("Generating queue file");
            queue.clear().context("Failed to create queue.json")?;
        }

        let playback = self.playback();
        if !playback.path().exists() {
            playback
                .set(PlaybackFlags::default())
                .context("Failed to create playback.json")?;
        }

        if !settings.library.exists() {
            info!("Creating library directory {}", settings.library.display());
            fs::create_dir_all(&settings.library).with_context(|| {
                format!("Failed to create library {}", settings.library.display())
            })?;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_creates_every_document() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::at(tmp.path().join("state"));

        let settings = config.ensure().unwrap();

        assert_eq!(settings.volume, user::DEFAULT_VOLUME);
        assert!(settings.library.is_dir());
        assert!(config.queue().peek_all().unwrap().is_empty());
        assert_eq!(config.playback().get().unwrap(), PlaybackFlags::default());
    }

    #[test]
    fn test_ensure_keeps_an_existing_queue() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::at(tmp.path());
        config.ensure().unwrap();
        std::fs::write(config.queue().path(), "[]").unwrap();
        config.playback().set_loop(true).unwrap();

        config.ensure().unwrap();

        assert!(config.playback().get().unwrap().looped);
    }
}
