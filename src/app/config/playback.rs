use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::persistence::{read_json, write_json};
use crate::errors::StoreError;

/// Flags a running session re-reads every tick, stored in `playback.json`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFlags {
    #[serde(rename = "loop", default)]
    pub looped: bool,
    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfigStore {
    path: PathBuf,
}

impl PlaybackConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Written once when a play session starts.
    pub fn set(&self, flags: PlaybackFlags) -> Result<(), StoreError> {
        write_json(&self.path, &flags)
    }

    pub fn get(&self) -> Result<PlaybackFlags, StoreError> {
        read_json(&self.path)
    }

    pub fn set_loop(&self, looped: bool) -> Result<PlaybackFlags, StoreError> {
        self.update(|flags| flags.looped = looped)
    }

    pub fn set_shuffle(&self, shuffle: bool) -> Result<PlaybackFlags, StoreError> {
        self.update(|flags| flags.shuffle = shuffle)
    }

    // Another writer may be halfway through; start from defaults rather than fail.
    fn update(&self, change: impl FnOnce(&mut PlaybackFlags)) -> Result<PlaybackFlags, StoreError> {
        let mut flags = match self.get() {
            Ok(flags) => flags,
            Err(e) if e.is_transient() => {
                warn!("Unreadable playback config, starting from defaults: {}", e);
                PlaybackFlags::default()
            }
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                PlaybackFlags::default()
            }
            Err(e) => return Err(e),
        };
        change(&mut flags);
        self.set(flags)?;
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_wire_format_uses_loop_key() {
        let dir = TempDir::new().unwrap();
        let store = PlaybackConfigStore::new(dir.path().join("playback.json"));
        store
            .set(PlaybackFlags {
                looped: true,
                shuffle: false,
            })
            .unwrap();

        let raw: serde_json::Value = read_json(store.path()).unwrap();
        assert_eq!(raw, serde_json::json!({"loop": true, "shuffle": false}));
    }

    #[test]
    fn test_single_flag_update_keeps_the_other() {
        let dir = TempDir::new().unwrap();
        let store = PlaybackConfigStore::new(dir.path().join("playback.json"));
        store
            .set(PlaybackFlags {
                looped: true,
                shuffle: false,
            })
            .unwrap();

        let flags = store.set_shuffle(true).unwrap();

        assert_eq!(
            flags,
            PlaybackFlags {
                looped: true,
                shuffle: true
            }
        );
        assert_eq!(store.get().unwrap(), flags);
    }

    #[test]
    fn test_update_over_corrupt_file_does_not_fail() {
        let dir = TempDir::new().unwrap();
        let store = PlaybackConfigStore::new(dir.path().join("playback.json"));
        fs::write(store.path(), "{\"loop\": tr").unwrap();

        assert!(store.get().is_err());
        let flags = store.set_loop(true).unwrap();
        assert!(flags.looped);
        assert!(!flags.shuffle);
    }
}
