use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

/// The interface the playback loop and key listener drive 🎵
///
/// Implementations use interior mutability: the loop and the listener hold
/// the same `Arc<dyn AudioEngine>` on different threads.
pub trait AudioEngine: Send + Sync {
    /// Decode `path` and hold it ready, paused at the start.
    fn load(&self, path: &Path) -> Result<()>;
    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;
    fn resume(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;

    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;

    /// Position in the loaded track. `None` once it has played out (or
    /// nothing is loaded).
    fn elapsed_ms(&self) -> Option<u64>;

    /// `0.0..=1.0`
    fn set_volume(&self, volume: f32) -> Result<()>;

    fn state(&self) -> PlayerState {
        if self.is_paused() {
            PlayerState::Paused
        } else if self.is_playing() {
            PlayerState::Playing
        } else {
            PlayerState::Stopped
        }
    }

    /// Returns true if playback is now paused.
    fn toggle_pause(&self) -> Result<bool> {
        if self.is_paused() {
            self.resume()?;
            Ok(false)
        } else {
            self.pause()?;
            Ok(true)
        }
    }
}

/// Percent (as stored in config.json) to the engine's gain.
pub fn volume_gain(percent: u8) -> f32 {
    f32::from(percent.min(100)) / 100.0
}
