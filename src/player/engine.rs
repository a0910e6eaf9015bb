use anyhow::{anyhow, Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{mpsc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use super::traits::AudioEngine;

#[derive(Default)]
struct Playback {
    sink: Option<Sink>,
    /// Set while audio is actually running.
    started: Option<Instant>,
    /// Time played before the last pause.
    banked: Duration,
    volume: f32,
}

impl Playback {
    fn elapsed(&self) -> Duration {
        self.banked + self.started.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// Local file playback through the default output device.
///
/// `OutputStream` is not `Send`, so it lives on its own thread for as long
/// as the engine does; only the handle crosses over.
pub struct RodioEngine {
    handle: OutputStreamHandle,
    playback: Mutex<Playback>,
    _keepalive: mpsc::Sender<()>,
}

impl RodioEngine {
    pub fn new() -> Result<Self> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (keepalive, keepalive_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    if handle_tx.send(Ok(handle)).is_ok() {
                        // Park until the engine is dropped
                        let _ = keepalive_rx.recv();
                    }
                }
                Err(e) => {
                    error!("No audio output device: {}", e);
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })
            .context("Failed to spawn the audio output thread")?;

        let handle = handle_rx
            .recv()
            .context("Audio output thread exited early")?
            .map_err(|e| anyhow!("Failed to open audio output: {}", e))?;

        Ok(Self {
            handle,
            playback: Mutex::new(Playback {
                volume: 1.0,
                ..Playback::default()
            }),
            _keepalive: keepalive,
        })
    }

    fn playback(&self) -> MutexGuard<'_, Playback> {
        // A panic while holding the lock leaves nothing half-written
        self.playback.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AudioEngine for RodioEngine {
    fn load(&self, path: &Path) -> Result<()> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let source = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Unsupported or corrupted audio: {}", path.display()))?;

        let sink = Sink::try_new(&self.handle).context("Failed to create audio sink")?;
        sink.pause();

        let mut pb = self.playback();
        sink.set_volume(pb.volume);
        sink.append(source);

        if let Some(old) = pb.sink.replace(sink) {
            old.stop();
        }
        pb.started = None;
        pb.banked = Duration::ZERO;
        debug!("Loaded {}", path.display());
        Ok(())
    }

    fn play(&self) -> Result<()> {
        let mut pb = self.playback();
        let sink = pb.sink.as_ref().context("Nothing loaded")?;
        sink.play();
        if pb.started.is_none() {
            pb.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut pb = self.playback();
        if let Some(sink) = pb.sink.as_ref() {
            sink.pause();
            if let Some(started) = pb.started.take() {
                pb.banked += started.elapsed();
            }
        }
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.play()
    }

    fn stop(&self) -> Result<()> {
        let mut pb = self.playback();
        if let Some(sink) = pb.sink.take() {
            sink.stop();
        }
        pb.started = None;
        pb.banked = Duration::ZERO;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        let pb = self.playback();
        pb.sink
            .as_ref()
            .map(|s| !s.is_paused() && !s.empty())
            .unwrap_or(false)
    }

    fn is_paused(&self) -> bool {
        let pb = self.playback();
        pb.sink.as_ref().map(|s| s.is_paused()).unwrap_or(false)
    }

    fn elapsed_ms(&self) -> Option<u64> {
        let pb = self.playback();
        let sink = pb.sink.as_ref()?;
        if sink.empty() {
            return None;
        }
        Some(pb.elapsed().as_millis() as u64)
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        let mut pb = self.playback();
        pb.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = pb.sink.as_ref() {
            sink.set_volume(pb.volume);
        }
        Ok(())
    }
}
