use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use rand::seq::SliceRandom;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::app::config::user::DEFAULT_VOLUME;
use crate::app::config::{AppConfig, Live, PlaybackConfigStore, PlaybackFlags, QueueStore, SettingsStore};
use crate::app::keys::{ConsoleFactory, KeyListener, ListenerContext, ListenerExit};
use crate::app::status::{FrameGate, StatusView, TrackLabel};
use crate::app::tmux::{Multiplexer, SESSION_NAME};
use crate::catalog::{FileTags, Song};
use crate::errors::{PlaybackError, StoreError};
use crate::lyrics::{self, LyricLine};
use crate::player::{volume_gain, AudioEngine, PlayerState};

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Attempts at reading a document that keeps coming back malformed.
const STORE_RETRIES: usize = 5;

/// Session-wide stop request, set by Ctrl-C or the stop key.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The queue ran dry.
    Finished,
    /// Stopped by the user.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackEnd {
    Finished,
    Interrupted,
}

/// Plays the durable queue until it is empty or the session is stopped.
pub struct PlaybackLoop {
    engine: Arc<dyn AudioEngine>,
    queue: QueueStore,
    playback: PlaybackConfigStore,
    settings: SettingsStore,
    mux: Arc<dyn Multiplexer>,
    consoles: ConsoleFactory,
    shutdown: Shutdown,
    out: Box<dyn Write + Send>,
    tick: Duration,
    session: String,
}

impl PlaybackLoop {
    pub fn new(
        config: &AppConfig,
        engine: Arc<dyn AudioEngine>,
        mux: Arc<dyn Multiplexer>,
        consoles: ConsoleFactory,
        shutdown: Shutdown,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            engine,
            queue: config.queue(),
            playback: config.playback(),
            settings: config.settings(),
            mux,
            consoles,
            shutdown,
            out,
            tick: DEFAULT_TICK,
            session: SESSION_NAME.to_string(),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = session.into();
        self
    }

    pub async fn run(&mut self) -> Result<SessionEnd, PlaybackError> {
        // The launcher's flags; a torn first read must not drop --loop
        let starting = match retry(self.tick, "playback config", || self.playback.get()).await {
            Ok(flags) => flags,
            Err(e) => {
                warn!("Starting with default playback flags: {}", e);
                PlaybackFlags::default()
            }
        };
        let mut flags = Live::new("playback config", starting);

        loop {
            if self.shutdown.is_triggered() {
                return Ok(SessionEnd::Interrupted);
            }

            // 1. Re-read the queue: other processes may have added to it
            let queue = retry(self.tick, "queue", || self.queue.peek_all()).await?;
            let shuffle = flags.refresh(self.playback.get()).shuffle;
            let Some(song) = pick_next(&queue, shuffle) else {
                info!("Queue is empty, session finished");
                return Ok(SessionEnd::Finished);
            };

            // 2. Play it
            if self.play_track(&song, &mut flags).await? == TrackEnd::Interrupted {
                info!("Playback interrupted");
                return Ok(SessionEnd::Interrupted);
            }

            // 3. Advance, putting it back at the tail when looping
            let removed = retry(self.tick, "queue", || self.queue.dequeue_one(&song)).await?;
            if !removed {
                debug!("{} was already gone from the queue", song.path.display());
            }
            if flags.refresh(self.playback.get()).looped {
                retry(self.tick, "queue", || self.queue.enqueue(std::slice::from_ref(&song)))
                    .await?;
            }
        }
    }

    async fn play_track(
        &mut self,
        song: &Song,
        flags: &mut Live<PlaybackFlags>,
    ) -> Result<TrackEnd, PlaybackError> {
        if !song.path.exists() {
            error!("Missing track {}", song.path.display());
            return Err(PlaybackError::MissingTrack(song.path.clone()));
        }
        info!("Playing {}", song.path.display());

        let tags = match FileTags::read(&song.path) {
            Ok(tags) => Some(tags),
            Err(e) => {
                debug!("No tags: {}", e);
                None
            }
        };
        let label = TrackLabel::resolve(song, tags.as_ref());
        let duration_ms = match song.duration_ms() {
            0 => tags.as_ref().map(|t| (t.duration_secs * 1000.0) as u64).unwrap_or(0),
            ms => ms,
        };
        let lyrics = lyrics::load_for(&song.path).unwrap_or_default();

        let initial_volume = self.settings.load().map(|s| s.volume).unwrap_or(DEFAULT_VOLUME);
        let mut volume = Live::new("volume", initial_volume);

        self.engine
            .load(&song.path)
            .map_err(|e| PlaybackError::Load {
                path: song.path.clone(),
                reason: format!("{:#}", e),
            })?;
        self.engine.set_volume(volume_gain(initial_volume)).map_err(engine_err)?;
        self.engine.play().map_err(engine_err)?;

        let mut listener = KeyListener::new();
        listener.start(
            (self.consoles)(),
            ListenerContext {
                engine: Arc::clone(&self.engine),
                settings: self.settings.clone(),
                mux: Arc::clone(&self.mux),
                session: self.session.clone(),
                shutdown: self.shutdown.clone(),
            },
        )?;

        let outcome = self
            .drive(&label, duration_ms, &lyrics, &mut listener, flags, &mut volume)
            .await;

        // Teardown runs on every path; the listener restores the terminal
        listener.stop();
        let joined = listener.join().await;

        match outcome {
            Ok(TrackEnd::Finished) => {
                joined?;
                Ok(TrackEnd::Finished)
            }
            Ok(TrackEnd::Interrupted) => {
                self.stop_engine();
                joined?;
                Ok(TrackEnd::Interrupted)
            }
            Err(e) => {
                self.stop_engine();
                if let Err(listener_err) = joined {
                    warn!("{}", listener_err);
                }
                error!("{}", e);
                Err(e)
            }
        }
    }

    async fn drive(
        &mut self,
        label: &TrackLabel,
        duration_ms: u64,
        lyrics: &[LyricLine],
        listener: &mut KeyListener,
        flags: &mut Live<PlaybackFlags>,
        volume: &mut Live<u8>,
    ) -> Result<TrackEnd, PlaybackError> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut gate = FrameGate::default();

        loop {
            ticker.tick().await;

            if self.shutdown.is_triggered() {
                return Ok(TrackEnd::Interrupted);
            }

            if listener.is_finished() {
                if listener.join().await? == ListenerExit::StopRequested {
                    return Ok(TrackEnd::Interrupted);
                }
            }

            let current_flags = *flags.refresh(self.playback.get());
            let current_volume = *volume.refresh(self.settings.poll_volume());
            self.engine
                .set_volume(volume_gain(current_volume))
                .map_err(engine_err)?;

            let Some(elapsed_ms) = self.engine.elapsed_ms() else {
                // A stop key lands here too: the engine was stopped under us
                if self.shutdown.is_triggered() {
                    return Ok(TrackEnd::Interrupted);
                }
                return Ok(TrackEnd::Finished);
            };

            let view = StatusView {
                label,
                elapsed_ms,
                duration_ms,
                paused: self.engine.state() == PlayerState::Paused,
                volume: current_volume,
                flags: current_flags,
                lyric: lyrics::active_line(lyrics, elapsed_ms),
            };
            if let Some(frame) = gate.offer(view.render()) {
                if let Err(e) = draw(&mut self.out, frame) {
                    warn!("Failed to draw status: {}", e);
                }
            }
        }
    }

    fn stop_engine(&self) {
        if let Err(e) = self.engine.stop() {
            warn!("Failed to stop audio: {:#}", e);
        }
    }
}

/// Run a store operation, retrying torn documents a few times.
async fn retry<T>(
    pause: Duration,
    what: &str,
    mut op: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < STORE_RETRIES => {
                warn!("Retrying {} (attempt {}): {}", what, attempt, e);
                attempt += 1;
                tokio::time::sleep(pause).await;
            }
            other => return other,
        }
    }
}

fn draw(out: &mut impl Write, frame: &str) -> std::io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All), Print(frame), Print("\n"))?;
    out.flush()
}

fn engine_err(e: anyhow::Error) -> PlaybackError {
    PlaybackError::Engine(format!("{:#}", e))
}

/// Head of the queue, or any entry when shuffling.
fn pick_next(queue: &[Song], shuffle: bool) -> Option<Song> {
    if shuffle {
        queue.choose(&mut rand::thread_rng()).cloned()
    } else {
        queue.first().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn song(id: i64) -> Song {
        Song {
            id,
            path: PathBuf::from(format!("/music/{id}.mp3")),
            title: None,
            artist: None,
            album: None,
            duration: 1.0,
            genre: None,
            year: None,
        }
    }

    #[test]
    fn test_pick_next_takes_the_head_in_order() {
        let queue = vec![song(1), song(2), song(3)];
        assert_eq!(pick_next(&queue, false), Some(song(1)));
        assert_eq!(pick_next(&[], false), None);
    }

    #[test]
    fn test_pick_next_shuffled_stays_within_the_queue() {
        let queue = vec![song(1), song(2), song(3)];
        for _ in 0..20 {
            let picked = pick_next(&queue, true).unwrap();
            assert!(queue.contains(&picked));
        }
        assert_eq!(pick_next(&[], true), None);
    }

    fn torn(path: &str) -> StoreError {
        StoreError::Malformed {
            path: PathBuf::from(path),
            source: serde_json::from_str::<PlaybackFlags>("{\"loop\": tr").unwrap_err(),
        }
    }

    #[tokio::test]
    async fn test_retry_rides_out_torn_reads() {
        let mut reads = 0;
        let flags = retry(Duration::from_millis(1), "playback config", || {
            reads += 1;
            if reads < 3 {
                Err(torn("playback.json"))
            } else {
                Ok(PlaybackFlags {
                    looped: true,
                    shuffle: false,
                })
            }
        })
        .await
        .unwrap();

        assert!(flags.looped);
        assert_eq!(reads, 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut reads = 0;
        let result: Result<(), _> = retry(Duration::from_millis(1), "queue", || {
            reads += 1;
            Err(torn("queue.json"))
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(reads, STORE_RETRIES);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_io_errors() {
        let mut reads = 0;
        let result: Result<(), _> = retry(Duration::from_millis(1), "queue", || {
            reads += 1;
            Err(StoreError::Io {
                path: PathBuf::from("queue.json"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(reads, 1);
    }

    #[test]
    fn test_shutdown_is_shared_between_clones() {
        let shutdown = Shutdown::default();
        let other = shutdown.clone();
        assert!(!other.is_triggered());
        shutdown.trigger();
        assert!(other.is_triggered());
    }
}
