use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::config::user::VOLUME_STEP;
use crate::app::config::SettingsStore;
use crate::app::playback::Shutdown;
use crate::app::tmux::Multiplexer;
use crate::errors::PlaybackError;
use crate::player::{volume_gain, AudioEngine};

/// How long a single read waits before the stop flag is checked again.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where keystrokes come from while a track plays.
pub trait Console: Send {
    /// Character-at-a-time input without echo.
    fn enter_cbreak(&mut self) -> Result<()>;
    /// Put the terminal back the way `enter_cbreak` found it.
    fn restore(&mut self) -> Result<()>;
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>>;
}

/// Builds a fresh console for each track's listener.
pub type ConsoleFactory = Arc<dyn Fn() -> Box<dyn Console> + Send + Sync>;

/// The controlling terminal on stdin.
#[derive(Default)]
pub struct Tty {
    saved: Option<Termios>,
}

impl Console for Tty {
    fn enter_cbreak(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let original = termios::tcgetattr(stdin.as_fd()).context("Failed to read terminal mode")?;

        let mut cbreak = original.clone();
        // ISIG and OPOST stay on: Ctrl-C still signals, output still translates
        cbreak.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        cbreak.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        cbreak.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(stdin.as_fd(), SetArg::TCSADRAIN, &cbreak)
            .context("Failed to enter cbreak mode")?;

        self.saved = Some(original);
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        if let Some(saved) = self.saved.take() {
            termios::tcsetattr(std::io::stdin().as_fd(), SetArg::TCSADRAIN, &saved)
                .context("Failed to restore terminal mode")?;
        }
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char(c) => Ok(Some(c)),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

/// Stand-in when stdin is not a terminal: never yields a key.
#[derive(Debug, Default)]
pub struct NullConsole;

impl Console for NullConsole {
    fn enter_cbreak(&mut self) -> Result<()> {
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    VolumeUp,
    VolumeDown,
    TogglePause,
    Detach,
    Stop,
}

impl KeyAction {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' | '=' => Some(Self::VolumeUp),
            '_' | '-' => Some(Self::VolumeDown),
            ' ' => Some(Self::TogglePause),
            'd' => Some(Self::Detach),
            'q' => Some(Self::Stop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    /// The user pressed the stop key.
    StopRequested,
    /// Released by `stop()` or a session shutdown.
    Released,
}

/// Everything a keystroke can act on.
#[derive(Clone)]
pub struct ListenerContext {
    pub engine: Arc<dyn AudioEngine>,
    pub settings: SettingsStore,
    pub mux: Arc<dyn Multiplexer>,
    pub session: String,
    pub shutdown: Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Started,
    Joined,
}

/// Reads keystrokes on a blocking thread for the duration of one track.
pub struct KeyListener {
    stage: Stage,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<ListenerExit>>>,
}

impl Default for KeyListener {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyListener {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, console: Box<dyn Console>, ctx: ListenerContext) -> Result<(), PlaybackError> {
        if self.stage != Stage::Idle {
            return Err(PlaybackError::Listener("already started".into()));
        }
        let stop = Arc::clone(&self.stop);
        self.handle = Some(tokio::task::spawn_blocking(move || {
            let exit = listen(console, &ctx, &stop);
            stop.store(true, Ordering::SeqCst);
            exit
        }));
        self.stage = Stage::Started;
        Ok(())
    }

    pub fn state(&self) -> ListenerState {
        match self.stage {
            Stage::Idle => ListenerState::Idle,
            Stage::Joined => ListenerState::Stopped,
            Stage::Started if self.stop.load(Ordering::SeqCst) => ListenerState::Stopping,
            Stage::Started => ListenerState::Listening,
        }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(false)
    }

    /// Wait for the thread to exit. The terminal has been restored by the
    /// time this returns, whatever happened inside.
    pub async fn join(&mut self) -> Result<ListenerExit, PlaybackError> {
        let Some(handle) = self.handle.take() else {
            self.stage = Stage::Joined;
            return Ok(ListenerExit::Released);
        };
        let outcome = handle.await;
        self.stage = Stage::Joined;

        match outcome {
            Ok(Ok(exit)) => Ok(exit),
            Ok(Err(e)) => Err(PlaybackError::Listener(format!("{:#}", e))),
            Err(e) if e.is_panic() => Err(PlaybackError::Listener(format!(
                "panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(PlaybackError::Listener(e.to_string())),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Holds the console in cbreak mode; restores it when dropped, including
/// during unwinding.
struct CbreakGuard {
    console: Box<dyn Console>,
}

impl CbreakGuard {
    fn enter(mut console: Box<dyn Console>) -> Result<Self> {
        console.enter_cbreak()?;
        Ok(Self { console })
    }
}

impl Drop for CbreakGuard {
    fn drop(&mut self) {
        if let Err(e) = self.console.restore() {
            warn!("{:#}", e);
        }
    }
}

fn listen(console: Box<dyn Console>, ctx: &ListenerContext, stop: &AtomicBool) -> Result<ListenerExit> {
    let mut guard = CbreakGuard::enter(console)?;
    debug!("Key listener started");

    while !stop.load(Ordering::SeqCst) && !ctx.shutdown.is_triggered() {
        let Some(key) = guard.console.poll_key(POLL_INTERVAL)? else {
            continue;
        };
        let Some(action) = KeyAction::from_char(key) else {
            continue;
        };

        match action {
            KeyAction::VolumeUp => nudge_volume(ctx, VOLUME_STEP)?,
            KeyAction::VolumeDown => nudge_volume(ctx, -VOLUME_STEP)?,
            KeyAction::TogglePause => {
                let paused = ctx.engine.toggle_pause()?;
                debug!("Paused: {}", paused);
            }
            KeyAction::Detach => {
                if let Err(e) = ctx.mux.detach(&ctx.session) {
                    warn!("Detach failed: {}", e);
                }
            }
            KeyAction::Stop => {
                info!("Stop requested from keyboard");
                ctx.shutdown.trigger();
                ctx.engine.stop()?;
                return Ok(ListenerExit::StopRequested);
            }
        }
    }

    Ok(ListenerExit::Released)
}

fn nudge_volume(ctx: &ListenerContext, delta: i64) -> Result<()> {
    match ctx.settings.nudge_volume(delta) {
        Ok(volume) => {
            ctx.engine.set_volume(volume_gain(volume))?;
            debug!("Volume {}%", volume);
            Ok(())
        }
        Err(e) if e.is_transient() => {
            warn!("Volume key ignored: {}", e);
            Ok(())
        }
        Err(e) => Err(e).context("Failed to update volume"),
    }
}
