use tracing::{debug, info, warn};

use crate::app::tmux::Multiplexer;
use crate::errors::LaunchError;

pub const STANDALONE_FLAG: &str = "--standalone";
pub const BACKGROUND_FLAG: &str = "--background";

/// Which side of the tmux split this process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Started by the user; hands playback to a tmux session.
    Launcher,
    /// Running inside the tmux session; plays the queue.
    Worker,
}

impl Role {
    pub fn from_standalone(standalone: bool) -> Self {
        if standalone {
            Self::Worker
        } else {
            Self::Launcher
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The user watched the session until they detached or it ended.
    Attached,
    /// `--background`: the session runs on its own.
    Detached,
}

/// The worker's command line: same arguments minus `--background`, plus
/// the hidden `--standalone` marker.
pub fn worker_argv(exe: &str, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 2);
    argv.push(exe.to_string());
    argv.extend(
        args.iter()
            .filter(|a| a.as_str() != BACKGROUND_FLAG && a.as_str() != STANDALONE_FLAG)
            .cloned(),
    );
    argv.push(STANDALONE_FLAG.to_string());
    argv
}

/// Start the worker in a fresh detached session, replacing any running
/// one, and attach to it unless `background` is set.
///
/// A failed spawn is reported as is; playback never falls back to this
/// terminal.
pub fn launch(
    mux: &dyn Multiplexer,
    session: &str,
    exe: &str,
    args: &[String],
    background: bool,
) -> Result<LaunchOutcome, LaunchError> {
    // 1. One player at a time
    end_running_session(mux, session)?;

    // 2. Spawn the worker
    let argv = worker_argv(exe, args);
    mux.new_detached_session(session, &argv)?;
    info!("Started session '{}': {}", session, argv.join(" "));

    if background {
        return Ok(LaunchOutcome::Detached);
    }

    // 3. Watch it
    attach_preserving_status(mux, session)?;
    Ok(LaunchOutcome::Attached)
}

/// Kill `session` if it is running. Returns whether there was one.
///
/// Call this before rewriting the queue: a worker that finishes a looped
/// track would otherwise append it to the new queue.
pub fn end_running_session(mux: &dyn Multiplexer, session: &str) -> Result<bool, LaunchError> {
    if !mux.is_available() {
        return Err(LaunchError::Unavailable);
    }
    if !mux.has_session(session) {
        return Ok(false);
    }
    info!("Replacing running session '{}'", session);
    mux.kill_session(session)?;
    Ok(true)
}

/// Attach with the tmux status bar hidden, putting the previous value back
/// afterwards even if attaching failed.
///
/// From inside tmux the client is switched over and the call returns at
/// once, so the status bar is left as it is.
pub fn attach_preserving_status(mux: &dyn Multiplexer, session: &str) -> Result<(), LaunchError> {
    if !mux.has_session(session) {
        return Err(LaunchError::NoSession);
    }
    if !mux.attach_blocks() {
        debug!("Switching client to '{}', status bar untouched", session);
        return mux.attach(session);
    }

    let saved = match mux.status_bar(session) {
        Ok(value) if !value.is_empty() => value,
        Ok(_) => "on".to_string(),
        Err(e) => {
            warn!("Could not read status option: {}", e);
            "on".to_string()
        }
    };
    if let Err(e) = mux.set_status_bar(session, "off") {
        warn!("Could not hide status bar: {}", e);
    }

    let attached = mux.attach(session);

    // The worker may have finished while we watched; nothing to restore then
    if mux.has_session(session) {
        if let Err(e) = mux.set_status_bar(session, &saved) {
            warn!("Could not restore status bar: {}", e);
        }
    }
    attached
}
