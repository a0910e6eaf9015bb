use std::process::{Command, Output, Stdio};
use tracing::debug;

use crate::errors::LaunchError;

pub const SESSION_NAME: &str = "muxplay";

/// The terminal multiplexer hosting the background session.
pub trait Multiplexer: Send + Sync {
    fn is_available(&self) -> bool;
    /// Start `argv` in a new detached session.
    fn new_detached_session(&self, name: &str, argv: &[String]) -> Result<(), LaunchError>;
    fn has_session(&self, name: &str) -> bool;
    fn send_keys(&self, name: &str, keys: &str) -> Result<(), LaunchError>;
    fn kill_session(&self, name: &str) -> Result<(), LaunchError>;
    /// Blocks until the client detaches, unless [`Multiplexer::attach_blocks`]
    /// says otherwise.
    fn attach(&self, name: &str) -> Result<(), LaunchError>;
    /// False when `attach` hands the current client over and returns at once.
    fn attach_blocks(&self) -> bool {
        true
    }
    fn detach(&self, name: &str) -> Result<(), LaunchError>;
    fn status_bar(&self, name: &str) -> Result<String, LaunchError>;
    fn set_status_bar(&self, name: &str, value: &str) -> Result<(), LaunchError>;
}

/// `tmux` on the PATH.
#[derive(Debug, Default, Clone, Copy)]
pub struct Tmux;

impl Tmux {
    fn run(&self, args: &[&str]) -> Result<Output, LaunchError> {
        debug!("tmux {}", args.join(" "));
        let output = Command::new("tmux")
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(LaunchError::Command {
                command: format!("tmux {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Multiplexer for Tmux {
    fn is_available(&self) -> bool {
        Command::new("tmux")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn new_detached_session(&self, name: &str, argv: &[String]) -> Result<(), LaunchError> {
        let cwd = std::env::current_dir()?;
        let cwd = cwd.to_string_lossy();
        let child_cmd = shell_join(argv);
        self.run(&["new-session", "-d", "-s", name, "-c", &cwd, &child_cmd])?;
        Ok(())
    }

    fn has_session(&self, name: &str) -> bool {
        self.run(&["has-session", "-t", name]).is_ok()
    }

    fn send_keys(&self, name: &str, keys: &str) -> Result<(), LaunchError> {
        // -l: literal, so " " is not looked up as a key name
        self.run(&["send-keys", "-t", name, "-l", keys])?;
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<(), LaunchError> {
        self.run(&["kill-session", "-t", name])?;
        Ok(())
    }

    fn attach(&self, name: &str) -> Result<(), LaunchError> {
        // Nested attach is refused by tmux; switch the current client instead
        let sub = if self.attach_blocks() {
            "attach-session"
        } else {
            "switch-client"
        };
        let status = Command::new("tmux").args([sub, "-t", name]).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(LaunchError::Command {
                command: format!("tmux {} -t {}", sub, name),
                stderr: format!("exited with {}", status),
            })
        }
    }

    fn attach_blocks(&self) -> bool {
        std::env::var_os("TMUX").is_none()
    }

    fn detach(&self, name: &str) -> Result<(), LaunchError> {
        self.run(&["detach-client", "-s", name])?;
        Ok(())
    }

    fn status_bar(&self, name: &str) -> Result<String, LaunchError> {
        // Session value if set, else the global default
        let output = match self.run(&["show-options", "-v", "-t", name, "status"]) {
            Ok(out) if !out.stdout.is_empty() => out,
            _ => self.run(&["show-options", "-gv", "status"])?,
        };
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn set_status_bar(&self, name: &str, value: &str) -> Result<(), LaunchError> {
        self.run(&["set-option", "-t", name, "status", value])?;
        Ok(())
    }
}

/// Join argv into one string for tmux to hand to the shell.
pub fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
