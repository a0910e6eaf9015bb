pub mod cli;
pub mod commands;
pub mod config;
pub mod keys;
pub mod launcher;
pub mod logging;
pub mod playback;
pub mod status;
pub mod tmux;
