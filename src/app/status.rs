use crate::app::config::PlaybackFlags;
use crate::catalog::song::file_stem;
use crate::catalog::{FileTags, Song};

pub const BAR_WIDTH: usize = 30;
pub const SLIDER_WIDTH: usize = 5;

const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Title, artist and album with catalog values preferred over file tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLabel {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
}

impl TrackLabel {
    pub fn resolve(song: &Song, tags: Option<&FileTags>) -> Self {
        let title = song
            .title
            .clone()
            .or_else(|| tags.and_then(|t| t.title.clone()))
            .unwrap_or_else(|| file_stem(&song.path));
        let artist = song
            .artist
            .clone()
            .or_else(|| tags.and_then(|t| t.artist.clone()))
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let album = song
            .album
            .clone()
            .or_else(|| tags.and_then(|t| t.album.clone()));

        Self {
            title,
            artist,
            album,
        }
    }
}

/// One frame of the player.
#[derive(Debug, Clone)]
pub struct StatusView<'a> {
    pub label: &'a TrackLabel,
    pub elapsed_ms: u64,
    pub duration_ms: u64,
    pub paused: bool,
    pub volume: u8,
    pub flags: PlaybackFlags,
    pub lyric: Option<&'a str>,
}

impl StatusView<'_> {
    pub fn render(&self) -> String {
        let mut out = format!("NOW PLAYING: {} by {}", self.label.title, self.label.artist);
        if let Some(album) = &self.label.album {
            out.push_str(&format!(" ({})", album));
        }
        out.push('\n');
        out.push_str(&progress_bar(self.elapsed_ms, self.duration_ms));
        out.push('\n');

        let state = if self.paused { "|>" } else { "||" };
        out.push_str(&format!(
            "<< {} >> {} / {} {}",
            state,
            format_clock(self.elapsed_ms),
            format_clock(self.duration_ms),
            volume_slider(self.volume),
        ));
        if self.flags.looped || self.flags.shuffle {
            out.push(' ');
        }
        if self.flags.looped {
            out.push('🔁');
        }
        if self.flags.shuffle {
            out.push('🔀');
        }

        if let Some(line) = self.lyric {
            out.push_str("\n\n");
            out.push_str(line);
        }
        out
    }
}

/// `MM:SS`; minutes keep counting past 99.
pub fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// `──────⬤───...` with the knob at the played fraction.
pub fn progress_bar(elapsed_ms: u64, duration_ms: u64) -> String {
    let pos = if duration_ms == 0 {
        0
    } else {
        ((elapsed_ms as u128 * BAR_WIDTH as u128) / duration_ms as u128) as usize
    };
    knob_line(BAR_WIDTH, pos.min(BAR_WIDTH - 1), '⬤')
}

/// `──○── 🔊 40%`
pub fn volume_slider(volume: u8) -> String {
    let volume = volume.min(100);
    let pos = (volume as usize * SLIDER_WIDTH / 100).min(SLIDER_WIDTH - 1);
    format!("{} 🔊 {}%", knob_line(SLIDER_WIDTH, pos, '○'), volume)
}

fn knob_line(width: usize, pos: usize, knob: char) -> String {
    (0..width).map(|i| if i == pos { knob } else { '─' }).collect()
}

/// Passes a frame through only when it differs from the last one shown.
#[derive(Debug, Default)]
pub struct FrameGate {
    last: Option<String>,
}

impl FrameGate {
    pub fn offer(&mut self, frame: String) -> Option<&str> {
        if self.last.as_deref() == Some(frame.as_str()) {
            return None;
        }
        self.last = Some(frame);
        self.last.as_deref()
    }
}
