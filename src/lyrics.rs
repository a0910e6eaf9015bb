use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::catalog::FileTags;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    pub timestamp_ms: u64,
    pub text: String,
}

/// Timed lyrics for an audio file, if any exist.
///
/// A sidecar `.lrc` next to the file wins over lyrics embedded in the tags.
/// Plain (untimed) lyrics are ignored since there is nothing to follow along.
pub fn load_for(path: &Path) -> Option<Vec<LyricLine>> {
    // A. Check sidecar .lrc file
    let lrc_path = path.with_extension("lrc");
    if let Ok(content) = fs::read_to_string(&lrc_path) {
        let lines = parse_lrc(&content);
        if !lines.is_empty() {
            return Some(lines);
        }
    }

    // B. Check embedded lyrics
    let embedded = FileTags::read(path).ok()?.lyrics?;
    let lines = parse_lrc(&embedded);
    (!lines.is_empty()).then_some(lines)
}

/// Parse `[mm:ss.xx] text` lines. Lines without a valid timestamp (and LRC
/// metadata like `[ar:...]`) are skipped; a line may carry several stamps.
pub fn parse_lrc(content: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();
    for raw in content.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();
        while let Some(stripped) = rest.strip_prefix('[') {
            let Some(end) = stripped.find(']') else { break };
            match parse_timestamp(&stripped[..end]) {
                Some(ms) => stamps.push(ms),
                None => break,
            }
            rest = &stripped[end + 1..];
        }
        let text = rest.trim();
        for ms in stamps {
            lines.push(LyricLine {
                timestamp_ms: ms,
                text: text.to_string(),
            });
        }
    }
    lines.sort_by_key(|l| l.timestamp_ms);
    lines
}

fn parse_timestamp(ts: &str) -> Option<u64> {
    let (min, sec) = ts.split_once(':')?;
    let min: u64 = min.trim().parse().ok()?;
    let (sec, frac) = match sec.split_once('.') {
        Some((sec, frac)) => (sec, Some(frac)),
        None => (sec, None),
    };
    let sec: u64 = sec.parse().ok()?;
    let ms: u64 = match frac {
        Some(frac) if frac.len() == 2 => frac.parse::<u64>().ok()? * 10,
        Some(frac) if frac.len() == 1 => frac.parse::<u64>().ok()? * 100,
        Some(frac) => frac.get(..3)?.parse().ok()?,
        None => 0,
    };
    Some(min * 60_000 + sec * 1000 + ms)
}

/// The line being sung at `elapsed_ms`: the last one whose stamp has passed.
pub fn active_line(lines: &[LyricLine], elapsed_ms: u64) -> Option<&str> {
    let idx = lines.partition_point(|l| l.timestamp_ms <= elapsed_ms);
    let line = lines.get(idx.checked_sub(1)?)?;
    (!line.text.is_empty()).then_some(line.text.as_str())
}
