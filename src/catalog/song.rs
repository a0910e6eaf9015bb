use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A song as exported from the index. Queue entries are located by full
/// equality, so this is never mutated once it leaves the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Seconds
    pub duration: f64,
    pub genre: Option<String>,
    pub year: Option<i32>,
}

impl Song {
    /// Title, or the file name without extension.
    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => file_stem(&self.path),
        }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            (self.duration * 1000.0) as u64
        } else {
            0
        }
    }
}

pub(crate) fn file_stem(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_export_field_names() {
        let song = Song {
            id: 4,
            path: PathBuf::from("/music/x.mp3"),
            title: None,
            artist: Some("A".into()),
            album: None,
            duration: 12.5,
            genre: None,
            year: None,
        };
        let value = serde_json::to_value(&song).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();

        for key in ["id", "path", "title", "artist", "album", "duration", "genre", "year"] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(song.display_name(), "x");
        assert_eq!(song.duration_ms(), 12_500);
    }
}
